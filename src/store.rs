//! Read-only record store for principals, orders and login accounts.
//!
//! Handlers only see the [`RecordStore`] trait; [`MemoryStore`] is the
//! in-process implementation built from the configured seed.

use crate::{
    config::Seed,
    credentials::{self, CredentialError},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Customer,
    Support,
    /// Anything else. Never granted access.
    Other(String),
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "customer" => Role::Customer,
            "support" => Role::Support,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Customer => "customer".to_string(),
            Role::Support => "support".to_string(),
            Role::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: u64,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub owner_id: u64,
    pub item: String,
    pub region: String,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn principal_by_token(&self, token: &str) -> Option<Principal>;
    async fn order(&self, id: u64) -> Option<Order>;
    async fn account_by_username(&self, username: &str) -> Option<Account>;
    async fn account(&self, id: u64) -> Option<Account>;
}

pub struct MemoryStore {
    principals: HashMap<u64, Principal>,
    tokens: HashMap<String, u64>,
    orders: HashMap<u64, Order>,
    accounts: Vec<Account>,
}

impl MemoryStore {
    /// Builds the store, hashing every seed password with Argon2id.
    pub fn from_seed(seed: &Seed) -> Result<Self, CredentialError> {
        let mut principals = HashMap::new();
        let mut tokens = HashMap::new();
        for user in &seed.users {
            principals.insert(
                user.id,
                Principal {
                    id: user.id,
                    name: user.name.clone(),
                    role: user.role.clone(),
                    department: user.department.clone(),
                },
            );
            if let Some(token) = &user.token {
                tokens.insert(token.clone(), user.id);
            }
        }
        let orders = seed.orders.iter().map(|o| (o.id, o.clone())).collect();
        let accounts = seed
            .accounts
            .iter()
            .map(|a| {
                Ok(Account {
                    id: a.id,
                    username: a.username.clone(),
                    password_hash: credentials::hash_password(&a.password)?,
                })
            })
            .collect::<Result<Vec<_>, CredentialError>>()?;
        Ok(Self { principals, tokens, orders, accounts })
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn principal_by_token(&self, token: &str) -> Option<Principal> {
        let id = self.tokens.get(token)?;
        self.principals.get(id).cloned()
    }

    async fn order(&self, id: u64) -> Option<Order> {
        self.orders.get(&id).cloned()
    }

    async fn account_by_username(&self, username: &str) -> Option<Account> {
        self.accounts.iter().find(|a| a.username == username).cloned()
    }

    async fn account(&self, id: u64) -> Option<Account> {
        self.accounts.iter().find(|a| a.id == id).cloned()
    }
}
