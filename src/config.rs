use crate::store::{Order, Role};
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub files: Files,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub seed: Seed,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Files {
    pub base_dir: PathBuf,
    #[serde(default = "default_true")]
    pub symlink_check: bool,
}
fn default_true() -> bool { true }

/// Response header policy. Defaults are the strictest variant.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Headers {
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    pub form_action: String,
    pub base_uri: String,
    pub report_uri: Option<String>,
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            hsts_max_age: 31_536_000,
            hsts_include_subdomains: true,
            hsts_preload: true,
            form_action: "'none'".to_string(),
            base_uri: "'none'".to_string(),
            report_uri: Some("/csp-report".to_string()),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Session {
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl_secs: Duration,
    pub cookie_secure: bool,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub sweep_interval_secs: Option<Duration>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            ttl_secs: Duration::from_secs(30 * 60),
            cookie_secure: true,
            sweep_interval_secs: Some(Duration::from_secs(5 * 60)),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Limits {
    pub max_request_kb: usize,
    pub api_requests: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_window_secs: Duration,
    pub global_requests_per_second: u32,
    pub login_attempts: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub login_window_secs: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_kb: 64,
            api_requests: 100,
            api_window_secs: Duration::from_secs(15 * 60),
            global_requests_per_second: 200,
            login_attempts: 5,
            login_window_secs: Duration::from_secs(15 * 60),
        }
    }
}

/// Static record set loaded at startup. The demo data applies only when the
/// whole `[seed]` section is absent.
#[derive(Debug, Deserialize, Clone)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedUser {
    pub id: u64,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    /// Bearer token for the orders API.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedAccount {
    pub id: u64,
    pub username: String,
    /// Plaintext, hashed at startup and then dropped.
    pub password: String,
}

impl Default for Seed {
    fn default() -> Self {
        let user = |id, name: &str, role, department: &str, token: &str| SeedUser {
            id,
            name: name.to_string(),
            role,
            department: Some(department.to_string()),
            token: Some(token.to_string()),
        };
        let order = |id, owner_id, item: &str, region: &str, total| Order {
            id,
            owner_id,
            item: item.to_string(),
            region: region.to_string(),
            total,
        };
        Self {
            users: vec![
                user(1, "Alice", Role::Customer, "north", "token-alice"),
                user(2, "Bob", Role::Customer, "south", "token-bob"),
                user(3, "Charlie", Role::Support, "north", "token-charlie"),
            ],
            orders: vec![
                order(1, 1, "Laptop", "north", 2000),
                order(2, 1, "Mouse", "north", 40),
                order(3, 2, "Monitor", "south", 300),
                order(4, 2, "Keyboard", "south", 60),
            ],
            accounts: vec![SeedAccount {
                id: 1,
                username: "student".to_string(),
                password: "password123".to_string(),
            }],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.files.base_dir.is_dir() {
            anyhow::bail!("base_dir does not exist or is not a directory: {}", self.files.base_dir.display());
        }
        if self.session.ttl_secs.is_zero() { anyhow::bail!("session ttl_secs must be > 0"); }
        if self.session.sweep_interval_secs.is_some_and(|d| d.is_zero()) {
            anyhow::bail!("session sweep_interval_secs must be > 0");
        }
        if self.limits.max_request_kb == 0 { anyhow::bail!("max_request_kb must be > 0"); }
        if self.limits.api_requests == 0 || self.limits.api_window_secs.is_zero() {
            anyhow::bail!("api_requests and api_window_secs must be > 0");
        }
        if self.limits.global_requests_per_second == 0 { anyhow::bail!("global_requests_per_second must be > 0"); }
        if self.limits.login_attempts == 0 || self.limits.login_window_secs.is_zero() {
            anyhow::bail!("login_attempts and login_window_secs must be > 0");
        }
        self.seed.validate()
    }
}

impl Seed {
    fn validate(&self) -> anyhow::Result<()> {
        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for user in &self.users {
            if !ids.insert(user.id) { anyhow::bail!("duplicate user id {}", user.id); }
            if let Some(token) = &user.token {
                if token.trim().is_empty() { anyhow::bail!("user {} has an empty token", user.id); }
                if !tokens.insert(token.as_str()) { anyhow::bail!("duplicate token for user {}", user.id); }
            }
        }
        let mut order_ids = HashSet::new();
        for order in &self.orders {
            if !order_ids.insert(order.id) { anyhow::bail!("duplicate order id {}", order.id); }
            if !ids.contains(&order.owner_id) {
                anyhow::bail!("order {} references unknown owner {}", order.id, order.owner_id);
            }
        }
        let mut usernames = HashSet::new();
        for account in &self.accounts {
            if account.password.is_empty() { anyhow::bail!("account {} has an empty password", account.username); }
            if !usernames.insert(account.username.as_str()) {
                anyhow::bail!("duplicate username {}", account.username);
            }
        }
        Ok(())
    }
}
