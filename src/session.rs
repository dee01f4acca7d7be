//! Cookie sessions with lazy expiry.
//!
//! An entry is active until its deadline, expired after it, and removed the
//! first time a lookup sees it expired. [`SessionStore::purge_expired`] evicts
//! expired entries nobody looks up again; the server calls it periodically.

use base64::Engine;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const COOKIE_NAME: &str = "session";

#[derive(Debug, Clone, Copy)]
struct Entry {
    user_id: u64,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new 256-bit token for `user_id`.
    pub fn create(&self, user_id: u64) -> String {
        self.create_at(user_id, Instant::now())
    }

    pub(crate) fn create_at(&self, user_id: u64, now: Instant) -> String {
        let token = generate_token();
        self.entries()
            .insert(token.clone(), Entry { user_id, expires_at: now + self.ttl });
        token
    }

    /// User id for an active token. An expired token is dropped here.
    pub fn lookup(&self, token: &str) -> Option<u64> {
        self.lookup_at(token, Instant::now())
    }

    pub(crate) fn lookup_at(&self, token: &str, now: Instant) -> Option<u64> {
        let mut entries = self.entries();
        let entry = *entries.get(token)?;
        if now < entry.expires_at {
            Some(entry.user_id)
        } else {
            entries.remove(token);
            None
        }
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.entries().remove(token).is_some()
    }

    /// Remove every expired entry, returning how many went.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // The map holds plain data, so a panic mid-update cannot leave it torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
