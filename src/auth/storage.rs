// Session-scoped key/value storage

use dashmap::DashMap;

/// Key holding the PKCE verifier between redirect and code exchange
pub const VERIFIER_KEY: &str = "pkce_verifier";

/// Key holding the serialized token record
pub const TOKEN_KEY: &str = "sp_token";

/// String key/value store scoped to one session
///
/// `set` replaces the whole value in one step, so readers never observe a
/// partially written record.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;
}

/// In-memory store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, value)| value)
    }
}
