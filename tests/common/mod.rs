// Shared test doubles for the token manager integration tests

#![allow(dead_code)]

use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use spotify_pkce::auth::{
    Clock, MemorySessionStore, Navigator, SessionStore, TokenManager, TOKEN_KEY, VERIFIER_KEY,
};
use spotify_pkce::config::OAuthSettings;

pub const T0: i64 = 1_700_000_000_000;
pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Clock the test moves by hand
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.0.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Navigator that records every location it was asked to show
#[derive(Default)]
pub struct RecordingNavigator {
    pub navigated: Mutex<Vec<Url>>,
    pub replaced: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn last_navigated(&self) -> Option<Url> {
        self.navigated.lock().unwrap().last().cloned()
    }

    pub fn last_replaced(&self) -> Option<Url> {
        self.replaced.lock().unwrap().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) -> spotify_pkce::Result<()> {
        self.navigated.lock().unwrap().push(url.clone());
        Ok(())
    }

    fn replace_location(&self, url: &Url) {
        self.replaced.lock().unwrap().push(url.clone());
    }
}

pub struct Harness {
    pub manager: TokenManager,
    pub store: Arc<MemorySessionStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    /// Manager whose accounts and API bases both point at `server_url`
    pub fn new(server_url: &str) -> Self {
        let settings = OAuthSettings::new("test-client", REDIRECT_URI.parse().unwrap())
            .with_accounts_url(server_url)
            .with_api_url(&format!("{}/v1", server_url));

        let store = Arc::new(MemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let navigator = Arc::new(RecordingNavigator::default());

        let manager = TokenManager::new(settings, reqwest::Client::new())
            .with_store(store.clone())
            .with_clock(clock.clone())
            .with_navigator(navigator.clone());

        Self {
            manager,
            store,
            clock,
            navigator,
        }
    }

    pub fn seed_token(&self, token: Value) {
        self.store.set(TOKEN_KEY, token.to_string());
    }

    pub fn seed_verifier(&self, verifier: &str) {
        self.store.set(VERIFIER_KEY, verifier.to_string());
    }

    pub fn raw_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn stored_token(&self) -> Option<Value> {
        self.raw_token().map(|raw| serde_json::from_str(&raw).unwrap())
    }
}
