use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use super::pkce::{self, PkcePair};
use super::platform::{BrowserNavigator, Clock, Navigator, OsRandom, SecureRandom, SystemClock};
use super::refresh;
use super::storage::{MemorySessionStore, SessionStore, TOKEN_KEY, VERIFIER_KEY};
use super::types::TokenRecord;
use crate::config::OAuthSettings;
use crate::error::{AuthError, Result};
use crate::http_client::{error_kind, error_parts, RequestOptions};

/// Token manager
/// Owns the PKCE login flow and the bearer token lifecycle
pub struct TokenManager {
    /// Client id, redirect target, scopes and endpoints
    settings: OAuthSettings,

    /// HTTP client for token and resource requests
    client: Client,

    /// Session-scoped storage for the verifier and token record
    store: Arc<dyn SessionStore>,

    clock: Arc<dyn Clock>,
    random: Arc<dyn SecureRandom>,
    navigator: Arc<dyn Navigator>,

    /// Serializes validity checks so one expiry triggers one refresh
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Create a manager with in-memory storage, the system clock, the OS
    /// random source and the system browser
    pub fn new(settings: OAuthSettings, client: Client) -> Self {
        Self {
            settings,
            client,
            store: Arc::new(MemorySessionStore::new()),
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
            navigator: Arc::new(BrowserNavigator::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_random(mut self, random: Arc<dyn SecureRandom>) -> Self {
        self.random = random;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Generate a fresh PKCE verifier/challenge pair
    pub fn generate_challenge(&self) -> Result<PkcePair> {
        pkce::generate_challenge(self.random.as_ref())
    }

    /// Authorize endpoint URL for the given challenge
    pub fn authorization_url(&self, challenge: &str) -> Result<Url> {
        let scope = self.settings.scopes().join(" ");

        let mut url = Url::parse(&self.settings.authorize_url())?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.settings.client_id())
            .append_pair("scope", &scope)
            .append_pair("redirect_uri", self.settings.redirect_uri().as_str())
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", challenge);

        Ok(url)
    }

    /// Start a login attempt: store a new verifier and send the user agent
    /// to the authorize page. A previous, unfinished attempt is superseded.
    pub async fn begin_login(&self) -> Result<()> {
        let pair = self.generate_challenge()?;
        self.store.set(VERIFIER_KEY, pair.verifier);

        let url = self.authorization_url(&pair.challenge)?;
        tracing::info!(client_id = self.settings.client_id(), "Redirecting to authorize endpoint");

        self.navigator.navigate(&url)
    }

    /// Exchange an authorization code for a token record.
    ///
    /// The stored verifier is consumed whether or not the exchange succeeds.
    /// On failure the previous token record is left as it was.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        let verifier = self
            .store
            .remove(VERIFIER_KEY)
            .ok_or(AuthError::MissingVerifier)?;

        let response =
            refresh::exchange_authorization_code(&self.client, &self.settings, code, &verifier)
                .await?;

        let token = TokenRecord::from_response(response, self.clock.now_millis());
        self.save_token(&token)?;

        tracing::info!(
            "✅ Authorization code exchanged (token: {}...)",
            token_preview(&token.access_token)
        );

        Ok(token)
    }

    /// Refresh the stored token record
    pub async fn refresh(&self) -> Result<TokenRecord> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_unlocked().await
    }

    async fn refresh_unlocked(&self) -> Result<TokenRecord> {
        let mut token = self.load_token().ok_or(AuthError::NoRefreshToken)?;
        let refresh_token = match token.refresh_token.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(AuthError::NoRefreshToken),
        };

        let response =
            refresh::refresh_access_token(&self.client, &self.settings, &refresh_token).await?;

        token.merge(response, self.clock.now_millis());
        self.save_token(&token)?;

        tracing::info!(
            expires_at = token.expires_at_millis(),
            "Token refreshed (token: {}...)",
            token_preview(&token.access_token)
        );

        Ok(token)
    }

    /// Return a valid token record, refreshing once if it has expired.
    ///
    /// `None` means the user has to log in again; refresh failures are
    /// logged, not propagated.
    pub async fn ensure_valid(&self) -> Option<TokenRecord> {
        let _guard = self.refresh_lock.lock().await;

        let token = self.load_token()?;
        if token.is_valid_at(self.clock.now_millis()) {
            return Some(token);
        }

        tracing::debug!("Access token expired or expiring soon, refreshing...");
        match self.refresh_unlocked().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                None
            }
        }
    }

    /// Call the resource API with the current bearer token.
    ///
    /// The bearer `Authorization` header replaces any caller-supplied one.
    pub async fn authorized_fetch(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let token = self
            .ensure_valid()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        let url = format!("{}{}", self.settings.api_url(), path);
        let method = options.method.clone();

        let mut headers = options.headers;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.access_token))?,
        );

        let mut request = self.client.request(options.method, &url).headers(headers);
        if let Some(body) = options.body {
            request = request.json(&body);
        }

        tracing::debug!(method = %method, url = %url, "Sending API request");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                error_kind = error_kind(&e),
                error = %e,
                url = %url,
                "API request transport error"
            );
            AuthError::Http(e)
        })?;

        if !response.status().is_success() {
            let (status, body) = error_parts(response).await;
            tracing::error!(status, url = %url, response_body = %body, "API request failed");
            return Err(AuthError::ApiRequestFailed { status, body });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Process the location the provider redirected back to.
    ///
    /// Returns `true` when a `code` was consumed. The `code` parameter is
    /// stripped from the visible location after the exchange attempt.
    pub async fn handle_redirect(&self, location: &Url) -> Result<bool> {
        let mut code = None;
        let mut error = None;
        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                "code" if !value.is_empty() => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            tracing::warn!(error = %error, "Authorization was not granted");
            self.navigator
                .replace_location(&without_params(location, &["error", "state"]));
            return Err(AuthError::AuthorizationDenied(error));
        }

        let Some(code) = code else {
            return Ok(false);
        };

        let result = self.exchange_code(&code).await;
        self.navigator
            .replace_location(&without_params(location, &["code"]));

        result.map(|_| true)
    }

    /// The stored token record, if any
    pub fn current_token(&self) -> Option<TokenRecord> {
        self.load_token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.load_token().is_some()
    }

    fn load_token(&self) -> Option<TokenRecord> {
        let raw = self.store.get(TOKEN_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, "Stored token record is unreadable, ignoring it");
                None
            }
        }
    }

    fn save_token(&self, token: &TokenRecord) -> Result<()> {
        let raw = serde_json::to_string(token)?;
        self.store.set(TOKEN_KEY, raw);
        Ok(())
    }
}

/// Short prefix of a credential for log lines
fn token_preview(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

/// `location` with the named query parameters removed
fn without_params(location: &Url, names: &[&str]) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| !names.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = location.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}
