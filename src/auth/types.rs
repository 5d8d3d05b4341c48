// Authentication types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Safety margin before expiry after which a token counts as invalid
pub const EXPIRY_MARGIN_MS: i64 = 60_000;

/// Lifetime assumed when the provider omits `expires_in`
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

/// Stored token record (the `sp_token` session entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    /// Milliseconds since epoch when the record was last written
    pub obtained_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Any further fields the provider returned, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRecord {
    /// Build a record from a code exchange response
    pub fn from_response(response: TokenResponse, now_millis: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            obtained_at: now_millis,
            token_type: response.token_type,
            scope: response.scope,
            extra: response.extra,
        }
    }

    /// Overlay a refresh response onto this record.
    ///
    /// Fields present in the response win; absent ones (notably
    /// `refresh_token`) keep their previous value.
    pub fn merge(&mut self, response: TokenResponse, now_millis: i64) {
        self.access_token = response.access_token;
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(expires_in) = response.expires_in {
            self.expires_in = expires_in;
        }
        if let Some(token_type) = response.token_type {
            self.token_type = Some(token_type);
        }
        if let Some(scope) = response.scope {
            self.scope = Some(scope);
        }
        self.extra.extend(response.extra);
        self.obtained_at = now_millis;
    }

    /// `now - obtained_at < expires_in*1000 - 60000`
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        let lifetime = i64::try_from(self.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        now_millis.saturating_sub(self.obtained_at) < lifetime - EXPIRY_MARGIN_MS
    }

    /// Absolute expiry in milliseconds since epoch (without the margin)
    pub fn expires_at_millis(&self) -> i64 {
        let lifetime = i64::try_from(self.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        self.obtained_at.saturating_add(lifetime)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Token endpoint response (both grant types)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
