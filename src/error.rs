// Error handling module
// Defines the token manager's error taxonomy

use thiserror::Error;

/// Errors raised by the token manager and the resource API wrappers
#[derive(Error, Debug)]
pub enum AuthError {
    /// The platform could not supply secure random bytes
    #[error("Secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// Token endpoint answered with a non-success status
    #[error("Token exchange failed: {status} - {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// Refresh requested but the stored record has no refresh token
    #[error("No refresh token")]
    NoRefreshToken,

    /// No usable token record; the user has to log in again
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Resource API answered with a non-success status
    #[error("API request failed: {status} - {body}")]
    ApiRequestFailed { status: u16, body: String },

    /// Code exchange attempted without a stored PKCE verifier
    #[error("No PKCE verifier stored for this login attempt")]
    MissingVerifier,

    /// Provider redirected back with an `error` parameter
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The user agent could not be sent to the authorize page
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A paging link pointed outside the resource API
    #[error("Unexpected page link: {0}")]
    UnexpectedPageLink(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Whether the caller should fall back to "please log in" instead of
    /// treating the error as a hard failure
    pub fn requires_login(&self) -> bool {
        match self {
            AuthError::NotAuthenticated
            | AuthError::NoRefreshToken
            | AuthError::MissingVerifier
            | AuthError::AuthorizationDenied(_)
            | AuthError::TokenExchangeFailed { .. } => true,
            AuthError::ApiRequestFailed { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// `requires_login` for an error anywhere in an `anyhow` chain
pub fn chain_requires_login(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AuthError>())
        .is_some_and(AuthError::requires_login)
}

/// Result type alias for token manager operations
pub type Result<T> = std::result::Result<T, AuthError>;
