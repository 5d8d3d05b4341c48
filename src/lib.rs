// Spotify PKCE session client - library root

pub mod api;
pub mod auth;
pub mod callback;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod ui;

pub use auth::{TokenManager, TokenRecord};
pub use error::{AuthError, Result};
