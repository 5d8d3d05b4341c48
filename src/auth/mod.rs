// Authentication module
// PKCE login flow and token lifecycle

mod manager;
pub mod pkce;
pub mod platform;
mod refresh;
pub mod storage;
mod types;

pub use manager::TokenManager;
pub use pkce::PkcePair;
pub use platform::{BrowserNavigator, Clock, Navigator, OsRandom, SecureRandom, SystemClock};
pub use storage::{MemorySessionStore, SessionStore, TOKEN_KEY, VERIFIER_KEY};
pub use types::{TokenRecord, TokenResponse, DEFAULT_EXPIRES_IN, EXPIRY_MARGIN_MS};
