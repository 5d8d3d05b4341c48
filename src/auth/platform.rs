// Platform capabilities injected into the token manager
// Clock, secure randomness and user-agent navigation

use rand::{rngs::OsRng, RngCore};
use url::Url;

use crate::error::{AuthError, Result};

/// Wall clock in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Source of cryptographically secure random bytes
pub trait SecureRandom: Send + Sync {
    /// Fill `buf` completely or fail with `RandomnessUnavailable`
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| AuthError::RandomnessUnavailable(e.to_string()))
    }
}

/// The user agent hosting the login flow
pub trait Navigator: Send + Sync {
    /// Send the user to `url` (full navigation away)
    fn navigate(&self, url: &Url) -> Result<()>;

    /// Replace the visible location without reloading
    fn replace_location(&self, url: &Url);
}

/// Navigator that hands URLs to the system browser
#[derive(Debug, Clone)]
pub struct BrowserNavigator {
    open_browser: bool,
}

impl BrowserNavigator {
    /// `open_browser = false` only prints the URL
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl Default for BrowserNavigator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &Url) -> Result<()> {
        println!();
        println!("Open this URL to log in to Spotify:");
        println!("  {}", url);
        println!();

        if self.open_browser {
            if let Err(e) = open::that(url.as_str()) {
                // The printed URL still works when no browser is available
                tracing::warn!(error = %e, "Could not open the system browser");
            }
        }

        Ok(())
    }

    fn replace_location(&self, url: &Url) {
        tracing::debug!(location = %url, "Callback location replaced");
    }
}
