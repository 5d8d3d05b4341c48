use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

/// Scopes requested at login
pub const DEFAULT_SCOPES: [&str; 5] = [
    "user-read-private",
    "playlist-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
];

/// Placeholder shipped in sample configuration files
const PLACEHOLDER_CLIENT_ID: &str = "YOUR_SPOTIFY_CLIENT_ID";

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Spotify PKCE session client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Spotify application client ID
    #[arg(short = 'c', long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Redirect URI registered for the application (must be a loopback address)
    #[arg(
        short = 'r',
        long,
        env = "SPOTIFY_REDIRECT_URI",
        default_value = "http://127.0.0.1:8888/callback"
    )]
    pub redirect_uri: String,

    /// Accounts service base URL
    #[arg(long, env = "SPOTIFY_ACCOUNTS_URL", default_value = DEFAULT_ACCOUNTS_URL)]
    pub accounts_url: String,

    /// Web API base URL
    #[arg(long, env = "SPOTIFY_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Seconds to wait for the login redirect
    #[arg(long, env = "CALLBACK_TIMEOUT", default_value = "300")]
    pub callback_timeout: u64,

    /// Playlists fetched per page (1-50)
    #[arg(long, env = "PLAYLIST_LIMIT", default_value = "50")]
    pub playlist_limit: u32,

    /// Tracks fetched per page (1-100)
    #[arg(long, env = "TRACK_LIMIT", default_value = "100")]
    pub track_limit: u32,

    /// Print the login URL instead of opening a browser
    #[arg(long, env = "NO_BROWSER")]
    pub no_browser: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Spotify application
    pub client_id: String,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,

    // Timeouts
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub callback_timeout: u64,

    // Paging
    pub playlist_limit: u32,
    pub track_limit: u32,

    pub open_browser: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            client_id: args
                .client_id
                .context("SPOTIFY_CLIENT_ID is required (use -c or set SPOTIFY_CLIENT_ID env var)")?,
            redirect_uri: args.redirect_uri,
            accounts_url: args.accounts_url,
            api_url: args.api_url,

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            http_request_timeout: args.http_timeout,
            callback_timeout: args.callback_timeout,

            playlist_limit: args.playlist_limit,
            track_limit: args.track_limit,

            open_browser: !args.no_browser,
            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let client_id = self.client_id.trim();
        if client_id.is_empty() || client_id == PLACEHOLDER_CLIENT_ID {
            anyhow::bail!("SPOTIFY_CLIENT_ID must be set to your application's client ID");
        }

        let redirect = Url::parse(&self.redirect_uri)
            .with_context(|| format!("Invalid SPOTIFY_REDIRECT_URI: {}", self.redirect_uri))?;
        if !is_loopback_host(redirect.host_str()) {
            anyhow::bail!(
                "SPOTIFY_REDIRECT_URI must point at a loopback address, got: {}",
                self.redirect_uri
            );
        }

        Url::parse(&self.accounts_url)
            .with_context(|| format!("Invalid SPOTIFY_ACCOUNTS_URL: {}", self.accounts_url))?;
        Url::parse(&self.api_url)
            .with_context(|| format!("Invalid SPOTIFY_API_URL: {}", self.api_url))?;

        if !(1..=50).contains(&self.playlist_limit) {
            anyhow::bail!("PLAYLIST_LIMIT must be between 1 and 50, got {}", self.playlist_limit);
        }
        if !(1..=100).contains(&self.track_limit) {
            anyhow::bail!("TRACK_LIMIT must be between 1 and 100, got {}", self.track_limit);
        }

        Ok(())
    }

    /// OAuth settings for the token manager
    pub fn oauth_settings(&self) -> Result<OAuthSettings> {
        let redirect_uri = Url::parse(&self.redirect_uri)
            .with_context(|| format!("Invalid SPOTIFY_REDIRECT_URI: {}", self.redirect_uri))?;

        Ok(OAuthSettings::new(self.client_id.trim(), redirect_uri)
            .with_accounts_url(&self.accounts_url)
            .with_api_url(&self.api_url))
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    matches!(host, Some("127.0.0.1") | Some("localhost") | Some("[::1]"))
}

/// OAuth client settings consumed by the token manager
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    client_id: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    accounts_url: String,
    api_url: String,
}

impl OAuthSettings {
    pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Override the accounts service base (authorize and token endpoints)
    pub fn with_accounts_url(mut self, url: &str) -> Self {
        self.accounts_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the Web API base
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url)
    }
}
