use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};
use std::sync::Arc;
use std::time::Duration;

use spotify_pkce::{
    api::SpotifyApi,
    auth::{BrowserNavigator, TokenManager},
    callback::CallbackServer,
    config::Config,
    http_client,
    models::{Paging, Playlist, PlaylistItem},
    ui::{self, PreviewAction, PreviewPlayer},
    error::chain_requires_login,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🎧 Spotify session starting...");

    let client = http_client::build_client(config.http_connect_timeout, config.http_request_timeout)?;
    let manager = Arc::new(
        TokenManager::new(config.oauth_settings()?, client)
            .with_navigator(Arc::new(BrowserNavigator::new(config.open_browser))),
    );
    let api = SpotifyApi::new(manager.clone());
    let mut player = PreviewPlayer::new();

    print_startup_banner(&config);

    let mut needs_login = !manager.is_authenticated();
    loop {
        if needs_login {
            if let Err(e) = login(&manager, &config).await {
                tracing::error!("❌ Spotify authentication failed: {:#}", e);
                if !ask("Try logging in again?")? {
                    break;
                }
                continue;
            }
            needs_login = false;
        }

        match browse(&api, &config, &mut player).await {
            Ok(()) => break,
            Err(e) if chain_requires_login(&e) => {
                tracing::warn!("Session no longer authenticated: {:#}", e);
                println!("Please log in to Spotify again.");
                if !ask("Log in now?")? {
                    break;
                }
                needs_login = true;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!("👋 Session closed");
    Ok(())
}

/// Run one PKCE login: listen for the redirect, send the browser to the
/// authorize page, then exchange the returned code
async fn login(manager: &TokenManager, config: &Config) -> Result<()> {
    let server = CallbackServer::bind(manager.settings().redirect_uri()).await?;

    manager.begin_login().await?;

    let location = server
        .wait(Duration::from_secs(config.callback_timeout))
        .await?;

    if !manager.handle_redirect(&location).await? {
        anyhow::bail!("Login redirect did not carry an authorization code");
    }

    tracing::info!("✅ Authentication successful");
    Ok(())
}

/// Profile, playlists and tracks until the user quits
async fn browse(api: &SpotifyApi, config: &Config, player: &mut PreviewPlayer) -> Result<()> {
    let profile = api.current_user().await?;
    println!();
    println!("Connected ✓  {}", ui::profile_line(&profile));
    if let Some(avatar) = profile.avatar_url() {
        println!("  Avatar: {}", avatar);
    }
    println!();

    let mut page = api.current_user_playlists(config.playlist_limit).await?;
    let mut playlists = std::mem::take(&mut page.items);

    loop {
        let mut labels: Vec<String> = playlists.iter().map(ui::playlist_line).collect();
        let more = page.has_next();
        if more {
            labels.push("More playlists...".to_string());
        }
        labels.push("Quit".to_string());

        let choice = Select::new()
            .with_prompt("Your playlists")
            .items(&labels)
            .default(0)
            .interact()
            .context("Failed to read playlist selection")?;

        if choice < playlists.len() {
            show_tracks(api, &playlists[choice], config, player).await?;
        } else if more && choice == playlists.len() {
            if let Some(next) =
                ui::recover_fetch(next_or_empty(api, &page).await, ui::PLAYLISTS_LOAD_FAILED)?
            {
                page = next;
                playlists.append(&mut page.items);
            }
        } else {
            return Ok(());
        }
    }
}

async fn show_tracks(
    api: &SpotifyApi,
    playlist: &Playlist,
    config: &Config,
    player: &mut PreviewPlayer,
) -> Result<()> {
    let fetched = api
        .playlist_tracks(&playlist.id, config.track_limit)
        .await
        .with_context(|| format!("Failed to load tracks of {}", playlist.name));
    let Some(mut page): Option<Paging<PlaylistItem>> =
        ui::recover_fetch(fetched, ui::TRACKS_LOAD_FAILED)?
    else {
        return Ok(());
    };
    let mut tracks: Vec<_> = page.items.drain(..).filter_map(|item| item.track).collect();

    println!();
    println!("{}", playlist.name);
    if let Some(cover) = playlist.cover_url() {
        println!("  Cover: {}", cover);
    }

    loop {
        let mut labels: Vec<String> = tracks.iter().map(ui::track_line).collect();
        let more = page.has_next();
        if more {
            labels.push("More tracks...".to_string());
        }
        labels.push("Back".to_string());

        let choice = Select::new()
            .with_prompt("Pick a track to play its preview")
            .items(&labels)
            .default(0)
            .interact()
            .context("Failed to read track selection")?;

        if choice < tracks.len() {
            let track = &tracks[choice];
            match player.select(track.preview_url.as_deref()) {
                PreviewAction::Unavailable => println!("{}", ui::NO_PREVIEW_MESSAGE),
                PreviewAction::Play(url) => {
                    println!("▶ {} ({})", track.name, url);
                    if let Err(e) = open::that(&url) {
                        tracing::warn!(error = %e, "Could not hand the preview to a player");
                    }
                }
                PreviewAction::Pause => println!("⏸ {} paused", track.name),
                PreviewAction::Resume => println!("▶ {} resumed", track.name),
            }
        } else if more && choice == tracks.len() {
            if let Some(next) =
                ui::recover_fetch(next_or_empty(api, &page).await, ui::TRACKS_LOAD_FAILED)?
            {
                page = next;
                tracks.extend(page.items.drain(..).filter_map(|item| item.track));
            }
        } else {
            return Ok(());
        }
    }
}

async fn next_or_empty<T: serde::de::DeserializeOwned>(
    api: &SpotifyApi,
    page: &Paging<T>,
) -> Result<Paging<T>> {
    Ok(api.next_page(page).await?.unwrap_or(Paging {
        items: Vec::new(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
        next: None,
        previous: None,
    }))
}

fn ask(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

/// Print startup banner
fn print_startup_banner(config: &Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║              🎧 Spotify PKCE Session                      ║
║                                                           ║
║  Log in, browse your playlists, play 30s previews         ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:      {}", env!("CARGO_PKG_VERSION"));
    println!("  Redirect URI: {}", config.redirect_uri);
    println!("  Accounts:     {}", config.accounts_url);
    println!("  Web API:      {}", config.api_url);
    println!("  Log Level:    {}", config.log_level);
    println!();
}
