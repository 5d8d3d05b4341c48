// Session presentation helpers: preview playback state and list rendering

use crate::error::chain_requires_login;
use crate::models::{Playlist, Track, UserProfile};

pub const NO_PREVIEW_MESSAGE: &str = "No preview available for this track.";
pub const TRACKS_LOAD_FAILED: &str = "Failed to load playlist tracks.";
pub const PLAYLISTS_LOAD_FAILED: &str = "Failed to load more playlists.";

/// Turn a failed fetch into `None` so the menu stays usable. Errors that
/// need a fresh login are passed back up.
pub fn recover_fetch<T>(result: anyhow::Result<T>, message: &str) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if chain_requires_login(&e) => Err(e),
        Err(e) => {
            tracing::error!("❌ {} {:#}", message, e);
            println!("{}", message);
            Ok(None)
        }
    }
}

/// What the session should do after a track's play button was pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewAction {
    /// The track has no preview clip
    Unavailable,
    /// Switch to a new clip and start it
    Play(String),
    Pause,
    Resume,
}

/// Single shared preview player
#[derive(Debug, Default)]
pub struct PreviewPlayer {
    source: Option<String>,
    paused: bool,
}

impl PreviewPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pressing play on the clip already loaded toggles pause; any other
    /// clip replaces it and starts playing
    pub fn select(&mut self, preview_url: Option<&str>) -> PreviewAction {
        let Some(url) = preview_url.filter(|u| !u.is_empty()) else {
            return PreviewAction::Unavailable;
        };

        if self.source.as_deref() == Some(url) {
            self.paused = !self.paused;
            return if self.paused {
                PreviewAction::Pause
            } else {
                PreviewAction::Resume
            };
        }

        self.source = Some(url.to_string());
        self.paused = false;
        PreviewAction::Play(url.to_string())
    }

    pub fn current(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_some() && !self.paused
    }
}

pub fn profile_line(profile: &UserProfile) -> String {
    match &profile.email {
        Some(email) => format!("{} <{}>", profile.name(), email),
        None => profile.name().to_string(),
    }
}

pub fn playlist_line(playlist: &Playlist) -> String {
    format!("{} — {} tracks", playlist.name, playlist.tracks.total)
}

pub fn track_line(track: &Track) -> String {
    let marker = if track.preview_url.is_some() { "▶" } else { " " };
    let artists = track.artist_names();
    if artists.is_empty() {
        format!("{} {}", marker, track.name)
    } else {
        format!("{} {} — {}", marker, track.name, artists)
    }
}
