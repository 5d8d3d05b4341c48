// Spotify Web API wrappers over the token manager

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::TokenManager;
use crate::error::{AuthError, Result};
use crate::http_client::RequestOptions;
use crate::models::{Paging, Playlist, PlaylistItem, UserProfile};

pub const DEFAULT_PLAYLIST_LIMIT: u32 = 50;
pub const DEFAULT_TRACK_LIMIT: u32 = 100;

/// Typed access to the resource endpoints used by the session
#[derive(Clone)]
pub struct SpotifyApi {
    manager: Arc<TokenManager>,
}

impl SpotifyApi {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// `GET /me`
    pub async fn current_user(&self) -> Result<UserProfile> {
        self.get("/me").await
    }

    /// `GET /me/playlists?limit=N`
    pub async fn current_user_playlists(&self, limit: u32) -> Result<Paging<Playlist>> {
        self.get(&format!("/me/playlists?limit={}", limit)).await
    }

    /// `GET /playlists/{id}/tracks?limit=N`
    pub async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
    ) -> Result<Paging<PlaylistItem>> {
        self.get(&format!("/playlists/{}/tracks?limit={}", playlist_id, limit))
            .await
    }

    /// Follow a page's `next` link, if it has one
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        page: &Paging<T>,
    ) -> Result<Option<Paging<T>>> {
        let Some(next) = page.next.as_deref() else {
            return Ok(None);
        };

        let path = next
            .strip_prefix(self.manager.settings().api_url())
            .filter(|p| p.starts_with('/'))
            .ok_or_else(|| AuthError::UnexpectedPageLink(next.to_string()))?;

        self.get(path).await.map(Some)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .manager
            .authorized_fetch(path, RequestOptions::get())
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
