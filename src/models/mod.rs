// Data models for the Spotify Web API

pub mod spotify;

pub use spotify::{Album, Artist, Image, Paging, Playlist, PlaylistItem, Track, UserProfile};
