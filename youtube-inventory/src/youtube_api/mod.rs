//! YouTube Data API v3 client, limited to what a channel inventory needs.
//!
//! Two endpoints are used:
//!
//! - `playlistItems.list` pages through a channel's uploads playlist (`UU…`), 50 items at a
//!   time, yielding video ids. See [`YouTubeClient::list_playlist_items`].
//! - `videos.list` looks up `snippet`, `contentDetails` and `status` for up to 50 ids per call.
//!   Ids the caller may not see are silently left out of the response. See
//!   [`YouTubeClient::list_videos`].
//!
//! Every call is authorized through an [`Access`] tier: an API key for public data, or the
//! channel owner's OAuth token for everything including private uploads.

pub mod access;
pub mod client;
pub mod playlist_items;
pub mod types;
pub mod videos;

#[cfg(test)]
pub(crate) mod mock;

pub use access::{Access, AccessMode};
pub use client::{DEFAULT_BASE_URL, StatusError, YouTubeClient};
pub use playlist_items::{PlaylistItem, PlaylistItemListResponse};
pub use types::{PageInfo, PageRequest, PagedStream};
pub use videos::{Video, VideoListResponse};
