//! Errors surfaced by the inventory pipeline.
//!
//! Transport plumbing inside [`crate::youtube_api`] reports failures as [`eyre::Report`]s. The
//! pipeline components wrap those into [`InventoryError`] so callers can tell which stage and
//! which page or chunk gave up.

use std::fmt;
use thiserror::Error;

/// Boxed underlying cause of a failed request.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The pipeline stage a request belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Paging through the uploads playlist.
    Playlist,
    /// Batched `videos.list` lookups.
    Metadata,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Playlist => f.write_str("playlist"),
            Stage::Metadata => f.write_str("metadata"),
        }
    }
}

/// Where within a stage a request failed. Both counters are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Page(usize),
    Chunk(usize),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Page(n) => write!(f, "page {n}"),
            Position::Chunk(n) => write!(f, "chunk {n}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Channel ids have to start with `UC` for the uploads playlist to be derivable.
    #[error("invalid channel id {channel_id:?}: must start with 'UC'")]
    InvalidChannelId { channel_id: String },

    #[error("{stage} request failed at {position}")]
    Fetch {
        stage: Stage,
        position: Position,
        #[source]
        cause: Cause,
    },

    /// The API handed back a continuation token it had already given us, or the page ceiling
    /// was reached.
    #[error("playlist pagination did not terminate (page {page}, token {token:?})")]
    EnumerationCycleDetected { page: usize, token: String },

    #[error("elevated credential is unusable")]
    Auth(#[source] Cause),
}

impl InventoryError {
    pub(crate) fn fetch(stage: Stage, position: Position, cause: eyre::Report) -> Self {
        // An auth failure surfaced mid-request should not be reported as a transport problem.
        if cause.downcast_ref::<AuthFailure>().is_some() {
            return InventoryError::Auth(cause.into());
        }
        InventoryError::Fetch {
            stage,
            position,
            cause: cause.into(),
        }
    }
}

/// Marker error raised when an expired elevated credential cannot be refreshed.
///
/// It travels inside an [`eyre::Report`] through the client and is turned back into
/// [`InventoryError::Auth`] at the component boundary.
#[derive(Debug, Error)]
#[error("unable to refresh expired access token: {reason}")]
pub struct AuthFailure {
    pub(crate) reason: String,
}
