//! The normalized per-video record handed to the output stage.

use serde::{Deserialize, Serialize};

/// Note attached to records that no access tier could resolve.
pub const UNRESOLVED_NOTE: &str = "private_or_deleted_or_restricted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Short,
    Normal,
    Unknown,
}

/// Visibility of a video.
///
/// `Unresolved` is never reported by YouTube; we assign it to ids that neither the public nor
/// the elevated lookup returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
    Unknown,
    Unresolved,
}

impl Privacy {
    /// Maps a `status.privacyStatus` value. Absent or unrecognized values are `Unknown`.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("public") => Privacy::Public,
            Some("unlisted") => Privacy::Unlisted,
            Some("private") => Privacy::Private,
            _ => Privacy::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    /// The raw ISO 8601 duration as reported by YouTube.
    pub duration: Option<String>,
    pub duration_seconds: Option<u64>,
    #[serde(rename = "type")]
    pub video_type: VideoType,
    pub privacy: Privacy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VideoRecord {
    /// Placeholder for an id no tier could return details for.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            published_at: None,
            duration: None,
            duration_seconds: None,
            video_type: VideoType::Unknown,
            privacy: Privacy::Unresolved,
            note: Some(UNRESOLVED_NOTE.to_string()),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.privacy == Privacy::Unresolved
    }
}
