//! YouTube PlaylistItems API types.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    /// The value will be `youtube#playlistItemListResponse`.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `playlistItem` resource, restricted to the `contentDetails` part.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItemContentDetails {
    /// The ID that YouTube uses to uniquely identify the video the item refers to.
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

impl PlaylistItem {
    /// The referenced video id, if the item carries a non-empty one.
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .video_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

impl PlaylistItemListResponse {
    /// Splits the page into its video ids and the continuation token.
    pub fn into_page(self) -> (VecDeque<String>, Option<String>) {
        let ids = self
            .items
            .iter()
            .filter_map(|item| item.video_id().map(str::to_owned))
            .collect();
        (ids, self.next_page_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_page_extracts_video_ids() {
        let json = r#"
        {
            "kind": "youtube#playlistItemListResponse",
            "nextPageToken": "CDIQAA",
            "items": [
                {"kind": "youtube#playlistItem", "contentDetails": {"videoId": "a1", "videoPublishedAt": "2020-01-01T00:00:00Z"}},
                {"kind": "youtube#playlistItem", "contentDetails": {}},
                {"kind": "youtube#playlistItem"},
                {"kind": "youtube#playlistItem", "contentDetails": {"videoId": ""}},
                {"kind": "youtube#playlistItem", "contentDetails": {"videoId": "b2"}}
            ],
            "pageInfo": {"totalResults": 120, "resultsPerPage": 50}
        }"#;

        let parsed: PlaylistItemListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.page_info.total_results, 120);
        let (ids, token) = parsed.into_page();
        assert_eq!(ids, VecDeque::from(["a1".to_string(), "b2".to_string()]));
        assert_eq!(token.as_deref(), Some("CDIQAA"));
    }

    #[test]
    fn test_last_page_has_no_token() {
        let parsed: PlaylistItemListResponse =
            serde_json::from_str(r#"{"items": []}"#).unwrap();
        let (ids, token) = parsed.into_page();
        assert!(ids.is_empty());
        assert_eq!(token, None);
    }
}
