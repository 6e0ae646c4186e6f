//! Enumeration of every video id in a channel's uploads playlist.

use crate::config::{FetchOptions, PAGE_SIZE};
use crate::error::{InventoryError, Stage};
use crate::youtube_api::{Access, PageRequest, PagedStream, YouTubeClient};
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

/// Derives the uploads playlist of a channel: `UCxyz` becomes `UUxyz`.
pub fn uploads_playlist_id(channel_id: &str) -> Result<String, InventoryError> {
    match channel_id.strip_prefix("UC") {
        Some(rest) => Ok(format!("UU{rest}")),
        None => Err(InventoryError::InvalidChannelId {
            channel_id: channel_id.to_string(),
        }),
    }
}

/// Streams the video ids of a playlist in playlist order, one page of 50 at a time.
///
/// Pages after the first are requested only after `options.request_delay`. Items without a
/// video id are skipped. Duplicate ids are yielded as often as the playlist lists them.
pub fn playlist_video_ids<'a>(
    client: &'a YouTubeClient,
    access: &'a Access,
    playlist_id: &'a str,
    options: &'a FetchOptions,
) -> impl Stream<Item = Result<String, InventoryError>> + 'a {
    PagedStream::new(
        Stage::Playlist,
        options.max_pages,
        move |request: PageRequest| async move {
            if request.number > 1 {
                tokio::time::sleep(options.request_delay).await;
            }
            tracing::debug!(page = request.number, "fetching playlist page");
            let page = client
                .list_playlist_items(access, playlist_id, PAGE_SIZE, request.token.as_deref())
                .await?;
            let (ids, next_page_token) = page.into_page();
            tracing::debug!(page = request.number, videos = ids.len(), "got playlist page");
            Ok((ids, next_page_token))
        },
    )
}

/// Collects every video id of `channel_id`'s uploads, in playlist order.
///
/// With [`Access::Elevated`] the listing includes private uploads. The channel id is validated
/// before any request is made. Any failed page aborts the whole enumeration; there is no
/// partial result.
#[instrument(skip(client, access, options), fields(mode = %access.mode()))]
pub async fn enumerate(
    client: &YouTubeClient,
    channel_id: &str,
    access: &Access,
    options: &FetchOptions,
) -> Result<Vec<String>, InventoryError> {
    let playlist_id = uploads_playlist_id(channel_id)?;
    tracing::info!(playlist_id = %playlist_id, "enumerating uploads playlist");

    let ids = playlist_video_ids(client, access, &playlist_id, options);
    let mut ids = std::pin::pin!(ids);
    let mut video_ids = Vec::new();
    while let Some(id) = ids.next().await {
        video_ids.push(id?);
    }

    tracing::info!(total = video_ids.len(), "enumerated uploads playlist");
    Ok(video_ids)
}
