//! HTTP transport for the two YouTube Data API calls the inventory needs.

use crate::config::RetryPolicy;
use crate::error::AuthFailure;
use crate::youtube_api::access::Access;
use crate::youtube_api::playlist_items::PlaylistItemListResponse;
use crate::youtube_api::videos::VideoListResponse;
use backoff::ExponentialBackoff;
use eyre::Context;
use http::{Method, StatusCode};
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// A non-success HTTP status returned by the API.
#[derive(Debug, thiserror::Error)]
#[error("YouTube API {method} request failed with status {status}: {body}")]
pub struct StatusError {
    pub method: Method,
    pub status: StatusCode,
    pub body: String,
}

/// Client for the YouTube Data API v3.
///
/// Unlike a per-user client, this one is not tied to a credential: every call takes the
/// [`Access`] tier to authenticate with, so the same client serves both the public and the
/// elevated lookups.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// HTTP client for API requests
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::none(),
        }
    }

    /// Points the client at a different API root, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Makes a request authorized for the given tier, retrying transient failures according
    /// to the client's [`RetryPolicy`].
    ///
    /// Transport errors, `429` and `5xx` responses are transient. Other statuses and credential
    /// refresh failures are returned immediately.
    #[instrument(skip(self, access), fields(mode = %access.mode()), level = tracing::Level::TRACE)]
    pub(crate) async fn make_request(
        &self,
        access: &Access,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let policy = ExponentialBackoff {
            initial_interval: self.retry.initial_interval,
            current_interval: self.retry.initial_interval,
            max_interval: self.retry.max_interval,
            multiplier: self.retry.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        backoff::future::retry(policy, || {
            attempt += 1;
            let attempt = attempt;
            let method = method.clone();
            let url = url.as_str();
            async move {
                match self.send_once(access, method, url, query_params).await {
                    Ok(response) => {
                        if attempt > 1 {
                            tracing::info!(url, attempt, "request succeeded after retrying");
                        }
                        Ok(response)
                    }
                    Err(e) if attempt <= self.retry.max_retries && is_transient(&e) => {
                        tracing::warn!(url, attempt, error = %e, "request failed, will retry");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn send_once(
        &self,
        access: &Access,
        method: Method,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<reqwest::Response> {
        let request = self.client.request(method.clone(), url).query(query_params);
        let request = access.authorize(request).await?;

        // the query carries the API key; keep URLs out of transport errors
        let response = request
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("send {} request to YouTube API: {}", method, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StatusError {
                method,
                status,
                body,
            }
            .into());
        }

        Ok(response)
    }

    /// Fetches one page of a playlist's items (`part=contentDetails`).
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self, access), fields(mode = %access.mode()))]
    pub async fn list_playlist_items(
        &self,
        access: &Access,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results_string.as_str()),
        ];

        if let Some(token) = page_token {
            query_params.push(("pageToken", token));
        }

        let response = self
            .make_request(access, Method::GET, "playlistItems", &query_params)
            .await?;

        let page: PlaylistItemListResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("parse YouTube playlistItems API response as JSON")?;

        tracing::debug!(
            total_results = page.page_info.total_results,
            returned_items = page.items.len(),
            has_next_page = page.next_page_token.is_some(),
            "fetched playlist items"
        );

        Ok(page)
    }

    /// Looks up `snippet`, `contentDetails` and `status` for up to 50 videos at once.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, access, video_ids), fields(mode = %access.mode(), count = video_ids.len()))]
    pub async fn list_videos(
        &self,
        access: &Access,
        video_ids: &[String],
    ) -> eyre::Result<VideoListResponse> {
        let ids = video_ids.join(",");
        let query_params = [("part", "snippet,contentDetails,status"), ("id", ids.as_str())];

        let response = self
            .make_request(access, Method::GET, "videos", &query_params)
            .await?;

        let videos: VideoListResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("parse YouTube videos API response as JSON")?;

        tracing::debug!(
            requested = video_ids.len(),
            returned_items = videos.items.len(),
            "fetched video metadata"
        );

        Ok(videos)
    }
}

fn is_transient(error: &eyre::Report) -> bool {
    if error.downcast_ref::<AuthFailure>().is_some() {
        return false;
    }
    if let Some(status) = error.downcast_ref::<StatusError>() {
        return status.status == StatusCode::TOO_MANY_REQUESTS || status.status.is_server_error();
    }
    error.downcast_ref::<reqwest::Error>().is_some()
}
