//! Tunables for how the pipeline talks to the YouTube Data API.

use std::time::Duration;

/// `maxResults` for `playlistItems.list`, the largest page the API hands out.
pub const PAGE_SIZE: u32 = 50;

/// The most ids `videos.list` accepts in a single call.
pub const BATCH_SIZE: usize = 50;

/// How the enumerator and the metadata fetcher pace and protect their requests.
///
/// The defaults reproduce a strictly sequential run: one request in flight, a short pause
/// between requests, and no retries.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Minimum spacing between request starts within a stage. Both metadata tiers count as one
    /// stage.
    pub request_delay: Duration,
    /// Ceiling on playlist pages, guarding against APIs that never stop handing out tokens.
    pub max_pages: usize,
    /// How many `videos.list` chunks of the same tier may be in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(100),
            max_pages: 10_000,
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff applied to each individual API request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: usize,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}
