//! Two-tier batched metadata lookup.
//!
//! Every id is first looked up with the public API key. Whatever that tier could not see is
//! looked up again with the channel owner's credential, if one was supplied. Whatever neither
//! tier returned ends up in [`Resolution::missing`].

use crate::config::{BATCH_SIZE, FetchOptions};
use crate::credential::Credential;
use crate::error::{InventoryError, Position, Stage};
use crate::youtube_api::{Access, Video, VideoListResponse, YouTubeClient};
use futures::TryStreamExt;
use futures::stream::FuturesOrdered;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::instrument;

#[derive(Debug, Default)]
pub struct Resolution {
    /// Metadata for every id any tier returned.
    pub found: HashMap<String, Video>,
    /// Ids no tier returned, in their original relative order. Repeated ids stay repeated.
    pub missing: Vec<String>,
}

impl Resolution {
    pub fn missing_set(&self) -> HashSet<String> {
        self.missing.iter().cloned().collect()
    }
}

/// Resolves metadata for `ids`, falling back to `credential` for ids the API key cannot see.
///
/// Any failed chunk aborts the whole call.
#[instrument(skip_all, fields(ids = ids.len(), elevated = credential.is_some()))]
pub async fn resolve(
    client: &YouTubeClient,
    ids: &[String],
    api_key: &str,
    credential: Option<&Credential>,
    options: &FetchOptions,
) -> Result<Resolution, InventoryError> {
    let mut found = HashMap::new();
    let pacer = Pacer::new(options.request_delay);

    lookup_tier(client, &Access::public(api_key), ids, options, &pacer, &mut found).await?;
    let mut missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains_key(*id))
        .cloned()
        .collect();
    tracing::info!(
        found = found.len(),
        missing = missing.len(),
        "public metadata lookup done"
    );

    if let Some(credential) = credential {
        if !missing.is_empty() {
            let elevated = Access::elevated(credential.clone());
            let before = found.len();
            lookup_tier(client, &elevated, &missing, options, &pacer, &mut found).await?;
            missing.retain(|id| !found.contains_key(id));
            tracing::info!(
                found = found.len() - before,
                still_missing = missing.len(),
                "elevated metadata lookup done"
            );
        }
    }

    if !missing.is_empty() {
        tracing::warn!(
            count = missing.len(),
            "some videos could not be resolved by any tier"
        );
    }

    Ok(Resolution { found, missing })
}

/// Spaces out the starts of `videos.list` requests across both tiers, however many chunks
/// are in flight.
#[derive(Debug)]
struct Pacer(Option<Mutex<Interval>>);

impl Pacer {
    fn new(delay: Duration) -> Self {
        if delay.is_zero() {
            return Pacer(None);
        }
        let mut interval = tokio::time::interval(delay);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Pacer(Some(Mutex::new(interval)))
    }

    /// Returns immediately the first time, then at most once per delay.
    async fn wait(&self) {
        if let Some(interval) = &self.0 {
            interval.lock().await.tick().await;
        }
    }
}

/// Looks up `ids` in chunks of at most 50 with one access tier, merging results into `found`.
///
/// Up to `options.concurrency` chunks are in flight at a time, each waiting its turn on `pacer`.
/// Results are merged in chunk order, and the first failing chunk drops (and so cancels) the
/// ones still running.
async fn lookup_tier(
    client: &YouTubeClient,
    access: &Access,
    ids: &[String],
    options: &FetchOptions,
    pacer: &Pacer,
    found: &mut HashMap<String, Video>,
) -> Result<(), InventoryError> {
    let semaphore = Semaphore::new(options.concurrency.max(1));
    let tasks: FuturesOrdered<_> = ids
        .chunks(BATCH_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let semaphore = &semaphore;
            async move {
                let position = Position::Chunk(i + 1);
                let _permit = semaphore.acquire().await.map_err(|e| {
                    InventoryError::fetch(Stage::Metadata, position, eyre::Report::new(e))
                })?;
                pacer.wait().await;
                tracing::debug!(mode = %access.mode(), chunk = i + 1, size = chunk.len(), "looking up chunk");
                client
                    .list_videos(access, chunk)
                    .await
                    .map_err(|e| InventoryError::fetch(Stage::Metadata, position, e))
            }
        })
        .collect();

    let responses: Vec<VideoListResponse> = tasks.try_collect().await?;
    for response in responses {
        for video in response.items {
            if video.id.is_empty() {
                continue;
            }
            found.insert(video.id.clone(), video);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::fresh_credential;
    use crate::youtube_api::mock::{FakeChannel, MockYouTube};
    use http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    fn quick() -> FetchOptions {
        FetchOptions {
            request_delay: Duration::from_millis(1),
            ..FetchOptions::default()
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn public_tier_resolves_visible_videos() {
        let mock = FakeChannel::new("UUc", "owner")
            .upload("a", "public", "PT1M")
            .upload("b", "unlisted", "PT30S")
            .serve()
            .await;

        let resolution = resolve(&mock.client(), &ids(&["a", "b"]), "k", None, &quick())
            .await
            .unwrap();
        assert_eq!(resolution.found.len(), 2);
        assert!(resolution.missing.is_empty());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn without_credential_the_gap_is_missing() {
        let mock = FakeChannel::new("UUc", "owner")
            .upload("a", "public", "PT1M")
            .upload("b", "private", "PT1M")
            .deleted("c")
            .serve()
            .await;

        let resolution = resolve(
            &mock.client(),
            &ids(&["a", "b", "c"]),
            "k",
            None,
            &quick(),
        )
        .await
        .unwrap();
        assert_eq!(
            resolution.found.keys().cloned().collect::<HashSet<_>>(),
            HashSet::from(["a".to_string()])
        );
        assert_eq!(resolution.missing, vec!["b", "c"]);
        assert!(mock.requests().iter().all(|r| r.authorization.is_none()));
    }

    #[tokio::test]
    async fn elevated_tier_only_asks_for_the_gap() {
        let mock = FakeChannel::new("UUc", "owner")
            .upload("a", "public", "PT1M")
            .upload("b", "private", "PT1M")
            .upload("c", "public", "PT1M")
            .deleted("d")
            .serve()
            .await;
        let credential = fresh_credential("owner");

        let resolution = resolve(
            &mock.client(),
            &ids(&["a", "b", "c", "d"]),
            "k",
            Some(&credential),
            &quick(),
        )
        .await
        .unwrap();
        assert_eq!(resolution.found.len(), 3);
        assert_eq!(resolution.missing, vec!["d"]);

        let requests = mock.requests_to("/videos");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("key"), Some("k"));
        assert_eq!(requests[0].ids(), vec!["a", "b", "c", "d"]);
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer owner"));
        assert_eq!(requests[1].param("key"), None);
        assert_eq!(requests[1].ids(), vec!["b", "d"]);
    }

    #[tokio::test]
    async fn elevated_tier_is_skipped_when_nothing_is_missing() {
        let mock = FakeChannel::new("UUc", "owner")
            .upload("a", "public", "PT1M")
            .serve()
            .await;
        let credential = fresh_credential("owner");
        resolve(&mock.client(), &ids(&["a"]), "k", Some(&credential), &quick())
            .await
            .unwrap();
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn ids_are_chunked_by_fifty() {
        let mut channel = FakeChannel::new("UUc", "owner");
        let mut all = Vec::new();
        for i in 0..120 {
            let id = format!("v{i}");
            channel = if i % 40 == 0 {
                channel.upload(&id, "private", "PT5S")
            } else {
                channel.upload(&id, "public", "PT5S")
            };
            all.push(id);
        }
        let mock = channel.serve().await;
        let credential = fresh_credential("owner");

        let resolution = resolve(&mock.client(), &all, "k", Some(&credential), &quick())
            .await
            .unwrap();
        assert_eq!(resolution.found.len(), 120);
        assert!(resolution.missing.is_empty());

        let requests = mock.requests_to("/videos");
        let sizes: Vec<usize> = requests.iter().map(|r| r.ids().len()).collect();
        // three public chunks, then one elevated chunk with v0, v40 and v80
        assert_eq!(sizes, vec![50, 50, 20, 3]);
        assert_eq!(requests[3].ids(), vec!["v0", "v40", "v80"]);
    }

    #[tokio::test]
    async fn concurrent_chunks_keep_results_by_id() {
        let mut channel = FakeChannel::new("UUc", "owner");
        let mut all = Vec::new();
        for i in 0..180 {
            let id = format!("v{i}");
            channel = channel.upload(&id, "public", "PT5S");
            all.push(id);
        }
        let mock = channel.serve().await;
        let options = FetchOptions {
            concurrency: 4,
            ..quick()
        };

        let resolution = resolve(&mock.client(), &all, "k", None, &options)
            .await
            .unwrap();
        assert_eq!(resolution.found.len(), 180);
        for id in &all {
            assert_eq!(&resolution.found[id].id, id);
        }
        assert_eq!(mock.requests().len(), 4);
    }

    #[tokio::test]
    async fn requests_are_spaced_across_tiers_and_concurrent_chunks() {
        let mut channel = FakeChannel::new("UUc", "owner");
        let mut all = Vec::new();
        for i in 0..120 {
            let id = format!("v{i}");
            let privacy = if i == 7 { "private" } else { "public" };
            channel = channel.upload(&id, privacy, "PT5S");
            all.push(id);
        }
        let mock = channel.serve().await;
        let credential = fresh_credential("owner");
        let delay = Duration::from_millis(60);
        let options = FetchOptions {
            request_delay: delay,
            concurrency: 4,
            ..FetchOptions::default()
        };

        resolve(&mock.client(), &all, "k", Some(&credential), &options)
            .await
            .unwrap();

        let requests = mock.requests();
        // three public chunks, then the elevated one for v7
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].ids(), vec!["v7"]);
        for pair in requests.windows(2) {
            let gap = pair[1].received_at.duration_since(pair[0].received_at);
            // allow a little scheduling jitter between send and receipt
            assert!(gap >= delay - Duration::from_millis(15), "{gap:?}");
        }
    }

    #[tokio::test]
    async fn failing_chunk_aborts_resolution() {
        let mock = MockYouTube::start(|req| {
            if req.ids().contains(&"v60") {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({}))
            } else {
                (StatusCode::OK, json!({"items": []}))
            }
        })
        .await;
        let all: Vec<String> = (0..120).map(|i| format!("v{i}")).collect();

        let err = resolve(&mock.client(), &all, "k", None, &quick())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                InventoryError::Fetch {
                    stage: Stage::Metadata,
                    position: Position::Chunk(2),
                    ..
                }
            ),
            "{err:?}"
        );
        // the third chunk never went out
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_stay_in_the_gap() {
        let mock = FakeChannel::new("UUc", "owner")
            .upload("a", "public", "PT1M")
            .deleted("x")
            .serve()
            .await;
        let resolution = resolve(
            &mock.client(),
            &ids(&["x", "a", "x"]),
            "k",
            None,
            &quick(),
        )
        .await
        .unwrap();
        assert_eq!(resolution.missing, vec!["x", "x"]);
        assert_eq!(resolution.missing_set().len(), 1);
    }
}
