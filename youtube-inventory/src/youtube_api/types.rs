//! Shared types and streaming infrastructure for the YouTube API client.

use crate::error::{InventoryError, Position, Stage};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = eyre::Result<(F, (VecDeque<T>, Option<String>))>> + 'a + Send>>;

/// What the page fetcher is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub number: usize,
    /// Continuation token from the previous page, `None` for the first page.
    pub token: Option<String>,
}

/// A paginated stream that automatically fetches subsequent pages from a YouTube API list endpoint.
///
/// This stream yields items one by one, fetching the next page when the current page is
/// exhausted. Only the absence of a continuation token ends the stream; empty pages do not.
///
/// Continuation tokens are single-use. A token seen twice, or a page count above the ceiling,
/// ends the stream with [`InventoryError::EnumerationCycleDetected`] instead of looping forever.
pub struct PagedStream<'a, T, F> {
    /// Current batch of items from the most recent API response
    current_items: VecDeque<T>,
    /// Future representing the currently pending API request, if any
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Whether we've reached the end of all available data
    is_done: bool,
    /// Number of the page currently being fetched (or last fetched).
    page: usize,
    max_pages: usize,
    seen_tokens: HashSet<String>,
    stage: Stage,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    pub fn new<Fut>(stage: Stage, max_pages: usize, fetcher: F) -> Self
    where
        F: Fn(PageRequest) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
    {
        let first_page = async move {
            let results = fetcher(PageRequest {
                number: 1,
                token: None,
            })
            .await?;
            Ok((fetcher, results))
        };
        Self {
            pending_request: Some(Box::pin(first_page)),
            current_items: VecDeque::new(),
            is_done: false,
            page: 1,
            max_pages: max_pages.max(1),
            seen_tokens: HashSet::new(),
            stage,
        }
    }

    fn fail(&mut self, error: InventoryError) -> Poll<Option<Result<T, InventoryError>>> {
        self.pending_request = None;
        self.current_items.clear();
        self.is_done = true;
        Poll::Ready(Some(Err(error)))
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(PageRequest) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
{
    type Item = Result<T, InventoryError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                    self.current_items.extend(items);

                    let Some(token) = next_token.filter(|t| !t.is_empty()) else {
                        self.is_done = true;
                        self.pending_request = None;
                        continue;
                    };

                    let next = self.page + 1;
                    if next > self.max_pages || !self.seen_tokens.insert(token.clone()) {
                        tracing::error!(page = next, token = %token, "pagination does not terminate");
                        return self.fail(InventoryError::EnumerationCycleDetected {
                            page: next,
                            token,
                        });
                    }
                    self.page = next;

                    // set up the next page, but don't poll it until the current items are drained
                    let request = PageRequest {
                        number: next,
                        token: Some(token),
                    };
                    self.pending_request = Some(Box::pin(async move {
                        let results = fetcher(request).await?;
                        Ok((fetcher, results))
                    }));
                }
                Poll::Ready(Err(e)) => {
                    let error = InventoryError::fetch(self.stage, Position::Page(self.page), e);
                    return self.fail(error);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}
