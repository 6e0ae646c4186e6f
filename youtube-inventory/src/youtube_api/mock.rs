//! In-process stand-in for the YouTube Data API, for tests.
//!
//! The server binds to a random local port, records every request it receives, and answers
//! with whatever the test's handler returns. [`FakeChannel`] provides a handler that behaves
//! like the real API for one channel: a paginated uploads playlist and a `videos.list`
//! endpoint that hides private videos from API-key callers.

use crate::youtube_api::client::YouTubeClient;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    /// 0-based arrival order across the whole server.
    pub(crate) sequence: usize,
    pub(crate) received_at: Instant,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) authorization: Option<String>,
}

impl RecordedRequest {
    pub(crate) fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn ids(&self) -> Vec<&str> {
        self.param("id")
            .map(|ids| ids.split(',').collect())
            .unwrap_or_default()
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync>;

pub(crate) struct MockYouTube {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl MockYouTube {
    pub(crate) async fn start<H>(handler: H) -> Self
    where
        H: Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let server = tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    break;
                };
                let conn = hyper_util::rt::TokioIo::new(conn);
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<body::Incoming>| {
                        let handler = handler.clone();
                        let recorded = recorded.clone();
                        async move {
                            let (status, body) = {
                                let mut recorded = recorded.lock().expect("not poisoned");
                                let request = RecordedRequest {
                                    sequence: recorded.len(),
                                    received_at: Instant::now(),
                                    path: req.uri().path().to_string(),
                                    query: form_urlencoded::parse(
                                        req.uri().query().unwrap_or("").as_bytes(),
                                    )
                                    .into_owned()
                                    .collect(),
                                    authorization: req
                                        .headers()
                                        .get("Authorization")
                                        .and_then(|v| v.to_str().ok())
                                        .map(str::to_owned),
                                };
                                let answer = handler(&request);
                                recorded.push(request);
                                answer
                            };
                            let mut response =
                                Response::new(Full::<Bytes>::from(body.to_string()));
                            *response.status_mut() = status;
                            response.headers_mut().insert(
                                "Content-Type",
                                http::HeaderValue::from_static("application/json"),
                            );
                            Ok::<_, std::convert::Infallible>(response)
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
        });

        Self {
            addr,
            requests,
            server,
        }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn client(&self) -> YouTubeClient {
        YouTubeClient::new(reqwest::Client::new()).with_base_url(self.base_url())
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("not poisoned").clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockYouTube {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A fake channel: an ordered uploads playlist plus per-video metadata.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeChannel {
    pub(crate) uploads_playlist: String,
    pub(crate) playlist: Vec<String>,
    pub(crate) page_size: usize,
    /// Videos visible to anyone (public and unlisted).
    pub(crate) visible: HashMap<String, Value>,
    /// Videos only the owner's bearer token can see.
    pub(crate) private: HashMap<String, Value>,
    /// The bearer token the owner uses.
    pub(crate) owner_token: String,
}

impl FakeChannel {
    pub(crate) fn new(uploads_playlist: &str, owner_token: &str) -> Self {
        Self {
            uploads_playlist: uploads_playlist.to_string(),
            page_size: 50,
            owner_token: owner_token.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn upload(mut self, id: &str, privacy: &str, duration: &str) -> Self {
        let video = json!({
            "kind": "youtube#video",
            "id": id,
            "snippet": {"title": format!("Video {id}"), "publishedAt": "2023-01-01T00:00:00Z"},
            "contentDetails": {"duration": duration},
            "status": {"privacyStatus": privacy},
        });
        self.playlist.push(id.to_string());
        if privacy == "private" {
            self.private.insert(id.to_string(), video);
        } else {
            self.visible.insert(id.to_string(), video);
        }
        self
    }

    /// An id that is listed in the playlist but that no lookup will ever return.
    pub(crate) fn deleted(mut self, id: &str) -> Self {
        self.playlist.push(id.to_string());
        self
    }

    pub(crate) fn handle(&self, req: &RecordedRequest) -> (StatusCode, Value) {
        let elevated = req.authorization.as_deref() == Some(&*format!("Bearer {}", self.owner_token));
        if !elevated && req.param("key").is_none() {
            return (
                StatusCode::UNAUTHORIZED,
                json!({"error": {"message": "missing credentials"}}),
            );
        }
        match req.path.as_str() {
            "/playlistItems" => {
                if req.param("playlistId") != Some(self.uploads_playlist.as_str()) {
                    return (
                        StatusCode::NOT_FOUND,
                        json!({"error": {"message": "playlistNotFound"}}),
                    );
                }
                // the public playlist view leaves private uploads out
                let listed: Vec<&String> = self
                    .playlist
                    .iter()
                    .filter(|id| elevated || !self.private.contains_key(*id))
                    .collect();
                let start: usize = req
                    .param("pageToken")
                    .and_then(|t| t.strip_prefix("page-"))
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                let end = (start + self.page_size).min(listed.len());
                let items: Vec<Value> = listed[start.min(end)..end]
                    .iter()
                    .map(|id| json!({"kind": "youtube#playlistItem", "contentDetails": {"videoId": id}}))
                    .collect();
                let mut page = json!({
                    "kind": "youtube#playlistItemListResponse",
                    "items": items,
                    "pageInfo": {"totalResults": listed.len(), "resultsPerPage": self.page_size},
                });
                if end < listed.len() {
                    page["nextPageToken"] = json!(format!("page-{end}"));
                }
                (StatusCode::OK, page)
            }
            "/videos" => {
                let ids = req.ids();
                if ids.len() > 50 {
                    return (
                        StatusCode::BAD_REQUEST,
                        json!({"error": {"message": "too many ids"}}),
                    );
                }
                let items: Vec<Value> = ids
                    .iter()
                    .filter_map(|id| {
                        self.visible
                            .get(*id)
                            .or_else(|| elevated.then(|| self.private.get(*id)).flatten())
                            .cloned()
                    })
                    .collect();
                (
                    StatusCode::OK,
                    json!({"kind": "youtube#videoListResponse", "items": items}),
                )
            }
            _ => (StatusCode::NOT_FOUND, json!({})),
        }
    }

    pub(crate) async fn serve(self) -> MockYouTube {
        MockYouTube::start(move |req| self.handle(req)).await
    }
}
