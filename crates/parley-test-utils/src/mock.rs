//! In-process mock HTTP backend.
//!
//! [`MockBackend`] binds an ephemeral localhost port, answers each path with
//! a canned [`MockResponse`], and records every request it receives so tests
//! can assert on method, path, query, headers and body.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::Response;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// The body parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A canned response: status, headers, and a body sent as a sequence of
/// separately flushed chunks.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    chunks: Vec<Vec<u8>>,
    chunk_delay: Duration,
}

impl MockResponse {
    /// `200 OK` with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(200, "application/json", vec![value.to_string().into_bytes()])
    }

    /// Any status with a plain-text body.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain", vec![body.as_bytes().to_vec()])
    }

    /// `200 OK` event stream; each element is sent as its own chunk.
    pub fn event_stream<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::new(
            200,
            "text/event-stream",
            chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
        )
        .with_chunk_delay(Duration::from_millis(5))
    }

    /// `200 OK` newline-delimited JSON; each element is sent as its own chunk.
    pub fn ndjson<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::new(
            200,
            "application/x-ndjson",
            chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
        )
        .with_chunk_delay(Duration::from_millis(5))
    }

    fn new(status: u16, content_type: &str, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![(header::CONTENT_TYPE.as_str().to_string(), content_type.to_string())],
            chunks,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Pause between chunks so they reach the client as separate reads.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn into_response(self) -> Response {
        let delay = self.chunk_delay;
        let body = futures_util::stream::iter(self.chunks).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, std::io::Error>(Bytes::from(chunk))
        });

        let mut builder = Response::builder()
            .status(StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Body::from_stream(body))
            .expect("mock response headers are valid")
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, MockResponse>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

/// A running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Bind `127.0.0.1:0` and start serving. Unknown paths get `404`.
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock backend");
        let addr = listener.local_addr().expect("mock backend has no address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Answer requests to `path` (query string ignored) with `response`.
    pub fn respond(&self, path: &str, response: MockResponse) -> &Self {
        self.lock().routes.insert(path.to_string(), response);
        self
    }

    /// `http://127.0.0.1:<port>` followed by `suffix`.
    pub fn url(&self, suffix: &str) -> String {
        format!("http://{}{}", self.addr, suffix)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> RecordedRequest {
        self.requests()
            .pop()
            .expect("mock backend received no requests")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };

    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    let response = state.routes.get(uri.path()).cloned();
    state.requests.push(recorded);
    drop(state);

    match response {
        Some(response) => response.into_response(),
        None => MockResponse::text(404, "no route").into_response(),
    }
}
