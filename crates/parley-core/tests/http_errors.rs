//! Status mapping, transport failures and model-listing fallback.

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::Level;

use parley_core::llm::{Backend, CallOptions, ErrorKind, Message, ProviderError, Registry};
use parley_test_utils::capture::LogCapture;
use parley_test_utils::config::{keyed_provider, local_provider};
use parley_test_utils::mock::{MockBackend, MockResponse};

fn registry() -> Registry {
    Registry::with_client(reqwest::Client::new())
}

fn hello() -> Vec<Message> {
    vec![Message::user("Hello")]
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1/chat/completions",
        MockResponse::text(401, r#"{"error":{"message":"Incorrect API key"}}"#),
    );
    let provider = registry()
        .get_provider("openai", &keyed_provider("bad", &mock.url("/v1")))
        .unwrap();

    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Auth(ref body) if body.contains("Incorrect API key")));
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[tokio::test]
async fn test_forbidden_on_stream_maps_to_auth() {
    let mock = MockBackend::start().await;
    mock.respond("/v1/messages", MockResponse::text(403, "forbidden"));
    let provider = registry()
        .get_provider("anthropic", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();

    let err = provider
        .stream(&hello(), &CallOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProviderError::Auth(_)));
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1/chat/completions",
        MockResponse::text(429, "slow down").with_header("retry-after", "7"),
    );
    let provider = registry()
        .get_provider("groq", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();

    let err = provider
        .stream(&hello(), &CallOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: 7
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_without_header_defaults() {
    let mock = MockBackend::start().await;
    mock.respond("/api/chat", MockResponse::text(429, "busy"));
    let provider = registry()
        .get_provider("ollama", &local_provider(&mock.url("")))
        .unwrap();

    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: 60
        }
    ));
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1beta/models/gemini-1.5-pro:generateContent",
        MockResponse::text(500, "overloaded"),
    );
    let provider = registry()
        .get_provider("google", &keyed_provider("k", &mock.url("/v1beta")))
        .unwrap();

    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    match err {
        ProviderError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected Backend, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = registry()
        .get_provider("lmstudio", &local_provider(&format!("http://{addr}/v1")))
        .unwrap();
    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Backend);
}

/// Accept one connection, consume the request, then answer with a status
/// line and a body cut short of its declared length.
async fn truncated_error_server() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\ntrunc")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_unreadable_error_body_is_reported() {
    let addr = truncated_error_server().await;
    let provider = registry()
        .get_provider("lmstudio", &local_provider(&format!("http://{addr}/v1")))
        .unwrap();

    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    match err {
        ProviderError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert!(message.starts_with("<body unavailable: "), "message was {message:?}");
        }
        other => panic!("expected Backend, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_completion_is_parse_error() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1/chat/completions",
        MockResponse::text(200, "<html>gateway</html>"),
    );
    let provider = registry()
        .get_provider("openai", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();
    let err = provider
        .complete(&hello(), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)), "got {err:?}");
}

// ── Model listing ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_openai_models_are_filtered() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1/models",
        MockResponse::json(json!({
            "object": "list",
            "data": [
                {"id": "gpt-4o", "object": "model"},
                {"id": "whisper-1", "object": "model"},
                {"id": "gpt-3.5-turbo", "object": "model"}
            ]
        })),
    );
    let provider = registry()
        .get_provider("openai", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();

    assert_eq!(provider.list_models().await, vec!["gpt-4o", "gpt-3.5-turbo"]);
    let req = mock.last_request();
    assert_eq!(req.method, "GET");
    assert_eq!(req.header("authorization"), Some("Bearer k"));
}

#[tokio::test]
async fn test_google_models_strip_prefix_and_filter() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/v1beta/models",
        MockResponse::json(json!({
            "models": [
                {"name": "models/gemini-1.5-pro"},
                {"name": "models/embedding-001"},
                {"name": "models/gemini-1.5-flash"}
            ]
        })),
    );
    let provider = registry()
        .get_provider("google", &keyed_provider("k", &mock.url("/v1beta")))
        .unwrap();
    assert_eq!(
        provider.list_models().await,
        vec!["gemini-1.5-pro", "gemini-1.5-flash"]
    );
}

#[tokio::test]
async fn test_ollama_models_come_from_tags() {
    let mock = MockBackend::start().await;
    mock.respond(
        "/api/tags",
        MockResponse::json(json!({
            "models": [{"name": "llama3:latest"}, {"name": "phi3:mini"}]
        })),
    );
    let provider = registry()
        .get_provider("ollama", &local_provider(&mock.url("")))
        .unwrap();
    assert_eq!(provider.list_models().await, vec!["llama3:latest", "phi3:mini"]);
}

#[tokio::test]
async fn test_listing_failure_falls_back_and_warns() {
    let capture = LogCapture::new();
    let _guard = capture.set_default();

    let mock = MockBackend::start().await;
    mock.respond("/v1/models", MockResponse::text(500, "down"));
    let provider = registry()
        .get_provider("mistral", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();

    let models = provider.list_models().await;
    let expected: Vec<String> = Backend::Mistral
        .fallback_models()
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert_eq!(models, expected);
    assert!(capture.contains(Level::WARN, "model listing failed"));
}

#[tokio::test]
async fn test_empty_listing_falls_back() {
    let mock = MockBackend::start().await;
    mock.respond("/v1/models", MockResponse::json(json!({"data": []})));
    let provider = registry()
        .get_provider("openrouter", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();
    let models = provider.list_models().await;
    assert!(models.iter().any(|m| m == Backend::OpenRouter.default_model()));
}

#[tokio::test]
async fn test_anthropic_lists_curated_models_without_request() {
    let mock = MockBackend::start().await;
    let provider = registry()
        .get_provider("anthropic", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();
    let models = provider.list_models().await;
    assert!(models.iter().any(|m| m == "claude-3-opus-20240229"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_record_is_logged_with_the_record() {
    let capture = LogCapture::new();
    let _guard = capture.set_default();

    let mock = MockBackend::start().await;
    mock.respond(
        "/v1/chat/completions",
        MockResponse::event_stream([
            "data: {not json}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        ]),
    );
    let provider = registry()
        .get_provider("openai", &keyed_provider("k", &mock.url("/v1")))
        .unwrap();
    let stream = provider
        .stream(&hello(), &CallOptions::default())
        .await
        .unwrap();
    let texts: Vec<String> = futures_util::TryStreamExt::try_collect(stream)
        .await
        .unwrap();
    assert_eq!(texts, vec!["ok"]);

    let warnings = capture.at_level(Level::WARN);
    let skipped = warnings
        .iter()
        .find(|e| e.message.contains("malformed"))
        .expect("malformed record was not logged");
    assert_eq!(skipped.field("record"), Some("{not json}"));
}
