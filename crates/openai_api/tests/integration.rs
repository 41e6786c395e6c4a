use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use openai_api::{
    ChatCompletionRequest, ChatMessage, OpenAiApiClient, OpenAiApiConfig, OpenAiApiError,
    StreamEvent,
};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("OPENAI_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        chunks: Vec<ResponseChunk>,
    },
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}/v1");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let bodies = Arc::clone(&bodies);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let bodies = Arc::clone(&bodies);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, bodies).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            bodies,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().expect("bodies lock").clone()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_sse(status: u16, frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: sse_frames(frames),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn sse_frames(frames: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    body.into_bytes()
}

fn hello_request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("gpt-4o-mini", vec![ChatMessage::new("user", "hi")])
}

fn client_for(server: &ScriptedServer) -> OpenAiApiClient {
    let config = OpenAiApiConfig::new("sk-test").with_base_url(&server.base_url);
    OpenAiApiClient::new(config).expect("client")
}

async fn collect_content(client: &OpenAiApiClient) -> Result<(Option<String>, String), OpenAiApiError> {
    let mut stream = client.open_stream(&hello_request()).await?;
    let mut role = None;
    let mut content = String::new();

    while let Some(event) = stream.next_event().await {
        match event? {
            StreamEvent::Chunk(chunk) => {
                if let Some(delta) = chunk.first_delta() {
                    if role.is_none() {
                        role = delta.role.clone();
                    }
                    if let Some(piece) = &delta.content {
                        content.push_str(piece);
                    }
                }
            }
            StreamEvent::Done => break,
        }
    }

    Ok((role, content))
}

#[tokio::test]
async fn stream_integration_successful_completion() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[
            r##"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"##,
            r##"{"choices":[{"index":0,"delta":{"content":"hel"}}]}"##,
            r##"{"choices":[{"index":0,"delta":{"content":"lo"}}]}"##,
            "[DONE]",
        ],
    )])
    .await;

    let client = client_for(&server);
    let (role, content) = collect_content(&client)
        .await
        .expect("stream should succeed");

    assert_eq!(role.as_deref(), Some("assistant"));
    assert_eq!(content, "hello");

    let bodies = server.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["stream"], Value::Bool(true));
    assert_eq!(bodies[0]["model"], Value::String("gpt-4o-mini".to_string()));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_frames_split_across_slow_chunks() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: b"data: {\"choices\":[{\"delta\":{\"content\":\"par".to_vec(),
            },
            ResponseChunk {
                delay_ms: 50,
                bytes: b"tial\"}}]}\n\ndata: [DONE]\n\n".to_vec(),
            },
        ],
    }])
    .await;

    let client = client_for(&server);
    let (role, content) = timeout(Duration::from_secs(5), collect_content(&client))
        .await
        .expect("stream should resolve")
        .expect("stream should succeed");

    assert_eq!(role, None);
    assert_eq!(content, "partial");

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_error_payload_fails_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[
            r##"{"choices":[{"delta":{"content":"par"}}]}"##,
            r##"{"error":{"message":"overloaded","type":"server_error"}}"##,
        ],
    )])
    .await;

    let client = client_for(&server);
    let error = collect_content(&client)
        .await
        .expect_err("stream should fail");

    assert!(matches!(
        error,
        OpenAiApiError::StreamFailed { ref message, .. } if message == "overloaded"
    ));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_status_error_is_not_retried() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(
            401,
            r##"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"##,
        ),
        response_sse(200, &["[DONE]"]),
    ])
    .await;

    let client = client_for(&server);
    let error = collect_content(&client)
        .await
        .expect_err("stream should fail");

    match error {
        OpenAiApiError::Status(status, message) => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "Incorrect API key provided (invalid_api_key)");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn complete_integration_returns_first_choice() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there"},"finish_reason":"stop"}]}"##,
    )])
    .await;

    let client = client_for(&server);
    let response = client
        .complete(&hello_request().streaming(true))
        .await
        .expect("completion should succeed");

    assert_eq!(
        response.first_message(),
        Some(&ChatMessage::new("assistant", "Hi there"))
    );
    assert_eq!(server.bodies()[0]["stream"], Value::Bool(false));

    server.shutdown();
}

#[tokio::test]
async fn complete_integration_rejects_empty_choices() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(200, r##"{"choices":[]}"##)]).await;

    let client = client_for(&server);
    let error = client
        .complete(&hello_request())
        .await
        .expect_err("empty choices should fail");

    assert!(matches!(error, OpenAiApiError::EmptyResponse));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_connection_reset_surfaces_request_error() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Reset]).await;

    let client = client_for(&server);
    let error = timeout(Duration::from_secs(5), collect_content(&client))
        .await
        .expect("request should resolve")
        .expect_err("connection reset should surface as failure");

    assert!(matches!(error, OpenAiApiError::Request(_)));
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
) {
    let Ok(body) = read_request(&mut socket).await else {
        return;
    };
    if let Ok(value) = serde_json::from_slice::<Value>(&body) {
        bodies.lock().expect("bodies lock").push(value);
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"error":{"message":"unexpected request"}}"##));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond {
            status,
            content_type,
            chunks,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }

            for chunk in chunks {
                if chunk.delay_ms > 0 {
                    sleep(Duration::from_millis(chunk.delay_ms)).await;
                }
                let prefix = format!("{:X}\r\n", chunk.bytes.len());
                if socket.write_all(prefix.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&chunk.bytes).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
            }

            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

/// Reads the request head, then `Content-Length` bytes of body.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    let head_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(index) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break index + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < head_end + content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
    }

    Ok(request[head_end..].to_vec())
}
