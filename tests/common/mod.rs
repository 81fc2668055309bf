//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use multireq::buffer::BufferPool;
use multireq::config::ProxyConfig;
use multireq::http::HttpServer;
use multireq::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One piece of a scripted response body.
#[derive(Clone, Debug)]
pub enum Step {
    Write(Vec<u8>),
    Sleep(Duration),
}

/// A scripted backend response.
#[derive(Clone, Debug)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    delay: Duration,
    steps: Vec<Step>,
    /// Body delimited by connection close instead of Content-Length.
    close_delimited: bool,
    /// Never answer; wait for the proxy to hang up.
    hang: bool,
}

impl MockResponse {
    /// Fixed status and body, sent with a Content-Length.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            delay: Duration::ZERO,
            steps: vec![Step::Write(body.into())],
            close_delimited: false,
            hang: false,
        }
    }

    /// Body written step by step, ended by closing the connection.
    pub fn streamed(status: u16, steps: Vec<Step>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            delay: Duration::ZERO,
            steps,
            close_delimited: true,
            hang: false,
        }
    }

    /// Read the request and then never respond.
    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::new(200, "")
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn body_len(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s {
                Step::Write(bytes) => bytes.len(),
                Step::Sleep(_) => 0,
            })
            .sum()
    }

    fn head(&self) -> String {
        let reason = axum::http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        let mut head = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", self.status, reason);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if !self.close_delimited {
            head.push_str(&format!("Content-Length: {}\r\n", self.body_len()));
        }
        head.push_str("\r\n");
        head
    }
}

/// A request as seen by a mock backend.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// Request line and headers, without the final blank line.
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

/// Handle on a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicU32>,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Set once a hanging connection saw the proxy hang up.
    pub hung_up: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a backend answering every connection with `response`.
pub async fn start_backend(response: MockResponse) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicU32::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
        hung_up: Arc::new(AtomicBool::new(false)),
    };

    let handle = backend.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let response = response.clone();
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        serve_one(socket, response, handle).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    backend
}

async fn serve_one(mut socket: TcpStream, response: MockResponse, backend: MockBackend) {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    backend.requests.lock().unwrap().push(request);

    if response.hang {
        let mut scratch = [0u8; 64];
        while let Ok(n) = socket.read(&mut scratch).await {
            if n == 0 {
                break;
            }
        }
        backend.hung_up.store(true, Ordering::SeqCst);
        return;
    }

    tokio::time::sleep(response.delay).await;
    if socket.write_all(response.head().as_bytes()).await.is_err() {
        return;
    }
    for step in &response.steps {
        match step {
            Step::Write(bytes) => {
                if socket.write_all(bytes).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            Step::Sleep(d) => tokio::time::sleep(*d).await,
        }
    }
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut body = buf[head_end + 4..].to_vec();
    let mut request = RecordedRequest {
        head,
        body: Vec::new(),
    };

    let content_length = request
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    request.body = body;
    Some(request)
}

/// An address nothing is listening on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running proxy under test.
pub struct Proxy {
    pub addr: SocketAddr,
    pub pool: BufferPool,
    shutdown: Shutdown,
}

impl Proxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until every read-ahead buffer is back in the pool.
    pub async fn wait_for_buffers(&self) -> bool {
        for _ in 0..100 {
            if self.pool.stats().outstanding == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy racing `target_a` against `target_b`.
pub async fn start_proxy(target_a: &str, target_b: &str, buffer_size: usize) -> Proxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.targets.a = target_a.to_string();
    config.targets.b = target_b.to_string();
    config.buffers.size = buffer_size;
    config.buffers.max_idle = 4;
    config.observability.metrics_enabled = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let pool = server.pool().clone();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    Proxy {
        addr,
        pool,
        shutdown,
    }
}

/// Write `request` to `addr` verbatim and read the response until close.
///
/// For request targets an URL-based client would normalise.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    socket.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).to_string()
}

/// Client that never reuses connections and ignores proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
