//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_gateway::config::{GatewayConfig, RouteConfig};
use edge_gateway::http::build_router;
use edge_gateway::lifecycle::startup::build_listener;
use edge_gateway::net::{GatewayListener, ListenerError, TlsPolicy};
use edge_gateway::resilience::Timeouts;
use edge_gateway::RouteTable;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Request head as received by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub local: SocketAddr,
}

impl RecordedRequest {
    /// Request target from the request line.
    pub fn target(&self) -> &str {
        self.head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    /// `http://ip:port` of the backend that received the request.
    pub fn origin(&self) -> String {
        format!("http://{}", self.local)
    }
}

pub struct MockResponse {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
    /// Advertised `Content-Length` when it differs from the body.
    pub declared_len: Option<usize>,
}

impl MockResponse {
    pub fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status: "200 OK",
            content_type,
            body: body.into(),
            delay: Duration::ZERO,
            declared_len: None,
        }
    }

    /// Advertise more bytes than are sent, then close.
    pub fn truncated(mut self) -> Self {
        self.declared_len = Some(self.body.len() + 64);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A raw-TCP HTTP/1.1 backend that records every request head.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a mock backend on an ephemeral port.
pub async fn start_mock_backend<F>(respond: F) -> MockBackend
where
    F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let respond = respond.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, addr, respond.as_ref(), &recorded).await;
            });
        }
    });

    MockBackend { addr, requests }
}

async fn serve_one<F>(
    mut socket: TcpStream,
    local: SocketAddr,
    respond: &F,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()>
where
    F: Fn(&RecordedRequest) -> MockResponse,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request = RecordedRequest {
        head: String::from_utf8_lossy(&buf).into_owned(),
        local,
    };
    recorded.lock().unwrap().push(request.clone());

    let response = respond(&request);
    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let raw = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.content_type,
        response.declared_len.unwrap_or(response.body.len()),
        response.body
    );
    socket.write_all(raw.as_bytes()).await?;
    socket.shutdown().await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn route(path: &str, backend: &str, match_type: &str, strip_prefix: bool) -> RouteConfig {
    RouteConfig {
        host: None,
        path: path.to_string(),
        backend: backend.to_string(),
        strip_prefix,
        match_type: Some(match_type.to_string()),
    }
}

/// Plain-HTTP config on an ephemeral loopback port.
pub fn gateway_config(routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.address = "127.0.0.1:0".to_string();
    config.routes = routes;
    config
}

/// A started gateway.
pub struct Gateway {
    pub listener: Arc<GatewayListener>,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<(), ListenerError>>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    launch(build_listener(&config).unwrap()).await
}

/// Plain-HTTP gateway with non-default timeouts.
pub async fn start_gateway_with_timeouts(config: GatewayConfig, timeouts: Timeouts) -> Gateway {
    let table = RouteTable::from_config(&config.routes).unwrap();
    let app = build_router(table, timeouts, "http");
    let listener = GatewayListener::new(&config.server.address, TlsPolicy::Disabled, app).with_timeouts(timeouts);
    launch(listener).await
}

async fn launch(listener: GatewayListener) -> Gateway {
    let listener = Arc::new(listener);
    let task = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.start().await })
    };
    let addr = listener.local_addr().await.expect("gateway failed to bind");
    Gateway { listener, addr, task }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap()
}

/// Send raw bytes and return the full response text.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}
