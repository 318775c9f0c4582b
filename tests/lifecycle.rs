//! Listener start/stop semantics, TLS termination and the HTTPS redirect.

use std::fs;
use std::time::Duration;

use edge_gateway::lifecycle::ListenerState;
use edge_gateway::net::ListenerError;

mod common;

use common::{
    client, gateway_config, route, start_gateway, start_gateway_with_timeouts, start_mock_backend, MockResponse,
};
use edge_gateway::resilience::Timeouts;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn stop_drains_in_flight_request() {
    let backend = start_mock_backend(|_| MockResponse::ok("text/plain", "slow").delayed(Duration::from_millis(500))).await;
    let gateway = start_gateway(gateway_config(vec![route("/", &backend.url(), "prefix_match", false)])).await;
    assert_eq!(gateway.listener.state(), ListenerState::Running);

    let url = gateway.url("/work");
    let in_flight = tokio::spawn(async move { client().get(url).send().await.unwrap().text().await.unwrap() });
    tokio::time::sleep(Duration::from_millis(100)).await;

    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(gateway.listener.state(), ListenerState::Stopped);
    assert_eq!(in_flight.await.unwrap(), "slow");
    assert!(gateway.task.await.unwrap().is_ok());
}

#[tokio::test]
async fn stop_reports_expired_deadline() {
    let backend = start_mock_backend(|_| MockResponse::ok("text/plain", "late").delayed(Duration::from_secs(2))).await;
    let gateway = start_gateway(gateway_config(vec![route("/", &backend.url(), "prefix_match", false)])).await;

    let url = gateway.url("/work");
    let in_flight = tokio::spawn(async move { client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = gateway.listener.stop(Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, ListenerError::ShutdownTimeout(_)));
    assert_eq!(gateway.listener.state(), ListenerState::Stopped);
    assert!(matches!(
        gateway.listener.stop(Duration::from_secs(1)).await,
        Err(ListenerError::NotRunning)
    ));

    // Not forcibly closed: the request still completes.
    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.text().await.unwrap(), "late");
}

#[tokio::test]
async fn listener_is_single_use() {
    let gateway = start_gateway(gateway_config(Vec::new())).await;

    assert!(matches!(gateway.listener.start().await, Err(ListenerError::AlreadyStarted)));

    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
    assert!(matches!(
        gateway.listener.stop(Duration::from_secs(1)).await,
        Err(ListenerError::NotRunning)
    ));
    assert!(matches!(gateway.listener.start().await, Err(ListenerError::AlreadyStarted)));
}

#[tokio::test]
async fn stopped_listener_refuses_connections() {
    let gateway = start_gateway(gateway_config(Vec::new())).await;
    let addr = gateway.addr;

    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn idle_keep_alive_connection_is_closed() {
    let timeouts = Timeouts {
        idle: Duration::from_millis(300),
        ..Timeouts::default()
    };
    let gateway = start_gateway_with_timeouts(gateway_config(Vec::new()), timeouts).await;

    let mut stream = tokio::net::TcpStream::connect(gateway.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: gateway.test\r\n\r\n")
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut chunk = [0u8; 1024];
    while !String::from_utf8_lossy(&seen).contains("</html>") {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the response");
        seen.extend_from_slice(&chunk[..n]);
    }

    // Kept alive after the response, then closed once idle.
    let closed = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut chunk))
        .await
        .expect("idle connection stayed open");
    assert!(matches!(closed, Ok(0) | Err(_)));
}

struct Certs {
    _dir: tempfile::TempDir,
    cert: String,
    key: String,
    /// Certificate and key in one PEM, for use as a client identity.
    identity: Vec<u8>,
}

fn certs() -> Certs {
    let dir = tempfile::tempdir().unwrap();
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = certified.cert.pem();
    let key_pem = certified.key_pair.serialize_pem();
    let cert = dir.path().join("cert.pem");
    let key = dir.path().join("key.pem");
    fs::write(&cert, &cert_pem).unwrap();
    fs::write(&key, &key_pem).unwrap();

    Certs {
        cert: cert.to_string_lossy().into_owned(),
        key: key.to_string_lossy().into_owned(),
        identity: format!("{cert_pem}{key_pem}").into_bytes(),
        _dir: dir,
    }
}

fn mtls_config(server: &Certs, client_auth: &str) -> edge_gateway::GatewayConfig {
    let mut config = gateway_config(Vec::new());
    config.server.use_tls = true;
    config.server.tls_mode = "mtls".into();
    config.server.cert_file = server.cert.clone();
    config.server.key_file = server.key.clone();
    config.server.mtls.ca_cert_file = server.cert.clone();
    config.server.mtls.client_auth_type = client_auth.into();
    config
}

fn https_client(identity: Option<&[u8]>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .no_proxy()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true);
    if let Some(pem) = identity {
        builder = builder.identity(reqwest::Identity::from_pem(pem).unwrap());
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn manual_tls_terminates_https() {
    let certs = certs();
    let mut config = gateway_config(Vec::new());
    config.server.use_tls = true;
    config.server.tls_mode = "manual".into();
    config.server.cert_file = certs.cert.clone();
    config.server.key_file = certs.key.clone();

    let gateway = start_gateway(config).await;

    let res = https_client(None)
        .get(format!("https://{}/", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("Hello, world!"));

    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn missing_certificate_fails_before_binding() {
    let mut config = gateway_config(Vec::new());
    config.server.use_tls = true;
    config.server.cert_file = "/nonexistent/cert.pem".into();
    config.server.key_file = "/nonexistent/key.pem".into();

    let listener = edge_gateway::lifecycle::startup::build_listener(&config).unwrap();
    assert!(matches!(listener.start().await, Err(ListenerError::Tls(_))));
    assert!(listener.local_addr().await.is_none());
}

#[tokio::test]
async fn mtls_require_and_verify_rejects_anonymous_clients() {
    let certs = certs();
    let gateway = start_gateway(mtls_config(&certs, "")).await;

    let result = https_client(None).get(format!("https://{}/", gateway.addr)).send().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn mtls_optional_accepts_anonymous_clients() {
    let certs = certs();
    let gateway = start_gateway(mtls_config(&certs, "optional")).await;

    let res = https_client(None)
        .get(format!("https://{}/", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn mtls_require_accepts_certificate_outside_the_ca() {
    let server = certs();
    let stranger = certs();
    let gateway = start_gateway(mtls_config(&server, "require")).await;

    let res = https_client(Some(&stranger.identity))
        .get(format!("https://{}/", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let anonymous = https_client(None).get(format!("https://{}/", gateway.addr)).send().await;
    assert!(anonymous.is_err());
    gateway.listener.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn redirect_listener_points_at_https() {
    let certs = certs();
    let redirect_port = common::unused_addr().await.port();
    let tls_addr = common::unused_addr().await;

    let mut config = gateway_config(Vec::new());
    config.server.address = tls_addr.to_string();
    config.server.use_tls = true;
    config.server.cert_file = certs.cert.clone();
    config.server.key_file = certs.key.clone();
    config.server.redirect_http = true;
    config.server.http_redirect_port = format!("127.0.0.1:{redirect_port}");

    let listener = std::sync::Arc::new(edge_gateway::lifecycle::startup::build_listener(&config).unwrap());
    let task = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.start().await })
    };
    assert!(listener.local_addr().await.is_some());

    let no_redirects = reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let mut location = None;
    for _ in 0..50 {
        if let Ok(res) = no_redirects
            .get(format!("http://127.0.0.1:{redirect_port}/login?next=1"))
            .header("host", "example.test")
            .send()
            .await
        {
            assert_eq!(res.status(), 301);
            location = res.headers().get("location").map(|v| v.to_str().unwrap().to_string());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(location.as_deref(), Some(format!("https://example.test:{}/login?next=1", tls_addr.port()).as_str()));

    listener.stop(Duration::from_secs(5)).await.unwrap();
    assert!(task.await.unwrap().is_ok());
}
