//! Tests against a real socket: connect info, reload and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use dev_gathering::lifecycle::Shutdown;
use dev_gathering::store::MemoryRepository;
use dev_gathering::{GatheringConfig, HttpServer};

mod common;
use common::{test_config, RecordingMailer, PASSWORD, SESSION_KEY};

struct LiveServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    updates: mpsc::UnboundedSender<GatheringConfig>,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

async fn start(config: GatheringConfig) -> LiveServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::with_components(
        config,
        Arc::new(MemoryRepository::new()),
        Arc::new(RecordingMailer::default()),
    );
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    LiveServer {
        addr,
        shutdown,
        updates,
        handle,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_serves_and_shuts_down_gracefully() {
    let server = start(test_config(None)).await;

    let res = client()
        .get(format!("http://{}/api/health", server.addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().contains_key("x-request-id"));

    server.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_peer_address_is_rate_limited_without_forwarding() {
    let mut config = test_config(None);
    config.rate_limit.max_requests = 3;
    config.rate_limit.forwarded_for = dev_gathering::config::ForwardedForPolicy::Never;
    let server = start(config).await;
    let client = client();

    let mut statuses = Vec::new();
    for i in 0..4 {
        // A spoofed header must not buy a fresh budget.
        let res = client
            .get(format!("http://{}/api/health", server.addr))
            .header("x-forwarded-for", format!("10.0.0.{i}"))
            .send()
            .await
            .unwrap();
        statuses.push(res.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 200, 429]);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_reload_rotates_session_keys() {
    let config = test_config(None);
    let server = start(config.clone()).await;
    let client = client();
    let base = format!("http://{}", server.addr);

    let login = client
        .post(format!("{base}/api/admin/login"))
        .json(&json!({ "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let cookie = login.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let session_status = |cookie: String| {
        let client = client.clone();
        let url = format!("{base}/api/admin/session");
        async move {
            client
                .get(url)
                .header("cookie", cookie)
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }
    };
    assert_eq!(session_status(cookie.clone()).await, 200);

    // New key only: the old session no longer verifies.
    let mut rotated = config.clone();
    rotated.session.signing_keys = vec!["next-session-key".to_string()];
    server.updates.send(rotated.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session_status(cookie.clone()).await, 401);

    // Keeping the previous key accepts it again.
    rotated.session.signing_keys = vec!["next-session-key".to_string(), SESSION_KEY.to_string()];
    server.updates.send(rotated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session_status(cookie).await, 200);

    server.shutdown.trigger();
}
