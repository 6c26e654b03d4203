use podproxy::config::{PollingConfig, ProxyConfig};
use podproxy::k8s::{MemoryBackend, Startup};
use podproxy::lifecycle::PodManager;
use podproxy::metrics::ProxyMetrics;
use podproxy::pod::PodSpecBuilder;
use podproxy::server::ProxyServer;
use podproxy_cli::ProxyClient;
use podproxy_common::{ErrorKind, LaunchRequest, PodType, ProxyCommand, ProxyResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const READINESS_THRESHOLD: Duration = Duration::from_millis(1500);

struct Harness {
    addr: SocketAddr,
    backend: MemoryBackend,
    metrics: ProxyMetrics,
}

async fn start(backend: MemoryBackend) -> Harness {
    let config = ProxyConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        polling: PollingConfig {
            existence_retries: 2,
            existence_interval_ms: 50,
            readiness_interval_ms: 50,
            readiness_threshold_ms: READINESS_THRESHOLD.as_millis() as u64,
        },
        ..Default::default()
    };

    let metrics = ProxyMetrics::new().unwrap();
    let manager = Arc::new(PodManager::new(
        Arc::new(backend.clone()),
        PodSpecBuilder::new(config.namespace.clone(), config.pod.clone()),
        &config.polling,
        metrics.clone(),
    ));

    let server = ProxyServer::bind(
        config.listen,
        manager,
        metrics.clone(),
        config.max_frame_length,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    Harness {
        addr,
        backend,
        metrics,
    }
}

fn worker(name: &str) -> LaunchRequest {
    LaunchRequest::new(
        name,
        vec!["default_worker.py".to_string()],
        Default::default(),
        PodType::Worker,
    )
    .unwrap()
}

#[tokio::test]
async fn test_duplicate_create_is_a_noop() {
    let harness = start(MemoryBackend::default()).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();

    assert_eq!(
        client.create(worker("w1")).await.unwrap(),
        ProxyResponse::success()
    );
    let second = client.create(worker("w1")).await.unwrap();
    assert!(matches!(second, ProxyResponse::Success { detail: Some(_) }));

    assert_eq!(harness.backend.pod_names("default"), vec!["w1".to_string()]);
    assert_eq!(harness.backend.create_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_connections_create_different_pods() {
    let harness = start(MemoryBackend::default()).await;
    let addr = harness.addr;

    let create = |name: &'static str| async move {
        let mut client = ProxyClient::connect(addr).await.unwrap();
        client.create(worker(name)).await.unwrap()
    };

    let (a, b) = tokio::join!(create("w-a"), create("w-b"));
    assert_eq!(a, ProxyResponse::success());
    assert_eq!(b, ProxyResponse::success());

    let mut names = harness.backend.pod_names("default");
    names.sort();
    assert_eq!(names, vec!["w-a".to_string(), "w-b".to_string()]);
}

#[tokio::test]
async fn test_slow_poll_does_not_block_other_connections() {
    let harness = start(MemoryBackend::new(Startup::Never)).await;

    let mut client_a = ProxyClient::connect(harness.addr).await.unwrap();
    client_a.create(worker("stuck")).await.unwrap();

    let started = Instant::now();
    let waiting = tokio::spawn(async move {
        let response = client_a.resolve_container_id("stuck").await.unwrap();
        (response, started.elapsed())
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut client_b = ProxyClient::connect(harness.addr).await.unwrap();
    let response = client_b.create(worker("other")).await.unwrap();
    assert_eq!(response, ProxyResponse::success());
    assert!(started.elapsed() < READINESS_THRESHOLD);
    assert!(!waiting.is_finished());

    let (response, elapsed) = waiting.await.unwrap();
    assert!(matches!(
        response,
        ProxyResponse::Error {
            kind: ErrorKind::Timeout,
            ..
        }
    ));
    assert!(elapsed >= READINESS_THRESHOLD);
    assert!(elapsed < READINESS_THRESHOLD + Duration::from_secs(1));
}

#[tokio::test]
async fn test_responses_follow_request_order() {
    let harness = start(MemoryBackend::new(Startup::AfterReads(2))).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();
    client.create(worker("w1")).await.unwrap();

    // Second request is on the wire while the first one is still polling.
    client
        .send(&ProxyCommand::ResolveContainerId("w1".to_string()))
        .await
        .unwrap();
    client
        .send(&ProxyCommand::Delete("ghost".to_string()))
        .await
        .unwrap();

    let first = client.receive().await.unwrap();
    let second = client.receive().await.unwrap();

    assert!(matches!(first, ProxyResponse::Value { .. }), "{first:?}");
    assert!(matches!(second, ProxyResponse::Success { detail: Some(_) }), "{second:?}");
}

#[tokio::test]
async fn test_malformed_message_closes_connection() {
    let harness = start(MemoryBackend::default()).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();

    client.send_raw(&b"{not json"[..]).await.unwrap();
    let response = client.receive().await.unwrap();
    assert!(matches!(
        response,
        ProxyResponse::Error {
            kind: ErrorKind::Protocol,
            ..
        }
    ));

    assert!(client.receive().await.is_err());
    assert_eq!(harness.metrics.command_count("unknown", "protocol"), 1);
}

#[tokio::test]
async fn test_legacy_kill_message() {
    let harness = start(MemoryBackend::default()).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();
    client.create(worker("worker-12")).await.unwrap();

    let payload = serde_json::json!({"command": "kill", "type": "worker_12", "params": {}});
    client
        .send_raw(serde_json::to_vec(&payload).unwrap())
        .await
        .unwrap();

    assert_eq!(client.receive().await.unwrap(), ProxyResponse::success());
    assert!(harness.backend.pod_names("default").is_empty());
}

#[tokio::test]
async fn test_delete_paths_never_error() {
    let harness = start(MemoryBackend::default()).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();

    assert!(!client.delete("ghost").await.unwrap().is_error());
    assert!(!client.delete_all().await.unwrap().is_error());

    client.create(worker("w1")).await.unwrap();
    client.create(worker("w2")).await.unwrap();
    assert!(!client.delete_all().await.unwrap().is_error());
    assert!(harness.backend.pod_names("default").is_empty());
}

#[tokio::test]
async fn test_closing_connection_abandons_poll() {
    let harness = start(MemoryBackend::new(Startup::Never)).await;

    let mut client = ProxyClient::connect(harness.addr).await.unwrap();
    client.create(worker("stuck")).await.unwrap();
    client
        .send(&ProxyCommand::ResolveContainerId("stuck".to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(client);

    let deadline = Instant::now() + READINESS_THRESHOLD / 2;
    while harness.metrics.command_count("get_mainid", "cancelled") == 0 {
        assert!(Instant::now() < deadline, "poll was not abandoned");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.metrics.command_count("get_mainid", "timeout"), 0);
}

#[tokio::test]
async fn test_create_failure_reaches_caller() {
    let backend = MemoryBackend::default();
    backend.fail_creates("connection refused");
    let harness = start(backend).await;
    let mut client = ProxyClient::connect(harness.addr).await.unwrap();

    let response = client.create(worker("w1")).await.unwrap();
    let ProxyResponse::Error { kind, message } = response else {
        panic!("expected error");
    };
    assert_eq!(kind, ErrorKind::Backend);
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn test_closing_connection_with_queued_command_abandons_poll() {
    let harness = start(MemoryBackend::new(Startup::Never)).await;

    let mut client = ProxyClient::connect(harness.addr).await.unwrap();
    client.create(worker("stuck")).await.unwrap();
    client.create(worker("w2")).await.unwrap();

    // The kill is read ahead and queued while the lookup polls.
    client
        .send(&ProxyCommand::ResolveContainerId("stuck".to_string()))
        .await
        .unwrap();
    client
        .send(&ProxyCommand::Delete("w2".to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(client);

    let deadline = Instant::now() + READINESS_THRESHOLD / 2;
    while harness.metrics.command_count("get_mainid", "cancelled") == 0 {
        assert!(Instant::now() < deadline, "poll was not abandoned");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.metrics.command_count("get_mainid", "timeout"), 0);

    // The queued kill still runs for the caller that hung up.
    while harness.backend.contains("default", "w2") {
        assert!(Instant::now() < deadline, "queued kill was dropped");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.backend.pod_names("default"), vec!["stuck".to_string()]);
}
