use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dirscour::model::ScanRequest;
use dirscour::session::Session;
use dirscour::testutil::{MockResponse, MockServer};

fn base_request(base_url: String, wordlist: Vec<&str>) -> ScanRequest {
    ScanRequest {
        base_url,
        wordlist: wordlist.into_iter().map(str::to_string).collect(),
        thread_count: 4,
        timeout: Duration::from_secs(5),
        detect_wildcards: false,
        ..ScanRequest::default()
    }
}

#[tokio::test]
async fn s1_basic_scan_finds_admin_and_api_only() {
    let server = MockServer::start().await;
    server.route("/admin", MockResponse::text(200, "x".repeat(1234))).await;
    server.route("/api", MockResponse::text(200, "{\"ok\":1}")).await;

    let req = base_request(server.base_url.clone(), vec!["admin", "api", "missing"]);
    let session = Session::new(req).unwrap();
    let response = session.execute().await.unwrap();

    assert_eq!(response.findings.len(), 2);
    assert_eq!(response.statistics.total_requests, 3);
    assert_eq!(response.statistics.found_paths, 2);
    assert_eq!(response.statistics.errors, 0);

    let paths: HashSet<&str> = response.findings.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains("admin"));
    assert!(paths.contains("api"));

    server.shutdown();
}

#[tokio::test]
async fn s2_wildcard_trap_suppresses_every_finding() {
    let server = MockServer::start().await;
    server.set_default(MockResponse::text(200, "NOT FOUND")).await;

    let mut req = base_request(server.base_url.clone(), vec!["a", "b", "c"]);
    req.detect_wildcards = true;
    let session = Session::new(req).unwrap();
    let response = session.execute().await.unwrap();

    assert_eq!(response.findings.len(), 0);
    assert!(response.statistics.total_requests >= 6);

    server.shutdown();
}

#[tokio::test]
async fn s3_recursion_follows_a_directory_redirect() {
    let server = MockServer::start().await;
    server.route("/docs", MockResponse::redirect(301, "/docs/")).await;
    server.route("/docs/", MockResponse::html(200, "<html></html>")).await;
    server.route("/docs/secret", MockResponse::text(200, "classified")).await;

    let mut req = base_request(server.base_url.clone(), vec!["docs", "secret"]);
    req.recursive = true;
    req.recursion_depth = 2;
    let session = Session::new(req).unwrap();
    let response = session.execute().await.unwrap();

    let docs = response
        .findings
        .iter()
        .find(|f| f.path == "docs")
        .expect("docs should be found");
    assert_eq!(docs.status, 301);
    assert!(docs.is_directory);

    let secret = response
        .findings
        .iter()
        .find(|f| f.path == "secret" && f.depth == 1)
        .expect("docs/secret should be found at depth 1");
    assert_eq!(secret.status, 200);

    server.shutdown();
}

#[tokio::test]
async fn s4_extensions_are_appended_to_extensionless_words() {
    let server = MockServer::start().await;
    server.route("/config.php", MockResponse::text(200, "<?php")).await;
    server.route("/config.bak", MockResponse::text(200, "old config")).await;

    let mut req = base_request(server.base_url.clone(), vec!["config"]);
    req.extensions = vec!["php".to_string(), "bak".to_string()];
    req.force_extensions = false;
    let session = Session::new(req).unwrap();
    let response = session.execute().await.unwrap();

    assert_eq!(response.findings.len(), 2);
    assert_eq!(response.statistics.total_requests, 3);

    server.shutdown();
}

#[tokio::test]
async fn s5_cancellation_stops_promptly_and_caps_requests() {
    let server = MockServer::start().await;
    server.set_default(MockResponse::text(404, "nope")).await;

    let wordlist: Vec<String> = (0..10_000).map(|i| format!("word{i}")).collect();
    let req = ScanRequest {
        base_url: server.base_url.clone(),
        wordlist,
        thread_count: 20,
        delay: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
        detect_wildcards: false,
        ..ScanRequest::default()
    };
    let mut session = Session::new(req).unwrap();

    let result_count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&result_count);
    session.set_result_callback(Arc::new(move |_finding| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));

    let session = Arc::new(session);
    let stopper = Arc::clone(&session);
    let stop_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stopper.stop();
    });

    let started = std::time::Instant::now();
    let response = session.execute().await.unwrap();
    let elapsed = started.elapsed();
    stop_handle.await.unwrap();

    assert!(elapsed <= Duration::from_secs(2), "execute took {elapsed:?} after stop()");
    assert!(response.statistics.total_requests < 10_000);
    assert_eq!(result_count.load(Ordering::Relaxed) as usize, response.findings.len());

    server.shutdown();
}

#[tokio::test]
async fn s6_retry_recovers_after_two_server_errors() {
    let server = MockServer::start().await;
    server
        .route_flaky(
            "/flaky",
            MockResponse { status: 502, headers: vec![], body: vec![], drop_connection: false },
            2,
            MockResponse::text(200, "recovered"),
        )
        .await;

    let mut req = base_request(server.base_url.clone(), vec!["flaky"]);
    req.max_retries = 3;
    let session = Session::new(req).unwrap();
    let response = session.execute().await.unwrap();

    assert_eq!(response.findings.len(), 1);
    assert_eq!(response.findings[0].status, 200);
    assert_eq!(server.hit_count("/flaky").await, 3);

    server.shutdown();
}
