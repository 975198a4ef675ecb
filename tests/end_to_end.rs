//! End-to-end tests over real TCP connections.

use std::time::Duration;

use axum::http::StatusCode;
use switchyard::config::ListenerConfig;
use switchyard::demo::demo_router;
use switchyard::{Outcome, Request, Response, Router};

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo() {
    let server = common::spawn_server(demo_router(None), ListenerConfig::default()).await;

    let res = client().get(server.url("/echo/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[reqwest::header::CONTENT_TYPE],
        "text/plain"
    );
    assert_eq!(res.text().await.unwrap(), "Echoed word: hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_path_is_404() {
    let server = common::spawn_server(demo_router(None), ListenerConfig::default()).await;

    let res = client().get(server.url("/unknown/path")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Resource not found.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gated_subrouter() {
    let server = common::spawn_server(
        demo_router(Some("1234".to_string())),
        ListenerConfig::default(),
    )
    .await;

    let res = client().get(server.url("/date/today")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.text().await.unwrap(), "API key missing.");

    let res = client()
        .get(server.url("/date/today"))
        .header("API-Key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.text().await.unwrap(), "Unauthorized API key.");

    let res = client()
        .get(server.url("/date/today"))
        .header("API-Key", "1234")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().starts_with("Today's date is "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_merged_into_parameters() {
    let server = common::spawn_server(demo_router(None), ListenerConfig::default()).await;

    let res = client()
        .get(server.url("/parameters/foo?arg1=banana"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[reqwest::header::CONTENT_TYPE], "application/json");

    let body: serde_json::Value = serde_json::from_str(&res.text().await.unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({"arg0": "foo", "arg1": "banana"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_body_is_assembled() {
    let mut router = Router::new();
    router.post("/upload", |req: Request, res: Response| async move {
        res.send_text(format!("{} bytes: {}", req.body().len(), req.body_text().unwrap_or(""))).await;
        Outcome::Handled
    });
    let server = common::spawn_server(router, ListenerConfig::default()).await;

    let res = client()
        .post(server.url("/upload"))
        .body("alpha-beta-gamma")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "16 bytes: alpha-beta-gamma");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_body_is_rejected() {
    let mut router = Router::new();
    router.post("/upload", |_req: Request, res: Response| async move {
        res.send_text("accepted").await;
        Outcome::Handled
    });
    let config = ListenerConfig {
        max_body_bytes: 8,
        ..ListenerConfig::default()
    };
    let server = common::spawn_server(router, config).await;

    let res = client()
        .post(server.url("/upload"))
        .body("far more than eight bytes")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.text().await.unwrap(), "Payload too large.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connection_closes_after_response() {
    let server = common::spawn_server(demo_router(None), ListenerConfig::default()).await;

    // read_to_end only returns once the server closes the socket
    let raw = common::raw_exchange(
        server.addr,
        "GET /helloworld HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert!(raw.starts_with("HTTP/1.1 200 OK"));
    assert!(raw.to_ascii_lowercase().contains("content-length: 15"));
    assert!(raw.ends_with("This is a test."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keep_alive_serves_sequential_requests() {
    let config = ListenerConfig {
        keep_alive: true,
        ..ListenerConfig::default()
    };
    let server = common::spawn_server(demo_router(None), config).await;

    // the second request asks the server to close so the read terminates
    let raw = common::raw_exchange(
        server.addr,
        "GET /echo/one HTTP/1.1\r\nHost: localhost\r\n\r\n\
         GET /echo/two HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let first = raw.find("Echoed word: one").unwrap();
    let second = raw.find("Echoed word: two").unwrap();
    assert!(first < second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_traversal_above_root_is_400() {
    let server = common::spawn_server(demo_router(None), ListenerConfig::default()).await;

    let raw = common::raw_exchange(
        server.addr,
        "GET /../etc/passwd HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert!(raw.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(raw.ends_with("Bad request."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_handler_does_not_wedge_keep_alive_connection() {
    let mut router = Router::new();
    router
        .get("/boom", |req: Request, _res: Response| async move {
            if req.param("never").is_none() {
                panic!("handler failed");
            }
            Outcome::Handled
        })
        .get("/ok", |_req: Request, res: Response| async move {
            res.send_text("fine").await;
            Outcome::Handled
        });
    let config = ListenerConfig {
        keep_alive: true,
        ..ListenerConfig::default()
    };
    let server = common::spawn_server(router, config).await;

    let raw = common::raw_exchange(
        server.addr,
        "GET /boom HTTP/1.1\r\nHost: localhost\r\n\r\n\
         GET /ok HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let failed = raw.find("HTTP/1.1 500 Internal Server Error").unwrap();
    let recovered = raw.rfind("HTTP/1.1 200 OK").unwrap();
    assert!(failed < recovered, "{}", raw);
    assert!(raw.ends_with("fine"), "{}", raw);
}
