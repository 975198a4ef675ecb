//! Demo application served by the `switchyard` binary.
//!
//! ```text
//! GET /helloworld          → "This is a test."
//! GET /echo/:word          → "Echoed word: <word>"
//! GET /parameters/:arg0    → JSON object of every binding (path + query)
//! GET /date/today          → "Today's date is <YYYY-MM-DD>" (API key gated when configured)
//! ```

use std::sync::Arc;

use crate::http::json::JsonValue;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::{Outcome, Router};

/// Build the demo route table. With `api_key`, `/date` requires it.
pub fn demo_router(api_key: Option<String>) -> Router {
    let mut router = Router::new();

    router
        .get("/helloworld", |_req: Request, res: Response| async move {
            res.send_text("This is a test.").await;
            Outcome::Handled
        })
        .get("/echo/:word", |req: Request, res: Response| async move {
            res.send_text(format!("Echoed word: {}", req.parameter("word"))).await;
            Outcome::Handled
        })
        .get("/parameters/:arg0", |req: Request, res: Response| async move {
            res.send_json(&parameters_document(&req)).await;
            Outcome::Handled
        });

    router.install_subrouter(Arc::new(date_router(api_key)), "/date");
    router
}

fn date_router(api_key: Option<String>) -> Router {
    let mut router = Router::new();
    if let Some(expected) = api_key {
        router.require_api_key(move |key| key == expected);
    }
    router.get("/today", |_req: Request, res: Response| async move {
        let today = chrono::Local::now().format("%Y-%m-%d");
        res.send_text(format!("Today's date is {}", today)).await;
        Outcome::Handled
    });
    router
}

fn parameters_document(request: &Request) -> JsonValue {
    let mut document = JsonValue::default();
    for (name, value) in request.parameters() {
        document.set(name.as_str(), value.as_str());
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::channel::MemoryChannel;
    use crate::http::request::RequestHead;
    use axum::http::{Method, StatusCode};

    async fn get(router: &Router, head: RequestHead) -> MemoryChannel {
        let channel = MemoryChannel::new();
        let response = Response::new(Arc::new(channel.clone()));
        router.route_request(Request::new(head, ""), response).await;
        channel
    }

    #[tokio::test]
    async fn test_hello_world() {
        let router = demo_router(None);
        let channel = get(&router, RequestHead::new(Method::GET, "/helloworld")).await;
        assert_eq!(channel.body_text(), "This is a test.");
    }

    #[tokio::test]
    async fn test_parameters_document() {
        let router = demo_router(None);
        let channel = get(&router, RequestHead::new(Method::GET, "/parameters/foo?arg1=banana")).await;
        let document: JsonValue = serde_json::from_slice(&channel.body()).unwrap();
        assert_eq!(document.string("arg0"), Some("foo"));
        assert_eq!(document.string("arg1"), Some("banana"));
    }

    #[tokio::test]
    async fn test_date_gate_follows_config() {
        let open = demo_router(None);
        let channel = get(&open, RequestHead::new(Method::GET, "/date/today")).await;
        assert!(channel.body_text().starts_with("Today's date is "));

        let gated = demo_router(Some("1234".to_string()));
        let channel = get(&gated, RequestHead::new(Method::GET, "/date/today")).await;
        assert_eq!(channel.status(), Some(StatusCode::UNAUTHORIZED));

        // gate belongs to the sub-router only
        let channel = get(&gated, RequestHead::new(Method::GET, "/helloworld")).await;
        assert_eq!(channel.status(), Some(StatusCode::OK));
    }
}
