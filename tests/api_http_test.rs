mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestHarness;
use serde_json::{json, Value};
use sourcing_api::auth::perm;
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body")
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

#[tokio::test]
async fn health_reports_database_status() {
    let h = TestHarness::new().await;
    let response = h
        .router()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .expect("health request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn buyer_routes_require_a_bearer_token() {
    let h = TestHarness::new().await;

    let response = h
        .router()
        .oneshot(request(Method::GET, "/api/v1/quotes", None, None))
        .await
        .expect("unauthenticated request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Token without the needed permission is authenticated but refused.
    let token = h.token(&[]);
    let response = h
        .router()
        .oneshot(request(Method::GET, "/api/v1/quotes", Some(&token), None))
        .await
        .expect("forbidden request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quote_lifecycle_over_http() {
    let h = TestHarness::new().await;
    let manage = h.token(&[perm::QUOTES_MANAGE]);
    let close = h.token(&[perm::QUOTES_MANAGE, perm::QUOTES_CLOSE]);

    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            "/api/v1/quotes",
            Some(&manage),
            Some(json!({ "title": "Injection molding run" })),
        ))
        .await
        .expect("create quote");
    assert_eq!(response.status(), StatusCode::CREATED);
    let quote = body_json(response).await;
    let quote_id = quote["id"].as_str().expect("quote id").to_string();

    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/quotes/{}/items", quote_id),
            Some(&manage),
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 5 })),
        ))
        .await
        .expect("add item");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/quotes/{}/open", quote_id),
            Some(&manage),
            None,
        ))
        .await
        .expect("open quote");
    assert_eq!(response.status(), StatusCode::OK);

    // Closing needs the dedicated permission.
    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/quotes/{}/close", quote_id),
            Some(&manage),
            None,
        ))
        .await
        .expect("close without permission");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/quotes/{}/close", quote_id),
            Some(&close),
            None,
        ))
        .await
        .expect("close quote");
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["quote"]["status"], "closed");
}

/// The portal authenticates by token alone; responses flow end to end
/// over HTTP and refusal reasons surface as stable codes.
#[tokio::test]
async fn portal_flow_over_http() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv = h.invite(quote.id, Uuid::new_v4()).await;

    let response = h
        .router()
        .oneshot(request(
            Method::GET,
            &format!("/portal/quotes/{}", inv.public_token),
            None,
            None,
        ))
        .await
        .expect("portal view");
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["writable"], true);
    assert_eq!(view["items"].as_array().map(|a| a.len()), Some(1));

    let response = h
        .router()
        .oneshot(request(
            Method::PUT,
            &format!("/portal/quotes/{}/items/{}", inv.public_token, items[0].id),
            None,
            Some(json!({ "price": "3.75" })),
        ))
        .await
        .expect("portal save");
    assert_eq!(response.status(), StatusCode::OK);
    let saved = body_json(response).await;
    assert_eq!(saved["price"], "3.75");

    let response = h
        .router()
        .oneshot(request(
            Method::POST,
            &format!("/portal/quotes/{}/submit", inv.public_token),
            None,
            None,
        ))
        .await
        .expect("portal submit");
    assert_eq!(response.status(), StatusCode::OK);

    // Post-submit writes surface the stable refusal code.
    let response = h
        .router()
        .oneshot(request(
            Method::PUT,
            &format!("/portal/quotes/{}/items/{}", inv.public_token, items[0].id),
            None,
            Some(json!({ "price": "3.00" })),
        ))
        .await
        .expect("post-submit save");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = body_json(response).await;
    assert_eq!(error["details"], "already_submitted");

    let response = h
        .router()
        .oneshot(request(
            Method::GET,
            "/portal/quotes/bogus-token",
            None,
            None,
        ))
        .await
        .expect("bad token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = body_json(response).await;
    assert_eq!(error["details"], "invalid_token");

    // Multi-byte characters around the logged prefix must not take the
    // handler down; the token is rejected like any other bad one.
    let response = h
        .router()
        .oneshot(request(
            Method::GET,
            "/portal/quotes/aaaaaaa%C3%A9",
            None,
            None,
        ))
        .await
        .expect("multibyte token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = body_json(response).await;
    assert_eq!(error["details"], "invalid_token");
}
