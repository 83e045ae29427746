mod common;

use actix_web::{http::StatusCode, test};
use serde_json::json;

use common::TestContext;

fn register_body(email: &str) -> serde_json::Value {
    json!({
        "fullname": "Jane Doe",
        "email": email,
        "password": "s3cret-pass"
    })
}

#[actix_web::test]
async fn test_register_creates_user_and_queues_email() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .set_json(register_body("Jane@Example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], "jane@example.com");
    assert_eq!(body["notification_queued"], true);
    assert!(body["user_id"].is_string());

    let user = ctx.users.get("jane@example.com").await.expect("user stored");
    assert!(!user.is_verified);
    assert_ne!(user.password_hash, "s3cret-pass");

    let events = ctx.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].email, "jane@example.com");
    assert_eq!(events[0].code.len(), 6);
    assert!(events[0]
        .verification_url
        .ends_with(&format!("otp_code={}", events[0].code)));
    assert_eq!(ctx.cache.len().await, 1);
}

#[actix_web::test]
async fn test_register_duplicate_email_conflicts() {
    let ctx = TestContext::new().await;
    ctx.seed_user("jane@example.com", false).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .set_json(register_body("jane@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "email_already_registered");
    assert!(ctx.published().is_empty());
    assert_eq!(ctx.users.count().await, 1);
}

#[actix_web::test]
async fn test_register_rejects_invalid_fields() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .set_json(json!({
            "fullname": "",
            "email": "not-an-email",
            "password": "short"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
    let details = body["details"].as_object().expect("details present");
    assert!(details.contains_key("fullname"));
    assert!(details.contains_key("email"));
    assert!(details.contains_key("password"));
    assert_eq!(ctx.users.count().await, 0);
}

#[actix_web::test]
async fn test_register_rejects_malformed_json() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"fullname\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
}

#[actix_web::test]
async fn test_register_succeeds_when_queue_is_down() {
    let ctx = TestContext::new().await;
    ctx.break_queue();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .set_json(register_body("jane@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["notification_queued"], false);
    assert!(ctx.users.get("jane@example.com").await.is_some());
}
