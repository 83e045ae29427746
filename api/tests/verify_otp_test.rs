mod common;

use std::time::Duration;

use actix_web::{http::StatusCode, test};
use serde_json::json;
use vouch_core::domain::entities::OtpRecord;
use vouch_core::services::{OtpGenerator, VerificationCacheTrait};

use common::TestContext;

#[actix_web::test]
async fn test_register_then_verify_marks_user_verified() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/register")
        .set_json(json!({
            "fullname": "Jane Doe",
            "email": "jane@example.com",
            "password": "s3cret-pass"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let code = ctx.published()[0].code.clone();
    let req = test::TestRequest::get()
        .uri(&format!("/api/user-service/verify-otp?otp_code={}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], "jane@example.com");
    assert_eq!(body["verified"], true);

    let user = ctx.users.get("jane@example.com").await.unwrap();
    assert!(user.is_verified);
    assert!(ctx.cache.is_empty().await);
}

#[actix_web::test]
async fn test_code_cannot_be_redeemed_twice() {
    let ctx = TestContext::new().await;
    ctx.seed_user("jane@example.com", false).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/user-service/request-otp")
        .set_json(json!({ "email": "jane@example.com" }))
        .to_request();
    test::call_service(&app, req).await;
    let uri = format!(
        "/api/user-service/verify-otp?otp_code={}",
        ctx.published()[0].code
    );

    let first = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(second).await;
    assert_eq!(body["error"], "otp_not_found");
}

#[actix_web::test]
async fn test_unknown_code_not_found() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/user-service/verify-otp?otp_code=123456")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "otp_not_found");
}

#[actix_web::test]
async fn test_code_failing_validation_is_invalid_and_stays_pending() {
    let ctx = TestContext::new().await;
    ctx.seed_user("jane@example.com", false).await;

    // Store a record whose secret does not produce the code it is keyed by
    let generated = OtpGenerator::new(Duration::from_secs(300)).generate().unwrap();
    let code = if generated.code == "000000" { "999999" } else { "000000" };
    let record = OtpRecord::new("jane@example.com", code, generated.secret);
    ctx.cache
        .set(code, &record, Duration::from_secs(300))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!("/api/user-service/verify-otp?otp_code={}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_otp_code");
    assert_eq!(ctx.cache.len().await, 1);
    assert!(!ctx.users.get("jane@example.com").await.unwrap().is_verified);
}

#[actix_web::test]
async fn test_missing_code_is_validation_error() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    for uri in [
        "/api/user-service/verify-otp",
        "/api/user-service/verify-otp?otp_code=",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }
}

#[actix_web::test]
async fn test_redeemed_code_for_deleted_user_reports_not_found() {
    let ctx = TestContext::new().await;

    let generator = OtpGenerator::new(Duration::from_secs(300));
    let generated = generator.generate().unwrap();
    let record = OtpRecord::new("ghost@example.com", generated.code.clone(), generated.secret);
    ctx.cache
        .set(&generated.code, &record, Duration::from_secs(300))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/user-service/verify-otp?otp_code={}",
            generated.code
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "not_found");
}
