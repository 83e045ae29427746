//! Application state and route table
//!
//! Handlers are generic over the OTP workflow's collaborators so the same
//! route table serves production wiring and in-memory test wiring.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use tokio_util::sync::CancellationToken;
use vouch_core::repositories::UserRepository;
use vouch_core::services::{
    NotificationPublisherTrait, OtpService, PasswordHasherTrait, VerificationCacheTrait,
};
use vouch_queue::{ConnectionState, Transport};

use crate::dto::ErrorResponse;
use crate::handlers::{json_error_handler, query_error_handler};
use crate::routes::users::{register, request_otp, verify_otp};

/// Application state that holds shared services
pub struct AppState<C, R, P, H>
where
    C: VerificationCacheTrait,
    R: UserRepository,
    P: NotificationPublisherTrait,
    H: PasswordHasherTrait,
{
    pub otp_service: Arc<OtpService<C, R, P, H>>,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl<C, R, P, H> AppState<C, R, P, H>
where
    C: VerificationCacheTrait,
    R: UserRepository,
    P: NotificationPublisherTrait,
    H: PasswordHasherTrait,
{
    pub fn new(otp_service: Arc<OtpService<C, R, P, H>>, shutdown: CancellationToken) -> Self {
        Self {
            otp_service,
            shutdown,
        }
    }

    /// Cancellation token scoped to one request
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

/// Dependencies reported by `GET /health`
#[derive(Clone)]
pub struct HealthProbe {
    transport: Transport,
}

impl HealthProbe {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

/// Register every route of the service
pub fn configure<C, R, P, H>(cfg: &mut web::ServiceConfig)
where
    C: VerificationCacheTrait + 'static,
    R: UserRepository + 'static,
    P: NotificationPublisherTrait + 'static,
    H: PasswordHasherTrait + 'static,
{
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api/user-service")
                .route("/register", web::post().to(register::<C, R, P, H>))
                .route("/request-otp", web::post().to(request_otp::<C, R, P, H>))
                .route("/verify-otp", web::get().to(verify_otp::<C, R, P, H>)),
        )
        .default_service(web::route().to(not_found));
}

/// Health check endpoint handler
///
/// Reports `degraded` with 503 once the queue connection is permanently
/// lost, so orchestrators can restart the process.
async fn health_check(probe: Option<web::Data<HealthProbe>>) -> HttpResponse {
    let queue = probe.as_ref().map(|p| p.transport.state());
    let healthy = !matches!(
        queue,
        Some(ConnectionState::Failed) | Some(ConnectionState::Closed)
    );

    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "vouch-api",
        "version": env!("CARGO_PKG_VERSION"),
        "queue": queue.map(|state| state.to_string()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Default 404 handler
async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new(
        "not_found",
        "The requested resource was not found",
    ))
}
