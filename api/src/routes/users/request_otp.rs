use actix_web::{web, HttpResponse};
use validator::Validate;
use vouch_core::repositories::UserRepository;
use vouch_core::services::{NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait};

use crate::app::AppState;
use crate::dto::{RequestOtpRequest, RequestOtpResponse};
use crate::handlers::{handle_domain_error, validation_error};

/// Handler for POST /api/user-service/request-otp
///
/// Issues a fresh code for a registered, unverified email. Previously
/// issued codes stay valid until they expire.
///
/// # Errors
/// - `404 not_found` when no user has this email
/// - `409 already_verified` when the email is already verified
/// - `503 service_unavailable` when the email could not be queued
pub async fn request_otp<C, R, P, H>(
    state: web::Data<AppState<C, R, P, H>>,
    request: web::Json<RequestOtpRequest>,
) -> HttpResponse
where
    C: VerificationCacheTrait + 'static,
    R: UserRepository + 'static,
    P: NotificationPublisherTrait + 'static,
    H: PasswordHasherTrait + 'static,
{
    let request = request.into_inner();
    if let Err(errors) = request.validate() {
        return validation_error(&errors);
    }

    let cancel = state.request_token();
    match state.otp_service.request_otp(&cancel, &request.email).await {
        Ok(issued) => HttpResponse::Ok().json(RequestOtpResponse {
            message: "OTP code sent, check your email".to_string(),
            expires_at: issued.expires_at,
        }),
        Err(e) => handle_domain_error(e),
    }
}
