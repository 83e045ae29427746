use actix_web::{web, HttpResponse};
use validator::Validate;
use vouch_core::repositories::UserRepository;
use vouch_core::services::{NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait};
use vouch_shared::utils::masking::mask_email;

use crate::app::AppState;
use crate::dto::{VerifyOtpQuery, VerifyOtpResponse};
use crate::handlers::{handle_domain_error, validation_error};

/// Handler for GET /api/user-service/verify-otp?otp_code=...
///
/// Redeems the code, then marks its user verified. The link in the
/// verification email points here.
pub async fn verify_otp<C, R, P, H>(
    state: web::Data<AppState<C, R, P, H>>,
    query: web::Query<VerifyOtpQuery>,
) -> HttpResponse
where
    C: VerificationCacheTrait + 'static,
    R: UserRepository + 'static,
    P: NotificationPublisherTrait + 'static,
    H: PasswordHasherTrait + 'static,
{
    let query = query.into_inner();
    if let Err(errors) = query.validate() {
        return validation_error(&errors);
    }

    let cancel = state.request_token();
    let email = match state.otp_service.verify_otp(&cancel, &query.otp_code).await {
        Ok(email) => email,
        Err(e) => return handle_domain_error(e),
    };

    if let Err(e) = state.otp_service.confirm_verification(&cancel, &email).await {
        tracing::warn!(
            email = %mask_email(&email),
            error = %e,
            event = "confirmation_failed",
            "Code redeemed but the user could not be marked verified"
        );
        return handle_domain_error(e);
    }

    HttpResponse::Ok().json(VerifyOtpResponse {
        email,
        verified: true,
        message: "Email verified successfully".to_string(),
    })
}
