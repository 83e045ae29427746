use actix_web::{web, HttpResponse};
use validator::Validate;
use vouch_core::domain::entities::NewUser;
use vouch_core::repositories::UserRepository;
use vouch_core::services::{NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait};

use crate::app::AppState;
use crate::dto::{RegisterRequest, RegisterResponse};
use crate::handlers::{handle_domain_error, validation_error};

/// Handler for POST /api/user-service/register
///
/// Creates an unverified account and queues its verification email.
///
/// # Request Body
///
/// ```json
/// { "fullname": "Jane Doe", "email": "jane@example.com", "password": "s3cret-pass" }
/// ```
///
/// # Response
///
/// `201 Created` with the new user id. `notification_queued` is false when
/// the account exists but the email could not be queued.
pub async fn register<C, R, P, H>(
    state: web::Data<AppState<C, R, P, H>>,
    request: web::Json<RegisterRequest>,
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
    let new_user = NewUser::new(request.fullname, request.email, request.password);

    match state
        .otp_service
        .register_and_request_otp(&cancel, &new_user)
        .await
    {
        Ok(outcome) => {
            let message = if outcome.notification_queued {
                "Registration successful, check your email for the OTP code"
            } else {
                "Registration successful, but the OTP email could not be sent; request a new code"
            };

            HttpResponse::Created().json(RegisterResponse {
                user_id: outcome.user_id,
                email: outcome.otp.email,
                notification_queued: outcome.notification_queued,
                otp_expires_at: outcome.otp.expires_at,
                message: message.to_string(),
            })
        }
        Err(e) => handle_domain_error(e),
    }
}
