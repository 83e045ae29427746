//! Mapping of domain errors to HTTP responses
//!
//! Every failure the client can act on gets its own error code; anything
//! else collapses to `internal_error` without leaking details.

use std::collections::HashMap;

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use validator::ValidationErrors;
use vouch_core::errors::{DomainError, OtpError};

use crate::dto::ErrorResponse;

/// Status, error code and client-facing message for a domain error
pub fn classify(error: &DomainError) -> (StatusCode, &'static str, String) {
    match error {
        DomainError::Otp(OtpError::InvalidCode) => (
            StatusCode::BAD_REQUEST,
            "invalid_otp_code",
            "The OTP code is invalid".to_string(),
        ),
        DomainError::Otp(OtpError::NotFound) => (
            StatusCode::NOT_FOUND,
            "otp_not_found",
            "The OTP code was not found or has expired".to_string(),
        ),
        DomainError::Otp(OtpError::AlreadyVerified) => (
            StatusCode::CONFLICT,
            "already_verified",
            "This email address is already verified".to_string(),
        ),
        DomainError::Otp(OtpError::EmailAlreadyRegistered) => (
            StatusCode::CONFLICT,
            "email_already_registered",
            "This email address is already registered".to_string(),
        ),
        DomainError::Validation { message } => {
            (StatusCode::BAD_REQUEST, "validation_error", message.clone())
        }
        DomainError::NotFound { resource } => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{} not found", resource),
        ),
        DomainError::Queue(_) | DomainError::Canceled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            "The service is temporarily unavailable, please retry".to_string(),
        ),
        DomainError::Internal { .. }
        | DomainError::Database { .. }
        | DomainError::Cache { .. }
        | DomainError::Notification(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred".to_string(),
        ),
    }
}

/// Convert a domain error into its JSON response
pub fn handle_domain_error(error: DomainError) -> HttpResponse {
    let (status, code, message) = classify(&error);

    if status.is_server_error() {
        tracing::error!(error = %error, code, status = status.as_u16(), "Request failed");
    } else {
        tracing::info!(error = %error, code, status = status.as_u16(), "Request rejected");
    }

    ErrorResponse::new(code, message).to_response(status)
}

/// 400 response listing the failed fields
pub fn validation_error(errors: &ValidationErrors) -> HttpResponse {
    let details: HashMap<String, serde_json::Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect();

    tracing::info!(fields = ?details.keys().collect::<Vec<_>>(), "Request validation failed");

    ErrorResponse::new("validation_error", "Invalid request data")
        .with_details(details)
        .to_response(StatusCode::BAD_REQUEST)
}

/// Turn JSON extractor failures into `validation_error` bodies
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = ErrorResponse::new("validation_error", format!("Invalid JSON body: {}", err))
        .to_response(StatusCode::BAD_REQUEST);
    actix_web::error::InternalError::from_response(err, response).into()
}

/// Turn query extractor failures into `validation_error` bodies
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = ErrorResponse::new("validation_error", format!("Invalid query string: {}", err))
        .to_response(StatusCode::BAD_REQUEST);
    actix_web::error::InternalError::from_response(err, response).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_queue::QueueError;

    #[test]
    fn test_otp_errors_are_distinguishable() {
        let cases = [
            (OtpError::InvalidCode, StatusCode::BAD_REQUEST, "invalid_otp_code"),
            (OtpError::NotFound, StatusCode::NOT_FOUND, "otp_not_found"),
            (OtpError::AlreadyVerified, StatusCode::CONFLICT, "already_verified"),
            (
                OtpError::EmailAlreadyRegistered,
                StatusCode::CONFLICT,
                "email_already_registered",
            ),
        ];

        for (error, status, code) in cases {
            let (actual_status, actual_code, _) = classify(&DomainError::Otp(error));
            assert_eq!(actual_status, status);
            assert_eq!(actual_code, code);
        }
    }

    #[test]
    fn test_queue_failures_are_service_unavailable() {
        let (status, code, _) = classify(&DomainError::from(QueueError::ConnectionLost));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "service_unavailable");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let (status, code, message) = classify(&DomainError::Database {
            message: "connection refused to 10.0.0.5".to_string(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_error");
        assert!(!message.contains("10.0.0.5"));
    }
}
