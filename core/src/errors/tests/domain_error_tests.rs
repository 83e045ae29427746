//! Tests for domain error conversions

use vouch_queue::QueueError;

use crate::errors::{DomainError, NotificationError, OtpError};

#[test]
fn test_otp_error_bridges_transparently() {
    let err: DomainError = OtpError::InvalidCode.into();
    assert_eq!(err.to_string(), "Invalid OTP code");
    assert!(matches!(err, DomainError::Otp(OtpError::InvalidCode)));
}

#[test]
fn test_queue_cancellation_maps_to_canceled() {
    let err: DomainError = QueueError::Canceled.into();
    assert!(matches!(err, DomainError::Canceled));

    let err: DomainError = QueueError::ConnectionLost.into();
    assert!(matches!(err, DomainError::Queue(QueueError::ConnectionLost)));
}

#[test]
fn test_permanent_notification_errors() {
    assert!(NotificationError::MalformedPayload {
        reason: "eof".to_string()
    }
    .is_permanent());
    assert!(!NotificationError::Template {
        message: "missing".to_string()
    }
    .is_permanent());
    assert!(!NotificationError::Delivery {
        message: "smtp down".to_string()
    }
    .is_permanent());
    assert!(NotificationError::Rejected {
        message: "550 no such user".to_string()
    }
    .is_permanent());
}

#[test]
fn test_error_messages() {
    assert_eq!(
        DomainError::validation("email is required").to_string(),
        "Validation error: email is required"
    );
    assert_eq!(
        OtpError::NotFound.to_string(),
        "OTP code not found or expired"
    );
}
