//! Domain entities representing core business objects.

pub mod notification_event;
pub mod otp_record;
pub mod user;


// Re-export commonly used types
pub use notification_event::NotificationEvent;
pub use otp_record::OtpRecord;
pub use user::{NewUser, User};
