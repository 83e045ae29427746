//! User-service routes
//!
//! - `POST /api/user-service/register`
//! - `POST /api/user-service/request-otp`
//! - `GET /api/user-service/verify-otp?otp_code=...`

pub mod register;
pub mod request_otp;
pub mod verify_otp;

pub use register::register;
pub use request_otp::request_otp;
pub use verify_otp::verify_otp;
