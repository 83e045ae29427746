//! Data transfer objects of the HTTP surface

pub mod error;
pub mod users;

pub use error::ErrorResponse;
pub use users::{
    RegisterRequest, RegisterResponse, RequestOtpRequest, RequestOtpResponse, VerifyOtpQuery,
    VerifyOtpResponse,
};
