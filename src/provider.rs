//! Provider error classification shared by the waiter and the limiter.

use thiserror::Error;

/// Errors that carry a provider-defined string code (e.g. `"Throttling"`,
/// `"InvalidInstanceID.NotFound"`).
pub trait ErrorCode {
    fn code(&self) -> Option<&str>;
}

/// A generic cloud API error: code plus human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ApiError {
    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }
}

impl<T: ErrorCode + ?Sized> ErrorCode for Box<T> {
    fn code(&self) -> Option<&str> {
        (**self).code()
    }
}
