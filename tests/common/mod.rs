//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cloud_api_guard::provider::{ApiError, ErrorCode};
use cloud_api_guard::throttle::{Operation, ThrottleError};

/// An outgoing provider call.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub operation: String,
}

impl ApiCall {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
        }
    }
}

impl Operation for ApiCall {
    fn operation_name(&self) -> &str {
        &self.operation
    }
}

/// Error type of the fake client stack.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Throttle(#[from] ThrottleError),
}

impl ErrorCode for CallError {
    fn code(&self) -> Option<&str> {
        match self {
            CallError::Api(err) => err.code(),
            CallError::Throttle(_) => None,
        }
    }
}

/// Counts calls and fails the first `failures` of them with `code`.
#[derive(Clone)]
pub struct FlakyProvider {
    calls: Arc<AtomicU32>,
    failures: u32,
    code: &'static str,
}

impl FlakyProvider {
    pub fn new(failures: u32, code: &'static str) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            code,
        }
    }

    pub fn healthy() -> Self {
        Self::new(0, "")
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handle one call, returning the operation name on success.
    pub async fn handle(&self, call: ApiCall) -> Result<String, CallError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(ApiError::new(self.code, format!("{} failed", call.operation)).into())
        } else {
            Ok(call.operation)
        }
    }
}
