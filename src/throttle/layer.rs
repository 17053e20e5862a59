//! Tower middleware applying a [`ServiceLimiter`] to outgoing requests.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};

use crate::provider::ErrorCode;
use crate::throttle::limiter::ServiceLimiter;
use crate::throttle::ThrottleError;

/// Requests that name the logical API operation they perform.
pub trait Operation {
    fn operation_name(&self) -> &str;
}

/// Classifier reading the provider error code out of a failed call.
pub fn classify_error<R, E: ErrorCode>(result: &Result<R, E>) -> Option<String> {
    result
        .as_ref()
        .err()
        .and_then(|err| err.code())
        .map(str::to_string)
}

/// Layer producing [`ThrottleService`]s.
///
/// `classify` maps a call's outcome to the provider error code, if any, which
/// is then fed to [`ServiceLimiter::review_response`].
#[derive(Clone)]
pub struct ThrottleLayer<C> {
    limiter: Arc<ServiceLimiter>,
    classify: C,
    cancel: CancellationToken,
}

impl<C> ThrottleLayer<C> {
    pub fn new(limiter: Arc<ServiceLimiter>, classify: C) -> Self {
        Self {
            limiter,
            classify,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort pending limiter waits when `cancel` fires (e.g. on shutdown).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl<S, C: Clone> Layer<S> for ThrottleLayer<C> {
    type Service = ThrottleService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            limiter: self.limiter.clone(),
            classify: self.classify.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Waits on the limiter before each call and reviews the outcome after it.
#[derive(Clone)]
pub struct ThrottleService<S, C> {
    inner: S,
    limiter: Arc<ServiceLimiter>,
    classify: C,
    cancel: CancellationToken,
}

impl<S, C, Req> Service<Req> for ThrottleService<S, C>
where
    Req: Operation + Send + 'static,
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<ThrottleError> + Send + 'static,
    C: Fn(&Result<S::Response, S::Error>) -> Option<String> + Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();
        let classify = self.classify.clone();
        let cancel = self.cancel.clone();

        Box::pin(async move {
            let operation = request.operation_name().to_string();
            limiter.limit_request(&operation, &cancel).await?;

            let result = inner.call(request).await;
            let code = classify(&result);
            limiter.review_response(&operation, code.as_deref());
            result
        })
    }
}
