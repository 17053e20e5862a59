//! Per-operation limiters grouped by remote service.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::schema::{default_throttle_codes, ServiceConfig};
use crate::observability::metrics;
use crate::throttle::bucket::TokenBucket;
use crate::throttle::ThrottleError;

/// Build one regex matching any of `patterns` at the start of a name.
pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Regex, regex::Error> {
    let alternation = patterns
        .iter()
        .map(|p| format!("(?:{})", p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("^(?:{alternation})"))
}

/// A token bucket shared by every operation whose name matches its patterns.
#[derive(Debug)]
pub struct OperationLimiter {
    patterns: Vec<String>,
    matcher: Regex,
    refill_rate: f64,
    burst: u32,
    bucket: OnceLock<TokenBucket>,
}

impl OperationLimiter {
    pub fn new<S: AsRef<str>>(
        patterns: &[S],
        refill_rate: f64,
        burst: u32,
    ) -> Result<Self, ThrottleError> {
        if patterns.is_empty() {
            return Err(ThrottleError::EmptyRule);
        }
        if !(refill_rate.is_finite() && refill_rate > 0.0) || burst == 0 {
            return Err(ThrottleError::InvalidRate { refill_rate, burst });
        }

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            matcher: compile_patterns(patterns)?,
            refill_rate,
            burst,
            bucket: OnceLock::new(),
        })
    }

    pub fn matches(&self, operation: &str) -> bool {
        self.matcher.is_match(operation)
    }

    /// The bucket, created on first use.
    pub fn bucket(&self) -> &TokenBucket {
        self.bucket
            .get_or_init(|| TokenBucket::new(self.refill_rate, self.burst))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

/// Ordered operation limiters for one remote service.
#[derive(Debug)]
pub struct ServiceLimiter {
    name: String,
    limiters: Vec<OperationLimiter>,
    throttle_codes: Vec<String>,
}

impl ServiceLimiter {
    /// An empty limiter set using the default throttling error codes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limiters: Vec::new(),
            throttle_codes: default_throttle_codes(),
        }
    }

    /// Append a rule. Rules added earlier take precedence.
    pub fn with_rule<S: AsRef<str>>(
        mut self,
        patterns: &[S],
        refill_rate: f64,
        burst: u32,
    ) -> Result<Self, ThrottleError> {
        self.limiters
            .push(OperationLimiter::new(patterns, refill_rate, burst)?);
        Ok(self)
    }

    pub fn with_throttle_codes<S: AsRef<str>>(mut self, codes: &[S]) -> Self {
        self.throttle_codes = codes.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ThrottleError> {
        config
            .rules
            .iter()
            .try_fold(
                Self::new(config.name.clone()).with_throttle_codes(&config.throttle_codes),
                |limiter, rule| limiter.with_rule(&rule.operations, rule.refill_rate, rule.burst),
            )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limiters(&self) -> &[OperationLimiter] {
        &self.limiters
    }

    /// First rule whose patterns match `operation`.
    pub fn matching(&self, operation: &str) -> Option<&OperationLimiter> {
        self.limiters.iter().find(|l| l.matches(operation))
    }

    pub fn is_throttle_code(&self, code: &str) -> bool {
        self.throttle_codes.iter().any(|c| c == code)
    }

    /// Block until `operation` may be sent.
    ///
    /// Operations that match no rule pass straight through. Fails only if
    /// `cancel` fires while waiting.
    pub async fn limit_request(
        &self,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ThrottleError> {
        let Some(limiter) = self.matching(operation) else {
            return Ok(());
        };

        let started = Instant::now();
        match limiter.bucket().acquire(cancel).await {
            Some(waited) => {
                if !waited.is_zero() {
                    metrics::record_throttle_wait(&self.name, operation, started.elapsed());
                    tracing::debug!(
                        service = %self.name,
                        operation,
                        waited_ms = waited.as_millis() as u64,
                        "Request delayed by rate limiter"
                    );
                }
                Ok(())
            }
            None => {
                tracing::debug!(service = %self.name, operation, "Rate limiter wait cancelled");
                Err(ThrottleError::Cancelled {
                    operation: operation.to_string(),
                })
            }
        }
    }

    /// Inspect the provider error code of a finished call.
    ///
    /// A throttling code refills the operation's bucket so the next attempt
    /// is not delayed on top of the provider's own backoff. Returns whether a
    /// reset happened.
    pub fn review_response(&self, operation: &str, error_code: Option<&str>) -> bool {
        let Some(code) = error_code else {
            return false;
        };
        if !self.is_throttle_code(code) {
            return false;
        }
        let Some(limiter) = self.matching(operation) else {
            return false;
        };

        limiter.bucket().reset();
        metrics::record_throttle_reset(&self.name, operation);
        tracing::info!(
            service = %self.name,
            operation,
            code,
            "Provider throttled request, refilled limiter"
        );
        true
    }
}

/// Immutable registry of service limiters, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceLimiters {
    services: HashMap<String, Arc<ServiceLimiter>>,
}

impl ServiceLimiters {
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, ThrottleError> {
        let services = services
            .iter()
            .map(|config| {
                ServiceLimiter::from_config(config)
                    .map(|limiter| (config.name.clone(), Arc::new(limiter)))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { services })
    }

    pub fn get(&self, service: &str) -> Option<Arc<ServiceLimiter>> {
        self.services.get(service).cloned()
    }

    /// Service names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RuleConfig;
    use std::time::Duration;

    fn ec2() -> ServiceLimiter {
        ServiceLimiter::new("ec2")
            .with_rule(&["DescribeInstances"], 10.0, 1)
            .unwrap()
            .with_rule(&["Describe", "Get"], 10.0, 3)
            .unwrap()
    }

    #[test]
    fn test_first_match_wins_and_is_anchored() {
        let limiter = ec2();
        assert_eq!(limiter.matching("DescribeInstances").unwrap().burst(), 1);
        assert_eq!(limiter.matching("DescribeVpcs").unwrap().burst(), 3);
        assert_eq!(limiter.matching("GetConsoleOutput").unwrap().burst(), 3);
        assert!(limiter.matching("RunInstances").is_none());
        assert!(limiter.matching("BulkDescribe").is_none());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert_eq!(
            OperationLimiter::new::<&str>(&[], 1.0, 1).unwrap_err(),
            ThrottleError::EmptyRule
        );
        assert!(matches!(
            OperationLimiter::new(&["Describe"], 0.0, 1),
            Err(ThrottleError::InvalidRate { .. })
        ));
        assert!(matches!(
            OperationLimiter::new(&["Describe("], 1.0, 1),
            Err(ThrottleError::InvalidPattern(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_passes_then_blocks() {
        let limiter = ec2();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..3 {
            limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_operation_is_not_limited() {
        let limiter = ec2();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.limit_request("RunInstances", &cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_signal_refills_bucket() {
        let limiter = ec2();
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        }

        assert!(limiter.review_response("DescribeVpcs", Some("RequestLimitExceeded")));

        let start = Instant::now();
        limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_codes_do_not_refill() {
        let limiter = ec2();
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        }

        assert!(!limiter.review_response("DescribeVpcs", Some("InternalError")));
        assert!(!limiter.review_response("DescribeVpcs", None));
        assert!(!limiter.review_response("RunInstances", Some("Throttling")));

        let start = Instant::now();
        limiter.limit_request("DescribeVpcs", &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_error() {
        let limiter = ServiceLimiter::new("elb")
            .with_rule(&["Describe"], 0.1, 1)
            .unwrap();
        let cancel = CancellationToken::new();
        limiter.limit_request("DescribeLoadBalancers", &cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = limiter
            .limit_request("DescribeLoadBalancers", &cancel)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ThrottleError::Cancelled {
                operation: "DescribeLoadBalancers".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_callers_do_not_delay_later_ones() {
        let limiter = ServiceLimiter::new("ec2")
            .with_rule(&["Describe"], 1.0, 1)
            .unwrap();
        let cancel = CancellationToken::new();
        limiter.limit_request("DescribeInstances", &cancel).await.unwrap();

        for _ in 0..3 {
            let deadline = tokio::time::timeout(
                Duration::from_millis(1),
                limiter.limit_request("DescribeInstances", &cancel),
            );
            assert!(deadline.await.is_err());
        }

        let start = Instant::now();
        limiter.limit_request("DescribeInstances", &cancel).await.unwrap();
        let waited = start.elapsed();
        assert!(waited < Duration::from_secs(1), "{waited:?}");
        assert!(waited > Duration::from_millis(900), "{waited:?}");
    }

    #[test]
    fn test_bucket_created_once_under_concurrency() {
        let limiter = Arc::new(ec2());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    let bucket = limiter.matching("DescribeVpcs").unwrap().bucket();
                    bucket as *const TokenBucket as usize
                })
            })
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_registry_from_config() {
        let configs = vec![
            ServiceConfig {
                name: "ec2".to_string(),
                throttle_codes: vec!["RequestLimitExceeded".to_string()],
                rules: vec![RuleConfig {
                    operations: vec!["Describe".to_string()],
                    refill_rate: 20.0,
                    burst: 100,
                }],
            },
            ServiceConfig {
                name: "elbv2".to_string(),
                throttle_codes: default_throttle_codes(),
                rules: Vec::new(),
            },
        ];

        let registry = ServiceLimiters::from_config(&configs).unwrap();
        assert_eq!(registry.names(), vec!["ec2", "elbv2"]);

        let ec2 = registry.get("ec2").unwrap();
        assert!(ec2.is_throttle_code("RequestLimitExceeded"));
        assert!(!ec2.is_throttle_code("Throttling"));
        assert_eq!(ec2.matching("DescribeSubnets").unwrap().refill_rate(), 20.0);
        assert!(registry.get("s3").is_none());
    }
}
