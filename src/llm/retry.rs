use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, error, warn};

use super::{ChatRequest, Transport, UpstreamFailure, UpstreamResponse};

/// Retry and timeout limits for upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt (doubled for each one after)
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Deadline for one attempt, including reading the body
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            request_timeout: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with 0-based index `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        std::cmp::min(delay, self.max_delay)
    }
}

/// Executes chat requests with a per-attempt timeout and capped
/// exponential backoff.
///
/// Rate limiting (429), server errors (5xx) and transport faults are
/// retried. Any other status is returned as-is on the spot. A timeout is
/// never retried and surfaces immediately.
#[derive(Clone)]
pub struct ResilientExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one logical request.
    ///
    /// `Ok` carries either a success or a final non-retryable (or
    /// retry-exhausted) response; callers still have to check the status.
    pub async fn execute(&self, request: &ChatRequest) -> Result<UpstreamResponse, UpstreamFailure> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;
            debug!(
                transport = self.transport.name(),
                model = %request.model,
                attempt = attempt + 1,
                max_attempts,
                "sending upstream request"
            );

            let outcome = match timeout(self.policy.request_timeout, self.transport.send(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        attempt = attempt + 1,
                        timeout_ms = self.policy.request_timeout.as_millis() as u64,
                        "upstream request timed out"
                    );
                    return Err(UpstreamFailure::Timeout(self.policy.request_timeout));
                }
            };

            match outcome {
                Ok(response) if !response.is_transient() => {
                    if attempt > 0 {
                        debug!(
                            attempt = attempt + 1,
                            status = response.status,
                            "upstream answered after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    if is_last {
                        warn!(
                            attempt = attempt + 1,
                            status = response.status,
                            "upstream still failing, giving up"
                        );
                        return Ok(response);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        status = response.status,
                        delay_ms = delay.as_millis() as u64,
                        "upstream returned transient status, retrying"
                    );
                    sleep(delay).await;
                }
                Err(UpstreamFailure::Timeout(_)) => {
                    warn!(attempt = attempt + 1, "upstream request timed out in transport");
                    return Err(UpstreamFailure::Timeout(self.policy.request_timeout));
                }
                Err(fault) => {
                    if is_last {
                        error!(attempt = attempt + 1, error = %fault, "upstream unreachable, giving up");
                        return Err(fault);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %fault,
                        "upstream request failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }

        Err(UpstreamFailure::Transport(
            "all retry attempts failed".to_string(),
        ))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageContent;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Step {
        Status(u16),
        Fault,
        Hang,
    }

    /// Replays scripted outcomes and records when each attempt started
    struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &ChatRequest) -> Result<UpstreamResponse, UpstreamFailure> {
            self.calls.lock().unwrap().push(Instant::now());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Status(status)) => Ok(UpstreamResponse::new(status, format!("status {status}"))),
                Some(Step::Fault) => Err(UpstreamFailure::Transport("connection refused".into())),
                Some(Step::Hang) => std::future::pending().await,
                None => panic!("transport called more often than scripted"),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("model", "system", MessageContent::Text("hi".into()), 0.7, 10)
    }

    fn executor(transport: &Arc<ScriptedTransport>) -> ResilientExecutor {
        ResilientExecutor::new(transport.clone(), RetryPolicy::default())
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_return_on_first_attempt() {
        for status in [400, 401, 403, 404, 409, 422] {
            let transport = ScriptedTransport::new(vec![Step::Status(status)]);
            let started = Instant::now();

            let response = executor(&transport).execute(&request()).await.unwrap();

            assert_eq!(response.status, status);
            assert_eq!(transport.call_count(), 1);
            assert_eq!(started.elapsed(), Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_statuses_back_off_then_return_last_response() {
        for status in [429, 500, 502, 503] {
            let transport =
                ScriptedTransport::new(vec![Step::Status(status), Step::Status(status), Step::Status(status)]);

            let response = executor(&transport).execute(&request()).await.unwrap();

            assert_eq!(response.status, status);
            assert_eq!(transport.call_count(), 3);
            assert_eq!(
                transport.gaps(),
                vec![Duration::from_millis(1000), Duration::from_millis(2000)]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_status() {
        let transport = ScriptedTransport::new(vec![Step::Status(503), Step::Status(200)]);

        let response = executor(&transport).execute(&request()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Hang, Step::Status(200)]);
        let started = Instant::now();

        let failure = executor(&transport).execute(&request()).await.unwrap_err();

        assert_eq!(failure, UpstreamFailure::Timeout(Duration::from_secs(30)));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_faults_are_retried() {
        let transport = ScriptedTransport::new(vec![Step::Fault, Step::Status(200)]);

        let response = executor(&transport).execute(&request()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.gaps(), vec![Duration::from_millis(1000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_fault_surfaces_after_last_attempt() {
        let transport = ScriptedTransport::new(vec![Step::Fault, Step::Fault, Step::Fault]);

        let failure = executor(&transport).execute(&request()).await.unwrap_err();

        assert!(matches!(failure, UpstreamFailure::Transport(_)));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let transport = ScriptedTransport::new(vec![Step::Status(500)]);
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let started = Instant::now();

        let response = ResilientExecutor::new(transport.clone(), policy)
            .execute(&request())
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn policy_reads_milliseconds() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 5\ninitial_delay = 10").unwrap();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_millis(10_000));
        assert_eq!(policy.request_timeout, Duration::from_millis(30_000));
    }
}
