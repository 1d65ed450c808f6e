use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::api::latency::LatencyStats;
use crate::config::{RETRY_STATUSES, SUCCESS_STATUSES};
use crate::render::RenderedArtifact;

use super::payload::Payload;
use super::transport::WebhookTransport;

/// Attempt cap and exponential backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Sleep after the 1-based `attempt` failed: base, 2×base, 4×base, …
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// 200 or 204.
    Delivered,
    /// Non-success status outside the retry set. Not retried: the sink may
    /// have accepted the message anyway.
    Rejected,
    /// Every attempt got a retry-eligible status.
    Exhausted,
    /// No response at all. Not retried for the same reason as `Rejected`.
    TransportFailed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Exhausted => "exhausted",
            DeliveryOutcome::TransportFailed => "transport_failed",
        };
        write!(f, "{s}")
    }
}

/// Record of one `post` call.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub target: String,
    pub attempts: u32,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub outcome: DeliveryOutcome,
    pub backoff_sleeps: u32,
    #[serde(skip)]
    pub waited: Duration,
}

impl DeliveryAttempt {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            attempts: 0,
            last_status: None,
            last_error: None,
            outcome: DeliveryOutcome::Exhausted,
            backoff_sleeps: 0,
            waited: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

pub struct Notifier {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    latency: Option<Arc<LatencyStats>>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn WebhookTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Arc<LatencyStats>) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Send a rendered artifact.
    pub async fn deliver(&self, target: &str, artifact: RenderedArtifact) -> DeliveryAttempt {
        self.post(target, &Payload::from(artifact)).await
    }

    /// POST `payload` to `target`. Always resolves; the outcome is in the report.
    pub async fn post(&self, target: &str, payload: &Payload) -> DeliveryAttempt {
        let mut report = DeliveryAttempt::new(target);
        let host = redact(target);

        for attempt in 1..=self.policy.attempts {
            report.attempts = attempt;
            let started = Instant::now();
            let result = self.transport.send(target, payload).await;
            if let Some(latency) = &self.latency {
                latency.record(started.elapsed());
            }

            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        target_host = %host,
                        attempt,
                        "[DELIVERY] {} post to {host} failed without a response: {e}; not retrying",
                        payload.kind(),
                    );
                    report.last_error = Some(e.to_string());
                    report.outcome = DeliveryOutcome::TransportFailed;
                    return report;
                }
            };
            report.last_status = Some(status);

            if SUCCESS_STATUSES.contains(&status) {
                info!(
                    target_host = %host,
                    status,
                    attempt,
                    "[DELIVERY] {} delivered to {host} (HTTP {status}, attempt {attempt})",
                    payload.kind(),
                );
                report.outcome = DeliveryOutcome::Delivered;
                return report;
            }

            if !RETRY_STATUSES.contains(&status) {
                warn!(
                    target_host = %host,
                    status,
                    attempt,
                    "[DELIVERY] {host} rejected {} post with HTTP {status}; not retrying",
                    payload.kind(),
                );
                report.outcome = DeliveryOutcome::Rejected;
                return report;
            }

            if attempt < self.policy.attempts {
                let delay = self.policy.delay_after(attempt);
                warn!(
                    target_host = %host,
                    status,
                    attempt,
                    "[DELIVERY] HTTP {status} from {host}, retrying in {:.1}s ({attempt}/{})",
                    delay.as_secs_f64(),
                    self.policy.attempts,
                );
                tokio::time::sleep(delay).await;
                report.backoff_sleeps += 1;
                report.waited += delay;
            }
        }

        error!(
            target_host = %host,
            attempts = report.attempts,
            "[DELIVERY] failed to post to {host} after {} attempts (last HTTP {:?})",
            report.attempts,
            report.last_status,
        );
        report.outcome = DeliveryOutcome::Exhausted;
        report
    }
}

/// Webhook URLs carry their secret in the path; log the host only.
fn redact(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}
