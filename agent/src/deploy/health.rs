//! Health probing
//!
//! Bounded polling of a small set of well-known endpoints, in fixed priority
//! order. Exhaustion yields an inconclusive verdict, never an error: some
//! backends take longer than the probe window to bind their port, and the
//! pipeline treats that as a degraded success.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Candidate paths, tried in this order on every round
pub const CANDIDATE_PATHS: [&str; 4] = ["/health", "/healthz", "/api/health", "/"];

// Per-request timeout; requests are additionally capped at the remaining
// probe budget so a hanging endpoint cannot hold the pipeline open
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

// Statuses proving the endpoint answers as intended
const ACCEPTED: [u16; 5] = [200, 201, 204, 301, 302];

// Statuses proving the service is alive but the path is not a health
// endpoint. Accepted as healthy: the probe confirms the service serves
// traffic, not that it exposes a health route.
const ALIVE: [u16; 4] = [304, 401, 403, 404];

/// Overall probe verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
    Inconclusive,
}

impl HealthVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthVerdict::Healthy => "healthy",
            HealthVerdict::Unhealthy => "unhealthy",
            HealthVerdict::Inconclusive => "inconclusive",
        }
    }
}

/// One endpoint attempt: path and observed status (None when unreachable)
#[derive(Debug, Clone, Serialize)]
pub struct EndpointProbe {
    pub path: String,
    pub status: Option<u16>,
}

/// Outcome of one round of endpoint polling
#[derive(Debug, Clone, Serialize)]
pub struct HealthProbeResult {
    pub attempts: Vec<EndpointProbe>,
    pub verdict: HealthVerdict,
}

/// HTTP health prober
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            // Redirect statuses count as healthy; do not follow them
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Poll the candidate endpoints up to `max_attempts` rounds with a fixed
    /// `interval` between rounds. The whole poll is capped at
    /// `max_attempts * interval`: in-flight requests are cut off at the
    /// remaining budget, so a hanging endpoint cannot stretch the window.
    pub async fn probe<S, F>(
        &self,
        base_url: &str,
        max_attempts: u32,
        interval: Duration,
        sleep_fn: S,
    ) -> HealthProbeResult
    where
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let mut attempts = Vec::new();

        let base = match Url::parse(base_url) {
            Ok(url) => url,
            Err(e) => {
                debug!("Invalid probe base URL {}: {}", base_url, e);
                return HealthProbeResult {
                    attempts,
                    verdict: HealthVerdict::Inconclusive,
                };
            }
        };

        let mut saw_response = false;
        let deadline = Instant::now() + interval.saturating_mul(max_attempts);

        'rounds: for attempt in 1..=max_attempts {
            for path in CANDIDATE_PATHS {
                let url = match base.join(path) {
                    Ok(url) => url,
                    Err(_) => continue,
                };

                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!("Probe budget spent after {} endpoint attempts", attempts.len());
                    break 'rounds;
                }

                match tokio::time::timeout(remaining, self.client.get(url.clone()).send()).await {
                    Ok(Ok(response)) => {
                        let status = response.status().as_u16();
                        saw_response = true;
                        attempts.push(EndpointProbe {
                            path: path.to_string(),
                            status: Some(status),
                        });

                        if ACCEPTED.contains(&status) {
                            info!("Health probe succeeded: {} -> {}", path, status);
                            return HealthProbeResult {
                                attempts,
                                verdict: HealthVerdict::Healthy,
                            };
                        }
                        if ALIVE.contains(&status) {
                            info!(
                                "Service alive ({} -> {}), no health endpoint; accepting",
                                path, status
                            );
                            return HealthProbeResult {
                                attempts,
                                verdict: HealthVerdict::Healthy,
                            };
                        }
                        debug!("Probe {} -> {} not acceptable", path, status);
                    }
                    Ok(Err(e)) => {
                        debug!("Probe {} unreachable: {}", path, e);
                        attempts.push(EndpointProbe {
                            path: path.to_string(),
                            status: None,
                        });
                    }
                    Err(_) => {
                        debug!("Probe {} still pending at budget expiry", path);
                        attempts.push(EndpointProbe {
                            path: path.to_string(),
                            status: None,
                        });
                        break 'rounds;
                    }
                }
            }

            if attempt < max_attempts && Instant::now() < deadline {
                sleep_fn(interval).await;
            }
        }

        let verdict = if saw_response {
            HealthVerdict::Unhealthy
        } else {
            HealthVerdict::Inconclusive
        };
        HealthProbeResult { attempts, verdict }
    }
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new()
    }
}
