//! Pod selection
//!
//! Lists the pods of a namespace, keeps the running ones that satisfy every
//! label constraint and draws one of them at random. An empty pool is retried
//! with a fixed backoff until the attempt budget runs out.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PodExecError;
use crate::kubernetes::{KubeClientError, PodCandidate, PodSource};
use crate::labels::LabelSelector;

/// Default number of list attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 19;
/// Default pause between two attempts
pub const DEFAULT_ATTEMPT_INTERVAL: Duration = Duration::from_secs(10);

/// How long to keep polling for an eligible pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl RetryPolicy {
    /// `max_attempts` of zero is treated as a single attempt
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_ATTEMPT_INTERVAL)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Outcome of the selection loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(PodCandidate),
    /// Every attempt found zero eligible pods
    Exhausted { attempts: u32 },
}

impl Selection {
    /// Turn exhaustion into [`PodExecError::NoSuitablePod`]
    pub fn into_pod(self, namespace: &str) -> Result<PodCandidate, PodExecError> {
        match self {
            Self::Selected(pod) => Ok(pod),
            Self::Exhausted { attempts } => Err(PodExecError::NoSuitablePod {
                namespace: namespace.to_string(),
                attempts,
            }),
        }
    }
}

/// Whether `pod` may be chosen: running, and matching every constraint
pub fn is_eligible(pod: &PodCandidate, selector: &LabelSelector) -> bool {
    pod.is_running() && selector.matches(&pod.labels)
}

/// Draw one eligible pod uniformly at random, or `None` when none qualify
pub fn choose_eligible<R: Rng>(
    pods: Vec<PodCandidate>,
    selector: &LabelSelector,
    rng: &mut R,
) -> Option<PodCandidate> {
    let mut eligible: Vec<PodCandidate> = pods
        .into_iter()
        .filter(|pod| is_eligible(pod, selector))
        .collect();

    if eligible.is_empty() {
        return None;
    }

    let index = rng.gen_range(0..eligible.len());
    Some(eligible.swap_remove(index))
}

/// Picks a target pod from a [`PodSource`]
pub struct PodSelector<'a, S: ?Sized, R> {
    source: &'a S,
    rng: R,
}

impl<'a, S: PodSource + ?Sized, R: Rng> PodSelector<'a, S, R> {
    pub fn new(source: &'a S, rng: R) -> Self {
        Self { source, rng }
    }

    /// Poll until an eligible pod shows up or the policy is exhausted.
    ///
    /// List failures are returned immediately; only an empty eligible set is
    /// retried. No sleep follows the final attempt, so `n` attempts wait
    /// `n - 1` intervals: the default 19 × 10 s policy gives up after 180 s,
    /// not 190 s.
    pub async fn select_pod(
        &mut self,
        namespace: &str,
        selector: &LabelSelector,
        policy: RetryPolicy,
    ) -> Result<Selection, KubeClientError> {
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let pods = self.source.list_pods(namespace).await?;
            let listed = pods.len();

            if let Some(pod) = choose_eligible(pods, selector, &mut self.rng) {
                tracing::info!(
                    "Selected pod {} in {} (attempt {}, {} pods listed)",
                    pod.name,
                    namespace,
                    attempt,
                    listed
                );
                return Ok(Selection::Selected(pod));
            }

            if attempt == max_attempts {
                break;
            }

            tracing::warn!(
                "Unable to find a suitable pod to run on (attempt {}/{}). Backing off for a further {} seconds.",
                attempt,
                max_attempts,
                policy.interval.as_secs()
            );
            tokio::time::sleep(policy.interval).await;
        }

        tracing::error!(
            "No running pod in {} matched [{}] after {} attempts",
            namespace,
            selector,
            max_attempts
        );
        Ok(Selection::Exhausted {
            attempts: max_attempts,
        })
    }
}
