//! Model readiness polling.
//!
//! Before the first inference, the client makes sure the model is running.
//! A stopped model gets exactly one start command, then its status is polled
//! on a fixed interval. Running out of attempts is not fatal by itself: the
//! caller decides what to do with `Readiness::TimedOut` (see `NotReadyPolicy`).
//! Cancellation is honoured before every status check and while waiting
//! between checks.

use crate::backends::{retry_once, EdgeAgentBackend};
use crate::error::EdgeAgentError;
use crate::types::{ModelDescription, ModelStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest stretch the poller sleeps without looking at the cancel flag.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// How often and how long to poll a starting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status checks
    pub interval: Duration,
    /// Maximum number of status checks after the initial one
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// What to do when the model is not running once polling is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NotReadyPolicy {
    /// Warn and run inference anyway; the model may still come up.
    #[default]
    Proceed,
    /// Stop before the first inference.
    Abort,
}

/// Outcome of readiness polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The model reported `RUNNING`
    Ready,
    /// The model reported `FAILED`, with the agent's status message
    Failed { message: String },
    /// The poll budget ran out before the model reported `RUNNING`
    TimedOut { last: ModelStatus, attempts: u32 },
    /// The agent reported a status this client does not know
    Indeterminate(ModelStatus),
    /// Cancellation was requested while waiting for the model
    Cancelled,
}

impl Readiness {
    /// The last status observed for the model, if polling got that far.
    pub fn status(&self) -> Option<ModelStatus> {
        match self {
            Readiness::Ready => Some(ModelStatus::Running),
            Readiness::Failed { .. } => Some(ModelStatus::Failed),
            Readiness::TimedOut { last, .. } => Some(*last),
            Readiness::Indeterminate(status) => Some(*status),
            Readiness::Cancelled => None,
        }
    }

    /// Apply `policy` to this outcome.
    ///
    /// `Cancelled` always passes; the caller is expected to stop on it.
    pub fn enforce(&self, model: &str, policy: NotReadyPolicy) -> Result<(), EdgeAgentError> {
        match (self.status(), policy) {
            (None, _) | (Some(ModelStatus::Running), _) | (_, NotReadyPolicy::Proceed) => Ok(()),
            (Some(status), NotReadyPolicy::Abort) => Err(EdgeAgentError::ModelNotReady {
                model: model.to_string(),
                status,
            }),
        }
    }
}

fn describe<B: EdgeAgentBackend + ?Sized>(
    backend: &mut B,
    model: &str,
) -> Result<ModelDescription, EdgeAgentError> {
    retry_once("DescribeModel", || backend.describe_model(model))
}

fn failed(description: ModelDescription) -> Readiness {
    if description.status_message.is_empty() {
        warn!("Model {} is in FAILED state", description.model_component);
    } else {
        warn!(
            "Model {} is in FAILED state: {}",
            description.model_component, description.status_message
        );
    }
    Readiness::Failed {
        message: description.status_message,
    }
}

/// Sleep for `duration`, waking early once `cancel` is set.
///
/// Returns `true` if cancellation was observed.
fn sleep_unless_cancelled(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
    }
}

/// Make sure `model` is running, starting it if needed.
///
/// Performs at most one `StartModel` call and at most `policy.max_attempts`
/// status checks after the initial one. Returns `Readiness::Cancelled` as soon
/// as `cancel` is set.
pub fn ensure_ready<B: EdgeAgentBackend + ?Sized>(
    backend: &mut B,
    model: &str,
    policy: PollPolicy,
    cancel: &AtomicBool,
) -> Result<Readiness, EdgeAgentError> {
    if cancel.load(Ordering::SeqCst) {
        return Ok(Readiness::Cancelled);
    }

    let description = describe(backend, model)?;
    let status = description.status;
    info!("Model {model} has status: {status}");

    match status {
        ModelStatus::Running => return Ok(Readiness::Ready),
        ModelStatus::Failed => return Ok(failed(description)),
        ModelStatus::Unknown(_) => {
            warn!("Model {model} reported an unrecognized status");
            return Ok(Readiness::Indeterminate(status));
        }
        ModelStatus::Stopped | ModelStatus::Stopping => {
            info!("Starting model {model}");
            let reported = retry_once("StartModel", || backend.start_model(model))?;
            info!("StartModel acknowledged with status: {reported}");
        }
        ModelStatus::Starting => {
            info!("Model {model} is already starting");
        }
    }

    let mut last = status;
    for attempt in 1..=policy.max_attempts {
        if cancel.load(Ordering::SeqCst) {
            info!("Cancelled while waiting for model {model}");
            return Ok(Readiness::Cancelled);
        }

        let description = describe(backend, model)?;
        last = description.status;
        info!(
            "Model {model} has status: {last} (check {attempt}/{})",
            policy.max_attempts
        );
        match last {
            ModelStatus::Running => return Ok(Readiness::Ready),
            ModelStatus::Failed => return Ok(failed(description)),
            _ => {}
        }

        if attempt < policy.max_attempts && sleep_unless_cancelled(policy.interval, cancel) {
            info!("Cancelled while waiting for model {model}");
            return Ok(Readiness::Cancelled);
        }
    }

    warn!(
        "Model {model} not running after {} checks (last status: {last})",
        policy.max_attempts
    );
    Ok(Readiness::TimedOut {
        last,
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAgent;

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_attempts,
        }
    }

    #[test]
    fn running_model_needs_one_check() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &not_cancelled()).unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(agent.describe_calls, 1);
        assert_eq!(agent.start_calls, 0);
    }

    #[test]
    fn failed_model_is_not_started() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Failed]);
        agent.status_message = "weights missing".to_string();
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &not_cancelled()).unwrap();

        assert_eq!(
            readiness,
            Readiness::Failed {
                message: "weights missing".to_string()
            }
        );
        assert_eq!(agent.describe_calls, 1);
        assert_eq!(agent.start_calls, 0);
    }

    #[test]
    fn stopped_model_is_started_once_and_polled_until_running() {
        let mut agent = MockAgent::with_statuses([
            ModelStatus::Stopped,
            ModelStatus::Starting,
            ModelStatus::Starting,
            ModelStatus::Running,
        ]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &not_cancelled()).unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(agent.start_calls, 1);
        assert_eq!(agent.describe_calls, 4);
    }

    #[test]
    fn stopping_model_is_started_once_even_if_seen_again() {
        let mut agent = MockAgent::with_statuses([
            ModelStatus::Stopping,
            ModelStatus::Stopping,
            ModelStatus::Stopped,
            ModelStatus::Running,
        ]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &not_cancelled()).unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(agent.start_calls, 1);
    }

    #[test]
    fn budget_exhaustion_times_out_without_error() {
        // The mock keeps repeating its last status.
        let mut agent = MockAgent::with_statuses([ModelStatus::Stopped, ModelStatus::Starting]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &not_cancelled()).unwrap();

        assert_eq!(
            readiness,
            Readiness::TimedOut {
                last: ModelStatus::Starting,
                attempts: 10
            }
        );
        assert_eq!(agent.start_calls, 1);
        assert_eq!(agent.describe_calls, 1 + 10);
    }

    #[test]
    fn starting_model_is_polled_without_start() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Starting, ModelStatus::Running]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(3), &not_cancelled()).unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(agent.start_calls, 0);
    }

    #[test]
    fn unknown_status_is_indeterminate() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Unknown(9)]);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(3), &not_cancelled()).unwrap();

        assert_eq!(readiness, Readiness::Indeterminate(ModelStatus::Unknown(9)));
        assert_eq!(agent.start_calls, 0);
    }

    #[test]
    fn policy_decides_on_timeout() {
        let timed_out = Readiness::TimedOut {
            last: ModelStatus::Starting,
            attempts: 10,
        };
        assert!(timed_out.enforce("m1", NotReadyPolicy::Proceed).is_ok());
        assert!(matches!(
            timed_out.enforce("m1", NotReadyPolicy::Abort),
            Err(EdgeAgentError::ModelNotReady {
                status: ModelStatus::Starting,
                ..
            })
        ));
        assert!(Readiness::Ready.enforce("m1", NotReadyPolicy::Abort).is_ok());
    }

    #[test]
    fn cancelled_before_first_check_makes_no_calls() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Stopped]);
        let cancel = AtomicBool::new(true);
        let readiness = ensure_ready(&mut agent, "m1", fast_policy(10), &cancel).unwrap();

        assert_eq!(readiness, Readiness::Cancelled);
        assert_eq!(agent.total_calls(), 0);
        assert!(readiness.enforce("m1", NotReadyPolicy::Abort).is_ok());
    }

    #[test]
    fn cancel_interrupts_the_wait_between_checks() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Stopped, ModelStatus::Starting]);
        let cancel = AtomicBool::new(false);
        let policy = PollPolicy {
            interval: Duration::from_secs(60),
            max_attempts: 10,
        };
        let started = Instant::now();

        let readiness = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                cancel.store(true, Ordering::SeqCst);
            });
            ensure_ready(&mut agent, "m1", policy, &cancel).unwrap()
        });

        assert_eq!(readiness, Readiness::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(agent.start_calls, 1);
        assert_eq!(agent.describe_calls, 2);
    }
}
