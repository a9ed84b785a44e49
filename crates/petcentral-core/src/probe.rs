//! API availability polling.
//!
//! The dashboard only renders once the backend answers its health endpoint.
//! `AvailabilityProber` checks immediately, then every `interval` while the
//! API is down. Under the default policy it stops for good after the first
//! success; `ProbePolicy::Continuous` keeps checking so a later outage is
//! noticed.
//!
//! The prober owns exactly one background task. `stop()` and `Drop` abort it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Used when a zero interval is requested
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(5000);

/// Something that can answer "is the backend reachable right now".
pub trait HealthCheck: Send + Sync + 'static {
    fn check(&self) -> BoxFuture<'_, bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Checking,
    Available,
    Unavailable,
}

impl ProbeState {
    fn from_result(available: bool) -> Self {
        if available {
            ProbeState::Available
        } else {
            ProbeState::Unavailable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbePolicy {
    /// Poll while down, stop after the first success
    #[default]
    UntilAvailable,
    /// Poll forever at the fixed interval
    Continuous,
}

impl ProbePolicy {
    pub fn from_continuous(continuous: bool) -> Self {
        if continuous {
            ProbePolicy::Continuous
        } else {
            ProbePolicy::UntilAvailable
        }
    }
}

pub struct AvailabilityProber {
    check: Arc<dyn HealthCheck>,
    interval: Duration,
    policy: ProbePolicy,
    state: Arc<watch::Sender<ProbeState>>,
    attempts: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl AvailabilityProber {
    /// A zero `interval` falls back to `DEFAULT_PROBE_INTERVAL`.
    pub fn new(check: Arc<dyn HealthCheck>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(
                fallback_ms = DEFAULT_PROBE_INTERVAL.as_millis() as u64,
                "Probe interval must be non-zero, using default"
            );
            DEFAULT_PROBE_INTERVAL
        } else {
            interval
        };
        let (state, _) = watch::channel(ProbeState::Checking);
        Self {
            check,
            interval,
            policy: ProbePolicy::default(),
            state: Arc::new(state),
            attempts: Arc::new(AtomicU32::new(0)),
            task: None,
        }
    }

    pub fn with_policy(mut self, policy: ProbePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ProbeState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ProbeState> {
        self.state.subscribe()
    }

    /// Number of checks completed so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether a polling task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Check now, then keep checking on the interval.
    ///
    /// Does nothing if polling is already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.state.send_replace(ProbeState::Checking);

        let check = Arc::clone(&self.check);
        let state = Arc::clone(&self.state);
        let attempts = Arc::clone(&self.attempts);
        let interval = self.interval;
        let policy = self.policy;

        info!(interval_ms = interval.as_millis() as u64, ?policy, "Starting availability probe");

        self.task = Some(tokio::spawn(async move {
            // The first tick completes immediately
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let available = check.check().await;
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let next = ProbeState::from_result(available);
                let previous = state.send_replace(next);

                if next != previous {
                    match next {
                        ProbeState::Available => info!(attempt, "API is available"),
                        _ => warn!(attempt, "API is unavailable"),
                    }
                } else {
                    debug!(attempt, state = ?next, "Availability check");
                }

                if available && policy == ProbePolicy::UntilAvailable {
                    break;
                }
            }
        }));
    }

    /// Cancel any scheduled check. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Availability probe stopped");
        }
    }

    /// One out-of-band check, as behind a "Retry now" button.
    /// Does not disturb the polling schedule.
    pub async fn check_now(&self) -> ProbeState {
        let available = self.check.check().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = ProbeState::from_result(available);
        self.state.send_replace(next);
        next
    }
}

impl Drop for AvailabilityProber {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
