//! Rolling health monitor for an external provider.
//!
//! State machine: `Healthy` → `Degraded` on the first failure, → `Unavailable`
//! once consecutive failures reach the threshold; any success returns to
//! `Healthy`. Uptime is the success percentage over the last `window_size`
//! observations. Registered callbacks fire once per state change, never on
//! a check that leaves the status as it was.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::HealthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unavailable => "unavailable",
        })
    }
}

/// Outcome of a provider's own health-check operation.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn ok() -> Self {
        Self {
            available: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: Some(message.into()),
        }
    }
}

/// Anything the monitor can poll.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn provider_name(&self) -> &str;
    async fn health_check(&self) -> HealthCheck;
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Read-only snapshot of a monitor's state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub provider_name: String,
    pub status: HealthStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub uptime_percent: f64,
    /// Oldest first.
    pub recent_checks: Vec<CheckRecord>,
}

#[derive(Debug, Clone)]
pub struct HealthTransition {
    pub provider_name: String,
    pub from: HealthStatus,
    pub to: HealthStatus,
    pub at: DateTime<Utc>,
    pub consecutive_failures: u32,
}

pub type TransitionCallback = Arc<dyn Fn(&HealthTransition) + Send + Sync>;

/// Shortest period the background task will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub failure_threshold: u32,
    pub window_size: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for MonitorSettings {
    fn from(config: &HealthConfig) -> Self {
        Self {
            interval: config.interval().max(Duration::from_secs(1)),
            failure_threshold: config.failure_threshold.max(1),
            window_size: config.window_size.max(1),
        }
    }
}

// ── Internal state ───────────────────────────────────────────────────────────

struct Tracker {
    status: HealthStatus,
    last_checked_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    history: VecDeque<CheckRecord>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            status: HealthStatus::Healthy,
            last_checked_at: None,
            consecutive_failures: 0,
            history: VecDeque::new(),
        }
    }

    fn uptime_percent(&self) -> f64 {
        if self.history.is_empty() {
            return 100.0;
        }
        let ok = self.history.iter().filter(|c| c.success).count();
        ok as f64 * 100.0 / self.history.len() as f64
    }
}

struct Inner {
    probe: Arc<dyn HealthProbe>,
    settings: MonitorSettings,
    tracker: Mutex<Tracker>,
    callbacks: Mutex<Vec<TransitionCallback>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    async fn run_check(&self) -> HealthState {
        let result = self.probe.health_check().await;
        self.record(result.available, result.message)
    }

    fn record(&self, success: bool, message: Option<String>) -> HealthState {
        let now = Utc::now();
        let (snapshot, transition) = {
            let mut t = lock(&self.tracker);
            t.history.push_back(CheckRecord {
                success,
                timestamp: now,
                message,
            });
            while t.history.len() > self.settings.window_size {
                t.history.pop_front();
            }
            t.last_checked_at = Some(now);

            let previous = t.status;
            if success {
                t.consecutive_failures = 0;
                t.status = HealthStatus::Healthy;
            } else {
                t.consecutive_failures += 1;
                t.status = if t.consecutive_failures >= self.settings.failure_threshold {
                    HealthStatus::Unavailable
                } else {
                    HealthStatus::Degraded
                };
            }

            let transition = (previous != t.status).then(|| HealthTransition {
                provider_name: self.probe.provider_name().to_string(),
                from: previous,
                to: t.status,
                at: now,
                consecutive_failures: t.consecutive_failures,
            });
            (self.snapshot(&t), transition)
        };

        if let Some(transition) = transition {
            tracing::info!(
                provider = %transition.provider_name,
                from = %transition.from,
                to = %transition.to,
                consecutive_failures = transition.consecutive_failures,
                "provider health changed"
            );
            // Clone out so callbacks may call back into the monitor.
            let callbacks: Vec<TransitionCallback> = lock(&self.callbacks).clone();
            for cb in callbacks {
                cb(&transition);
            }
        }

        snapshot
    }

    fn snapshot(&self, t: &Tracker) -> HealthState {
        HealthState {
            provider_name: self.probe.provider_name().to_string(),
            status: t.status,
            last_checked_at: t.last_checked_at,
            consecutive_failures: t.consecutive_failures,
            uptime_percent: t.uptime_percent(),
            recent_checks: t.history.iter().cloned().collect(),
        }
    }
}

// ── Public monitor ───────────────────────────────────────────────────────────

/// Periodic and on-demand health tracking for one provider.
///
/// Must be started from within a tokio runtime. Dropping the monitor stops
/// the periodic task.
pub struct HealthMonitor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, settings: MonitorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                settings,
                tracker: Mutex::new(Tracker::new()),
                callbacks: Mutex::new(Vec::new()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.inner.probe.provider_name()
    }

    /// Register a callback invoked once per status transition.
    pub fn on_transition(&self, callback: impl Fn(&HealthTransition) + Send + Sync + 'static) {
        lock(&self.inner.callbacks).push(Arc::new(callback));
    }

    /// Start periodic checks. The first check runs immediately. No-op if
    /// already running.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tracing::debug!(
            provider = %inner.probe.provider_name(),
            interval_ms = inner.settings.interval.as_millis() as u64,
            "health monitoring started"
        );
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.settings.interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.run_check().await;
            }
        }));
    }

    /// Halt periodic checks. History is kept.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
            tracing::debug!(provider = %self.provider_name(), "health monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Run one check now, updating the same state as the periodic loop.
    pub async fn check_now(&self) -> HealthState {
        self.inner.run_check().await
    }

    /// Record a failure observed outside the check loop (e.g. a failed call).
    pub fn report_failure(&self, message: impl Into<String>) -> HealthState {
        self.inner.record(false, Some(message.into()))
    }

    /// Record a success observed outside the check loop.
    pub fn report_success(&self) -> HealthState {
        self.inner.record(true, None)
    }

    pub fn get_status(&self) -> HealthState {
        let t = lock(&self.inner.tracker);
        self.inner.snapshot(&t)
    }

    /// Clear history and return to the initial `Healthy` state.
    pub fn reset(&self) {
        *lock(&self.inner.tracker) = Tracker::new();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
