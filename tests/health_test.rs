use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mnemos::resilience::health::{
    HealthCheck, HealthMonitor, HealthProbe, HealthStatus, MonitorSettings,
};

struct Switch {
    up: AtomicBool,
    checks: AtomicUsize,
}

impl Switch {
    fn new(up: bool) -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(up),
            checks: AtomicUsize::new(0),
        })
    }

    fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for Switch {
    fn provider_name(&self) -> &str {
        "switch"
    }

    async fn health_check(&self) -> HealthCheck {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.up.load(Ordering::SeqCst) {
            HealthCheck::ok()
        } else {
            HealthCheck::failed("switched off")
        }
    }
}

fn settings(interval_ms: u64, failure_threshold: u32, window_size: usize) -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_millis(interval_ms),
        failure_threshold,
        window_size,
    }
}

#[tokio::test]
async fn new_monitor_is_healthy_with_full_uptime() {
    let monitor = HealthMonitor::new(Switch::new(true), settings(1000, 3, 10));
    let state = monitor.get_status();
    assert_eq!(state.status, HealthStatus::Healthy);
    assert_eq!(state.uptime_percent, 100.0);
    assert!(state.recent_checks.is_empty());
    assert!(state.last_checked_at.is_none());
    assert_eq!(state.provider_name, "switch");
}

#[tokio::test]
async fn failures_degrade_then_mark_unavailable() {
    let probe = Switch::new(false);
    let monitor = HealthMonitor::new(probe.clone(), settings(1000, 3, 10));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    monitor.on_transition(move |t| sink.lock().unwrap().push((t.from, t.to)));

    assert_eq!(monitor.check_now().await.status, HealthStatus::Degraded);
    assert_eq!(monitor.check_now().await.status, HealthStatus::Degraded);
    let state = monitor.check_now().await;
    assert_eq!(state.status, HealthStatus::Unavailable);
    assert_eq!(state.consecutive_failures, 3);
    // staying unavailable fires nothing
    monitor.check_now().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (HealthStatus::Healthy, HealthStatus::Degraded),
            (HealthStatus::Degraded, HealthStatus::Unavailable),
        ]
    );
    assert_eq!(probe.checks.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn one_success_restores_healthy() {
    let probe = Switch::new(false);
    let monitor = HealthMonitor::new(probe.clone(), settings(1000, 2, 10));
    monitor.check_now().await;
    monitor.check_now().await;
    assert_eq!(monitor.get_status().status, HealthStatus::Unavailable);

    probe.set(true);
    let state = monitor.check_now().await;
    assert_eq!(state.status, HealthStatus::Healthy);
    assert_eq!(state.consecutive_failures, 0);
}

#[tokio::test]
async fn uptime_covers_only_the_window() {
    let probe = Switch::new(false);
    let monitor = HealthMonitor::new(probe.clone(), settings(1000, 10, 4));
    monitor.check_now().await;
    monitor.check_now().await;
    probe.set(true);
    monitor.check_now().await;
    let state = monitor.check_now().await;
    assert_eq!(state.uptime_percent, 50.0);

    monitor.check_now().await;
    let state = monitor.check_now().await;
    assert_eq!(state.uptime_percent, 100.0);
    assert_eq!(state.recent_checks.len(), 4);
}

#[tokio::test]
async fn reported_failures_share_the_window_with_checks() {
    let monitor = HealthMonitor::new(Switch::new(true), settings(1000, 2, 10));
    monitor.check_now().await;
    monitor.report_failure("call failed");
    let state = monitor.report_failure("call failed again");

    assert_eq!(state.status, HealthStatus::Unavailable);
    assert_eq!(state.recent_checks.len(), 3);
    assert!((state.uptime_percent - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(
        state.recent_checks.last().unwrap().message.as_deref(),
        Some("call failed again")
    );

    assert_eq!(monitor.report_success().status, HealthStatus::Healthy);
}

#[tokio::test]
async fn periodic_checks_run_until_stopped() {
    let probe = Switch::new(false);
    let monitor = HealthMonitor::new(probe.clone(), settings(10, 2, 1000));

    monitor.start();
    assert!(monitor.is_running());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(monitor.get_status().status, HealthStatus::Unavailable);

    monitor.stop();
    assert!(!monitor.is_running());
    let after_stop = probe.checks.load(Ordering::SeqCst);
    assert!(after_stop >= 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.checks.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn reset_forgets_history() {
    let monitor = HealthMonitor::new(Switch::new(false), settings(1000, 1, 10));
    monitor.check_now().await;
    assert_eq!(monitor.get_status().status, HealthStatus::Unavailable);

    monitor.reset();
    let state = monitor.get_status();
    assert_eq!(state.status, HealthStatus::Healthy);
    assert!(state.recent_checks.is_empty());
}

#[tokio::test]
async fn zero_interval_still_runs_periodic_checks() {
    let probe = Switch::new(true);
    let monitor = HealthMonitor::new(probe.clone(), settings(0, 3, 10));

    monitor.start();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(monitor.is_running());
    assert!(probe.checks.load(Ordering::SeqCst) >= 1);
    monitor.stop();
}
