use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use core_types::status::{OverallStatus, ServiceStatusHandle, StatusGauge};
use engine_api::{
    Engine, EngineDescription, EngineError, EngineHealth, EngineResult, HealthStatus,
};
use log::{debug, error, info};
use parking_lot::Mutex;
use raffle_ledger::{LedgerError, ReservationLedger};

const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
/// Upper bound on how long `stop` waits for the worker to notice cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct ExpiryEngine {
    inner: Arc<ExpiryInner>,
}

#[derive(Clone, Debug)]
pub struct ExpiryEngineConfig {
    pub label: String,
    pub interval: Duration,
}

impl Default for ExpiryEngineConfig {
    fn default() -> Self {
        Self {
            label: "expiry".to_string(),
            interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

impl ExpiryEngine {
    pub fn new(
        config: ExpiryEngineConfig,
        ledger: Arc<ReservationLedger>,
        status: ServiceStatusHandle,
    ) -> Self {
        Self {
            inner: ExpiryInner::new(config, ledger, status),
        }
    }

    /// Runs one pass on the caller's thread. Returns how many holds expired.
    pub fn sweep_once(&self) -> Result<usize, LedgerError> {
        self.inner.sweep_pass()
    }

    pub fn expired_total(&self) -> u64 {
        self.inner.expired_total.load(Ordering::Relaxed)
    }
}

impl Engine for ExpiryEngine {
    fn start(&self) -> EngineResult<()> {
        ExpiryInner::start(&self.inner)
    }

    fn stop(&self) -> EngineResult<()> {
        self.inner.stop()
    }

    fn health(&self) -> EngineHealth {
        self.inner.health.lock().clone()
    }

    fn describe(&self) -> EngineDescription {
        EngineDescription {
            name: format!("{}-expiry", self.inner.config.label),
            notes: Some(format!(
                "expires held reservations past their deadline every {:?}",
                self.inner.config.interval
            )),
        }
    }
}

struct ExpiryInner {
    config: ExpiryEngineConfig,
    ledger: Arc<ReservationLedger>,
    status: ServiceStatusHandle,
    state: Mutex<EngineRuntimeState>,
    health: Mutex<EngineHealth>,
    expired_total: AtomicU64,
    passes: AtomicU64,
}

impl ExpiryInner {
    fn new(
        config: ExpiryEngineConfig,
        ledger: Arc<ReservationLedger>,
        status: ServiceStatusHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            ledger,
            status,
            state: Mutex::new(EngineRuntimeState::Stopped),
            health: Mutex::new(EngineHealth::new(HealthStatus::Stopped, None)),
            expired_total: AtomicU64::new(0),
            passes: AtomicU64::new(0),
        })
    }

    fn start(this: &Arc<Self>) -> EngineResult<()> {
        let mut guard = this.state.lock();
        if matches!(*guard, EngineRuntimeState::Running(_)) {
            return Err(EngineError::AlreadyRunning);
        }
        this.set_health(HealthStatus::Starting, None);
        let cancel = Arc::new(AtomicBool::new(false));
        let runner = Arc::clone(this);
        let cancel_clone = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("{}-expiry", this.config.label))
            .spawn(move || runner.run(cancel_clone))
            .map_err(|err| {
                this.set_health(HealthStatus::Failed, Some(err.to_string()));
                this.status.set_overall(OverallStatus::Crit);
                EngineError::Failure {
                    source: Box::new(err),
                }
            })?;
        info!(
            "[{}] expiry engine starting (interval {:?})",
            this.config.label, this.config.interval
        );
        *guard = EngineRuntimeState::Running(ThreadBundle { cancel, handle });
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let mut guard = self.state.lock();
        let Some(bundle) = guard.take_running() else {
            return Err(EngineError::NotRunning);
        };
        bundle.cancel.store(true, Ordering::Relaxed);
        if let Err(err) = bundle.handle.join() {
            // worker panicked
            error!("[{}] expiry join error: {:?}", self.config.label, err);
            self.set_health(
                HealthStatus::Failed,
                Some("expiry worker panicked".to_string()),
            );
            self.status.set_overall(OverallStatus::Crit);
            self.status.push_error("expiry worker panicked");
            return Ok(());
        }
        self.set_health(HealthStatus::Stopped, None);
        Ok(())
    }

    fn run(self: Arc<Self>, cancel: Arc<AtomicBool>) {
        self.set_health(HealthStatus::Ready, None);
        while !cancel.load(Ordering::Relaxed) {
            if let Err(err) = self.sweep_pass() {
                self.set_health(HealthStatus::Degraded, Some(err.to_string()));
                self.status.set_overall(OverallStatus::Crit);
                self.status.push_error(err.to_string());
                error!("[{}] expiry pass failed: {}", self.config.label, err);
            }
            self.sleep_unless_cancelled(&cancel);
        }
        self.set_health(HealthStatus::Stopped, None);
        info!("[{}] expiry engine stopped", self.config.label);
    }

    fn sweep_pass(&self) -> Result<usize, LedgerError> {
        let now = self.ledger.now();
        let expired = self.ledger.sweep_expired(now)?;
        let total = self
            .expired_total
            .fetch_add(expired as u64, Ordering::Relaxed)
            + expired as u64;
        let passes = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        if expired > 0 {
            info!("[{}] expired {expired} holds", self.config.label);
        } else {
            debug!("[{}] sweep pass {passes}: nothing to expire", self.config.label);
        }
        self.publish(expired, total, passes);
        Ok(expired)
    }

    fn publish(&self, last_pass: usize, total: u64, passes: u64) {
        let recovered = self.health.lock().status == HealthStatus::Degraded;
        if recovered {
            self.set_health(HealthStatus::Ready, None);
            self.status.clear_errors();
        }
        self.status.set_overall(OverallStatus::Ok);
        self.status.set_gauges(vec![
            StatusGauge::new("expired_total", total as f64),
            StatusGauge::new("last_pass_expired", last_pass as f64),
            StatusGauge::new("passes", passes as f64),
        ]);
    }

    fn sleep_unless_cancelled(&self, cancel: &AtomicBool) {
        let deadline = Instant::now() + self.config.interval;
        while !cancel.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    fn set_health(&self, status: HealthStatus, detail: Option<String>) {
        let mut guard = self.health.lock();
        guard.status = status;
        guard.detail = detail;
    }
}

enum EngineRuntimeState {
    Stopped,
    Running(ThreadBundle),
}

impl EngineRuntimeState {
    fn take_running(&mut self) -> Option<ThreadBundle> {
        match std::mem::replace(self, EngineRuntimeState::Stopped) {
            EngineRuntimeState::Running(bundle) => Some(bundle),
            EngineRuntimeState::Stopped => None,
        }
    }
}

struct ThreadBundle {
    cancel: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}
