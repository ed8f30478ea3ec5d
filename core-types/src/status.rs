use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Discrete health level exposed by each managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverallStatus {
    Ok,
    #[default]
    Warn,
    Crit,
}

/// Named numeric reading logged alongside a status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusGauge {
    pub label: String,
    pub value: f64,
    pub unit: Option<String>,
}

impl StatusGauge {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Mutable backing structure for a service status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

/// Immutable snapshot handed to the status logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub name: String,
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

impl ServiceStatusSnapshot {
    pub fn gauge(&self, label: &str) -> Option<f64> {
        self.gauges
            .iter()
            .find(|g| g.label == label)
            .map(|g| g.value)
    }
}

impl fmt::Display for ServiceStatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.name, self.overall)?;
        for gauge in &self.gauges {
            write!(f, " {}={}", gauge.label, gauge.value)?;
            if let Some(unit) = &gauge.unit {
                write!(f, "{unit}")?;
            }
        }
        if let Some(err) = self.errors.last() {
            write!(f, " last_error=\"{err}\"")?;
        }
        Ok(())
    }
}

/// Trait implemented by every long-running service to expose health.
pub trait ServiceStatusReporter: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn status(&self) -> ServiceStatusSnapshot;
}

/// Shared handle so services can mutate their own status safely.
#[derive(Clone, Debug)]
pub struct ServiceStatusHandle {
    name: &'static str,
    inner: Arc<RwLock<ServiceStatus>>,
}

impl ServiceStatusHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(ServiceStatus::default())),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.name
    }

    pub fn update<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ServiceStatus),
    {
        mutator(&mut self.inner.write());
    }

    pub fn set_overall(&self, status: OverallStatus) {
        self.update(|s| s.overall = status);
    }

    pub fn push_warning(&self, msg: impl Into<String>) {
        self.update(|s| s.warnings.push(msg.into()));
    }

    pub fn clear_warnings_matching(&self, predicate: impl Fn(&str) -> bool) {
        self.update(|s| s.warnings.retain(|w| !predicate(w)));
    }

    pub fn push_error(&self, msg: impl Into<String>) {
        self.update(|s| s.errors.push(msg.into()));
    }

    pub fn clear_errors(&self) {
        self.update(|s| s.errors.clear());
    }

    pub fn set_gauges(&self, gauges: Vec<StatusGauge>) {
        self.update(|s| s.gauges = gauges);
    }

    pub fn snapshot(&self) -> ServiceStatusSnapshot {
        let guard = self.inner.read();
        ServiceStatusSnapshot {
            name: self.name.to_string(),
            overall: guard.overall,
            warnings: guard.warnings.clone(),
            errors: guard.errors.clone(),
            gauges: guard.gauges.clone(),
        }
    }

    pub fn overall(&self) -> OverallStatus {
        self.inner.read().overall
    }
}

impl ServiceStatusReporter for ServiceStatusHandle {
    fn service_name(&self) -> &'static str {
        self.name
    }

    fn status(&self) -> ServiceStatusSnapshot {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_clones_share_state() {
        let handle = ServiceStatusHandle::new("expiry");
        assert_eq!(handle.overall(), OverallStatus::Warn);

        let writer = handle.clone();
        writer.set_overall(OverallStatus::Ok);
        writer.set_gauges(vec![
            StatusGauge::new("expired_total", 3.0),
            StatusGauge::new("interval", 5.0).with_unit("s"),
        ]);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.overall, OverallStatus::Ok);
        assert_eq!(snapshot.gauge("expired_total"), Some(3.0));
        assert_eq!(snapshot.gauge("missing"), None);
        assert_eq!(snapshot.to_string(), "expiry Ok expired_total=3 interval=5s");
    }

    #[test]
    fn errors_and_warnings_are_tracked() {
        let handle = ServiceStatusHandle::new("expiry");
        handle.push_warning("slow sweep");
        handle.push_warning("store retry");
        handle.push_error("disk full");
        handle.clear_warnings_matching(|w| w.starts_with("slow"));

        let snapshot = handle.status();
        assert_eq!(snapshot.warnings, vec!["store retry".to_string()]);
        assert!(snapshot.to_string().ends_with("last_error=\"disk full\""));

        handle.clear_errors();
        assert!(handle.snapshot().errors.is_empty());
    }
}
