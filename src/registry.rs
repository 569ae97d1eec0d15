//! Registry of externally pushed battery readings.
//!
//! Phones, power banks and similar devices push their percentage over HTTP.
//! The registry keeps the latest value per source name and records which
//! source, or the local host battery, feeds the controller.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    error::{ControlError, Result},
    host_battery::HostBattery,
    models::{ActiveSource, SensorSource},
};

// ---

/// Names that collide with fixed routes under `/api/sources/`.
const RESERVED_NAMES: [&str; 1] = ["active"];

#[derive(Default)]
struct Inner {
    sources: HashMap<String, SensorSource>,
    active: ActiveSource,
}

pub struct SourceRegistry {
    inner: Mutex<Inner>,
    host: Arc<dyn HostBattery>,
}

pub(crate) fn validate_percentage(field: &str, value: f64) -> Result<()> {
    // ---
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ControlError::validation(format!(
            "{field} must be between 0 and 100, got {value}"
        )))
    }
}

impl SourceRegistry {
    // ---
    pub fn new(host: Arc<dyn HostBattery>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            host,
        }
    }

    pub fn host(&self) -> &Arc<dyn HostBattery> {
        &self.host
    }

    /// Insert or overwrite the reading for `name`, stamped with the current time.
    pub async fn upsert(&self, name: &str, percentage: f64, device_type: &str) -> Result<SensorSource> {
        // ---
        let name = name.trim();
        if name.is_empty() {
            return Err(ControlError::validation("source name must not be empty"));
        }
        if RESERVED_NAMES.contains(&name) {
            return Err(ControlError::validation(format!(
                "source name '{name}' is reserved"
            )));
        }
        validate_percentage("percentage", percentage)?;

        let device_type = match device_type.trim() {
            "" => "other",
            t => t,
        };
        let source = SensorSource {
            name: name.to_string(),
            percentage,
            device_type: device_type.to_string(),
            updated_at: Utc::now(),
        };

        self.inner
            .lock()
            .await
            .sources
            .insert(source.name.clone(), source.clone());
        Ok(source)
    }

    /// Remove a source. Falls back to the local battery if it was active.
    pub async fn remove(&self, name: &str) -> Result<SensorSource> {
        // ---
        let name = name.trim();
        let mut inner = self.inner.lock().await;
        let removed = inner
            .sources
            .remove(name)
            .ok_or_else(|| ControlError::not_found(format!("source '{name}' not found")))?;

        if inner.active.name() == Some(name) {
            inner.active = ActiveSource::Local;
            info!(source = name, "Active source removed, using local battery");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<SensorSource> {
        self.inner.lock().await.sources.values().cloned().collect()
    }

    /// `None` selects the local host battery.
    pub async fn set_active(&self, name: Option<&str>) -> Result<ActiveSource> {
        // ---
        let mut inner = self.inner.lock().await;
        let active = match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => ActiveSource::Local,
            Some(n) if inner.sources.contains_key(n) => ActiveSource::Named(n.to_string()),
            Some(n) => {
                return Err(ControlError::not_found(format!("source '{n}' not found")));
            }
        };

        inner.active = active.clone();
        Ok(active)
    }

    pub async fn active(&self) -> ActiveSource {
        self.inner.lock().await.active.clone()
    }

    /// The percentage the controller should act on right now.
    pub async fn resolve_active(&self) -> Result<f64> {
        // ---
        {
            let inner = self.inner.lock().await;
            if let ActiveSource::Named(name) = &inner.active {
                return inner
                    .sources
                    .get(name)
                    .map(|s| s.percentage)
                    .ok_or_else(|| ControlError::not_found(format!("source '{name}' not found")));
            }
        }

        self.host
            .read()
            .map(|b| b.percentage)
            .ok_or(ControlError::SensorUnavailable)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    // ---
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::models::LocalBattery;

    /// Host battery whose percentage the test sets directly.
    #[derive(Default)]
    pub(crate) struct FixedBattery {
        pub(crate) percentage: StdMutex<Option<f64>>,
    }

    impl FixedBattery {
        pub(crate) fn at(percentage: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                percentage: StdMutex::new(percentage),
            })
        }

        pub(crate) fn set(&self, percentage: Option<f64>) {
            *self.percentage.lock().unwrap() = percentage;
        }
    }

    impl HostBattery for FixedBattery {
        fn read(&self) -> Option<LocalBattery> {
            self.percentage.lock().unwrap().map(|percentage| LocalBattery {
                percentage,
                plugged_in: false,
                seconds_remaining: -1,
            })
        }

        fn health_percent(&self) -> Option<f64> {
            None
        }
    }

    fn registry(local: Option<f64>) -> SourceRegistry {
        SourceRegistry::new(FixedBattery::at(local))
    }

    #[tokio::test]
    async fn test_upsert_list_remove_round_trip() {
        // ---
        let reg = registry(None);
        reg.upsert("pixel", 42.0, "phone").await.unwrap();

        let listed = reg.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].percentage, 42.0);
        assert_eq!(listed[0].device_type, "phone");

        reg.remove("pixel").await.unwrap();
        assert!(reg.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_name() {
        // ---
        let reg = registry(None);
        let first = reg.upsert("bank", 10.0, "power_bank").await.unwrap();
        let second = reg.upsert("bank", 55.5, "power_bank").await.unwrap();

        let listed = reg.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].percentage, 55.5);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_input() {
        // ---
        let reg = registry(None);
        assert!(matches!(
            reg.upsert("", 50.0, "x").await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            reg.upsert("   ", 50.0, "x").await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            reg.upsert("a", 150.0, "x").await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            reg.upsert("a", -0.5, "x").await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            reg.upsert("a", f64::NAN, "x").await,
            Err(ControlError::Validation(_))
        ));
        assert!(reg.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_name_rejected() {
        // ---
        let reg = registry(None);
        assert!(matches!(
            reg.upsert(" active ", 40.0, "phone").await,
            Err(ControlError::Validation(_))
        ));
        assert!(reg.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_trims_name() {
        // ---
        let reg = registry(Some(70.0));
        reg.upsert("pixel", 42.0, "phone").await.unwrap();
        reg.set_active(Some("pixel")).await.unwrap();

        let removed = reg.remove("  pixel ").await.unwrap();
        assert_eq!(removed.name, "pixel");
        assert_eq!(reg.active().await, ActiveSource::Local);
    }

    #[tokio::test]
    async fn test_boundaries_are_inclusive() {
        // ---
        let reg = registry(None);
        assert!(reg.upsert("empty", 0.0, "phone").await.is_ok());
        assert!(reg.upsert("full", 100.0, "phone").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        // ---
        let reg = registry(None);
        assert!(matches!(
            reg.remove("ghost").await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_removing_active_source_falls_back_to_local() {
        // ---
        let reg = registry(Some(64.0));
        reg.upsert("tablet", 12.0, "tablet").await.unwrap();
        reg.set_active(Some("tablet")).await.unwrap();
        assert_eq!(reg.resolve_active().await.unwrap(), 12.0);

        reg.remove("tablet").await.unwrap();
        assert_eq!(reg.active().await, ActiveSource::Local);
        assert_eq!(reg.resolve_active().await.unwrap(), 64.0);
    }

    #[tokio::test]
    async fn test_removing_inactive_source_keeps_active() {
        // ---
        let reg = registry(None);
        reg.upsert("a", 1.0, "phone").await.unwrap();
        reg.upsert("b", 2.0, "phone").await.unwrap();
        reg.set_active(Some("a")).await.unwrap();

        reg.remove("b").await.unwrap();
        assert_eq!(reg.active().await, ActiveSource::Named("a".to_string()));
    }

    #[tokio::test]
    async fn test_set_active_requires_known_source() {
        // ---
        let reg = registry(None);
        assert!(matches!(
            reg.set_active(Some("nope")).await,
            Err(ControlError::NotFound(_))
        ));
        assert_eq!(reg.set_active(None).await.unwrap(), ActiveSource::Local);
    }

    #[tokio::test]
    async fn test_resolve_local_without_battery_is_unavailable() {
        // ---
        let reg = registry(None);
        assert!(matches!(
            reg.resolve_active().await,
            Err(ControlError::SensorUnavailable)
        ));
    }
}
