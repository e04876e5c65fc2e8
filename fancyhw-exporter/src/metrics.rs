//! The four series published by the exporter.

use std::fmt;
use std::sync::Arc;

use fancyhw_common::Sample;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::config::PlaceholderValues;

/// State of the `app_health` enum metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// All states, in declaration order.
    pub const ALL: [HealthState; 2] = [HealthState::Healthy, HealthState::Unhealthy];

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl EncodeLabelValue for HealthState {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
        EncodeLabelValue::encode(&self.as_str(), encoder)
    }
}

/// Label set of the `app_health` family; the label carries the metric name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct HealthLabels {
    pub app_health: HealthState,
}

/// Metric instruments, created once and mutated in place.
///
/// Instruments are atomics, so a shared reference is enough both for the
/// poll loop and for scrapes.
#[derive(Debug)]
pub struct MetricSet {
    registry: Registry,
    gpu_utilization: Gauge,
    app_requests_pending: Gauge,
    app_uptime: Gauge,
    app_health: Family<HealthLabels, Gauge>,
    placeholders: PlaceholderValues,
}

/// Shareable metric set handle.
pub type SharedMetrics = Arc<MetricSet>;

impl MetricSet {
    pub fn new(placeholders: PlaceholderValues) -> Self {
        let mut registry = Registry::default();

        let gpu_utilization: Gauge = Gauge::default();
        registry.register("gpu_utilization", "GPU Utilization", gpu_utilization.clone());

        let app_requests_pending: Gauge = Gauge::default();
        registry.register(
            "app_requests_pending",
            "Pending requests",
            app_requests_pending.clone(),
        );

        let app_uptime: Gauge = Gauge::default();
        registry.register("app_uptime", "Uptime", app_uptime.clone());

        let app_health = Family::<HealthLabels, Gauge>::default();
        registry.register("app_health", "Health", app_health.clone());

        let metrics = Self {
            registry,
            gpu_utilization,
            app_requests_pending,
            app_uptime,
            app_health,
            placeholders,
        };
        // An enum starts in its first state.
        metrics.set_health(HealthState::Healthy);
        metrics
    }

    /// Write the result of one successful poll cycle.
    pub fn apply(&self, sample: Sample) {
        self.gpu_utilization.set(i64::from(sample));
        self.app_requests_pending.set(self.placeholders.requests_pending);
        self.app_uptime.set(self.placeholders.uptime);
        self.set_health(HealthState::Healthy);
    }

    /// Move `app_health` to `state`; every other state reads 0.
    pub fn set_health(&self, state: HealthState) {
        for candidate in HealthState::ALL {
            let value = i64::from(candidate == state);
            self.app_health
                .get_or_create(&HealthLabels {
                    app_health: candidate,
                })
                .set(value);
        }
    }

    pub fn gpu_utilization(&self) -> i64 {
        self.gpu_utilization.get()
    }

    pub fn requests_pending(&self) -> i64 {
        self.app_requests_pending.get()
    }

    pub fn uptime(&self) -> i64 {
        self.app_uptime.get()
    }

    pub fn health(&self) -> HealthState {
        // Every state is created in `new`, so get_or_create never adds a series here.
        HealthState::ALL
            .into_iter()
            .find(|state| {
                self.app_health
                    .get_or_create(&HealthLabels { app_health: *state })
                    .get()
                    == 1
            })
            .unwrap_or(HealthState::Unhealthy)
    }

    /// Render the registry in OpenMetrics text format.
    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut body = String::new();
        prometheus_client::encoding::text::encode(&mut body, &self.registry)?;
        Ok(body)
    }
}
