//! Prometheus-backed metrics registry.

use crate::error::{ConfigError, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Registry holding the endpoint's collectors.
///
/// Cheap to clone; clones share the same collectors. Other components may
/// register their own collectors through [`registry`](Self::registry) and they
/// are exported by the exposition handler as well.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    build_info: IntGaugeVec,
    config_changes_total: IntCounter,
    handler_builds_total: IntCounterVec,
}

/// Point-in-time view of the bookkeeping counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Configuration changes that altered the endpoint's state.
    pub config_changes_total: u64,
    /// Exposition handlers built successfully.
    pub handler_builds_succeeded: u64,
    /// Exposition handler builds that failed.
    pub handler_builds_failed: u64,
}

impl Metrics {
    /// Create a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let build_info = IntGaugeVec::new(
            Opts::new("build_info", "Build information for the running service"),
            &["service", "version", "hostname"],
        )?;
        let config_changes_total = IntCounter::with_opts(Opts::new(
            "config_changes_total",
            "Configuration changes that altered build info or the metrics handler",
        ))?;
        let handler_builds_total = IntCounterVec::new(
            Opts::new(
                "metrics_handler_builds_total",
                "Metrics exposition handler builds by result",
            ),
            &["result"],
        )?;

        registry.register(Box::new(build_info.clone()))?;
        registry.register(Box::new(config_changes_total.clone()))?;
        registry.register(Box::new(handler_builds_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                build_info,
                config_changes_total,
                handler_builds_total,
            }),
        })
    }

    /// The underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Replace the build info series with one for `service` on `hostname`.
    pub fn set_build_info(&self, service: &str, hostname: &str) {
        self.inner.build_info.reset();
        self.inner
            .build_info
            .with_label_values(&[service, VERSION, hostname])
            .set(1);
    }

    pub(crate) fn inc_config_change(&self) {
        self.inner.config_changes_total.inc();
    }

    pub(crate) fn inc_handler_build(&self, succeeded: bool) {
        let result = if succeeded { "success" } else { "failure" };
        self.inner
            .handler_builds_total
            .with_label_values(&[result])
            .inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|_| ConfigError::Other("metrics output was not valid UTF-8".to_string()))
    }

    /// Take a snapshot of the bookkeeping counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let builds = &self.inner.handler_builds_total;
        MetricsSnapshot {
            config_changes_total: self.inner.config_changes_total.get(),
            handler_builds_succeeded: builds.with_label_values(&["success"]).get(),
            handler_builds_failed: builds.with_label_values(&["failure"]).get(),
        }
    }
}
