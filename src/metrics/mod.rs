//! Hot-swappable metrics exposition.
//!
//! [`MetricsEndpoint`] subscribes to a [`ConfigSource`](crate::core::ConfigSource)
//! and keeps an exposition handler in step with the configured bind address,
//! basic-auth credential and installation id. Requests are answered from an
//! atomic snapshot of the current handler, so a reconfiguration never
//! exposes a half-updated state.

mod auth;
mod endpoint;
mod handler;
mod hostname;
mod registry;

pub use auth::RequireBasicAuth;
pub use endpoint::{DEFAULT_SERVICE_NAME, EndpointSettings, MetricsEndpoint};
pub use handler::{
    HandlerFactory, MetricsHandler, PrometheusHandler, PrometheusHandlerFactory, not_found,
};
pub use hostname::{HostnameResolver, UNKNOWN_HOSTNAME, system_hostname};
pub use registry::{Metrics, MetricsSnapshot};
