//! The reconfigurable endpoint itself.

use crate::core::{Config, ConfigSource, service_name};
use crate::metrics::handler::{HandlerFactory, MetricsHandler, PrometheusHandlerFactory, not_found};
use crate::metrics::hostname::{HostnameResolver, UNKNOWN_HOSTNAME, system_hostname};
use crate::metrics::{Metrics, RequireBasicAuth};
use crate::notify::SubscriptionHandle;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Base service name reported in build info unless overridden.
pub const DEFAULT_SERVICE_NAME: &str = "hotswap-plane";

/// Collaborators and static settings of a [`MetricsEndpoint`].
pub struct EndpointSettings {
    metrics: Metrics,
    factory: Arc<dyn HandlerFactory>,
    upstream_admin_url: Option<String>,
    base_service_name: String,
    hostname: HostnameResolver,
}

impl EndpointSettings {
    /// Settings exporting `metrics` through a [`PrometheusHandlerFactory`],
    /// with the system hostname and [`DEFAULT_SERVICE_NAME`].
    pub fn new(metrics: Metrics) -> Self {
        Self {
            factory: Arc::new(PrometheusHandlerFactory::new(metrics.clone())),
            metrics,
            upstream_admin_url: None,
            base_service_name: DEFAULT_SERVICE_NAME.to_string(),
            hostname: Arc::new(system_hostname),
        }
    }

    /// Use `factory` to build exposition handlers.
    pub fn with_factory(mut self, factory: Arc<dyn HandlerFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Merge metrics scraped from the upstream admin endpoint at `url`.
    pub fn with_upstream_admin_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_admin_url = Some(url.into());
        self
    }

    /// Set the base service name.
    pub fn with_base_service_name(mut self, name: impl Into<String>) -> Self {
        self.base_service_name = name.into();
        self
    }

    /// Use `resolver` instead of the system hostname lookup.
    pub fn with_hostname_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> std::io::Result<String> + Send + Sync + 'static,
    {
        self.hostname = Arc::new(resolver);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ServerKey {
    address: String,
    basic_auth: String,
    installation_id: String,
}

impl ServerKey {
    fn from_config(cfg: &Config) -> Self {
        Self {
            address: cfg.metrics_address.clone(),
            basic_auth: cfg.metrics_basic_auth.clone(),
            installation_id: cfg.installation_id.clone(),
        }
    }
}

#[derive(Default)]
struct EndpointState {
    service_name: Option<String>,
    key: ServerKey,
    handler: Option<Arc<dyn MetricsHandler>>,
    closed: bool,
}

/// A metrics endpoint that follows configuration changes.
///
/// On every change the endpoint recomputes the service name reported in
/// build info and, when the bind address, basic-auth credential or
/// installation id changed, rebuilds its exposition handler. Unchanged
/// inputs leave everything untouched, including the handler's identity.
///
/// Requests are served from a snapshot of the handler taken under a shared
/// lock, so each request sees either the previous or the new handler, never
/// a mix. Without a handler every request gets `404`.
///
/// The endpoint does not bind a socket. Mount [`router`](Self::router) on a
/// listener for the configured address.
///
/// # Examples
///
/// ```rust
/// use hotswap_plane::core::{Config, HotswapSource};
/// use hotswap_plane::metrics::{EndpointSettings, Metrics, MetricsEndpoint};
///
/// let source = HotswapSource::new(Config::default());
/// let endpoint = MetricsEndpoint::new(&source, EndpointSettings::new(Metrics::new().unwrap()));
/// assert!(!endpoint.is_serving());
///
/// source
///     .update(Config {
///         metrics_address: "127.0.0.1:9090".to_string(),
///         ..Config::default()
///     })
///     .unwrap();
/// assert!(endpoint.is_serving());
/// ```
pub struct MetricsEndpoint {
    state: RwLock<EndpointState>,
    settings: EndpointSettings,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl MetricsEndpoint {
    /// Create an endpoint bound to `source` and apply its current snapshot
    /// before returning.
    pub fn new<S>(source: &S, settings: EndpointSettings) -> Arc<Self>
    where
        S: ConfigSource + ?Sized,
    {
        let endpoint = Arc::new(Self {
            state: RwLock::new(EndpointState::default()),
            settings,
            subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&endpoint);
        let handle = source.on_config_change(Arc::new(move |cfg: &Config| {
            if let Some(endpoint) = weak.upgrade() {
                endpoint.on_config_change(cfg);
            }
        }));
        *endpoint.subscription.lock() = Some(handle);

        endpoint.on_config_change(&source.get_config());
        endpoint
    }

    /// Apply a configuration snapshot.
    ///
    /// Called by the source on every change. Safe to call directly; applying
    /// the same snapshot twice is a no-op, and `config_changes_total` only
    /// counts snapshots that changed build info or the handler. Ignored once
    /// the endpoint is [closed](Self::close).
    pub fn on_config_change(&self, cfg: &Config) {
        let mut state = self.state.write();
        if state.closed {
            return;
        }
        let info_changed = self.update_info(&mut state, cfg);
        let server_changed = self.update_server(&mut state, cfg);
        if info_changed || server_changed {
            self.settings.metrics.inc_config_change();
        }
    }

    fn update_info(&self, state: &mut EndpointState, cfg: &Config) -> bool {
        let service = service_name(&self.settings.base_service_name, &cfg.services);
        if state.service_name.as_deref() == Some(service.as_str()) {
            return false;
        }

        let hostname = (self.settings.hostname)().unwrap_or_else(|err| {
            tracing::error!(error = %err, "metrics: failed to get hostname");
            UNKNOWN_HOSTNAME.to_string()
        });
        self.settings.metrics.set_build_info(&service, &hostname);
        tracing::debug!(service = %service, hostname = %hostname, "metrics: build info updated");
        state.service_name = Some(service);
        true
    }

    fn update_server(&self, state: &mut EndpointState, cfg: &Config) -> bool {
        let key = ServerKey::from_config(cfg);
        if state.key == key {
            tracing::debug!("metrics: no changes detected");
            return false;
        }

        state.handler = None;
        state.key = key;

        if cfg.metrics_address.is_empty() {
            tracing::info!("metrics: http server disabled");
            return true;
        }

        let credentials = match cfg.metrics_basic_auth() {
            Ok(credentials) => credentials,
            // Fails closed: a credential we cannot parse must not expose
            // the handler without auth.
            Err(err) => {
                tracing::error!(error = %err, "metrics: invalid basic auth, serving disabled");
                return true;
            }
        };

        let handler = match self
            .settings
            .factory
            .build(self.settings.upstream_admin_url.as_deref(), &cfg.installation_id)
        {
            Ok(handler) => {
                self.settings.metrics.inc_handler_build(true);
                handler
            }
            Err(err) => {
                self.settings.metrics.inc_handler_build(false);
                tracing::error!(error = %err, "metrics: failed to create prometheus handler");
                return true;
            }
        };

        state.handler = Some(match credentials {
            Some((username, password)) => {
                Arc::new(RequireBasicAuth::new(handler, username, password))
            }
            None => handler,
        });
        tracing::info!(address = %cfg.metrics_address, "metrics: handler installed");
        true
    }

    /// Answer a request with the current handler, or `404` when serving is
    /// disabled.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let handler = self.state.read().handler.clone();
        match handler {
            Some(handler) => handler.serve(request).await,
            None => not_found(),
        }
    }

    /// Snapshot of the current handler.
    pub fn handler(&self) -> Option<Arc<dyn MetricsHandler>> {
        self.state.read().handler.clone()
    }

    /// Whether a handler is installed.
    pub fn is_serving(&self) -> bool {
        self.state.read().handler.is_some()
    }

    /// Service name last reported in build info.
    pub fn service_name(&self) -> Option<String> {
        self.state.read().service_name.clone()
    }

    /// Bind address from the last applied snapshot.
    pub fn address(&self) -> String {
        self.state.read().key.address.clone()
    }

    /// Stop following configuration changes. The current handler keeps
    /// serving.
    ///
    /// A notification already being delivered when this returns is ignored
    /// as well.
    pub fn close(&self) {
        self.state.write().closed = true;
        self.subscription.lock().take();
    }

    /// An [`axum::Router`] forwarding every request to [`serve`](Self::serve).
    pub fn router(self: &Arc<Self>) -> Router {
        let endpoint = Arc::clone(self);
        Router::new().fallback(move |request: Request<Body>| {
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.serve(request).await }
        })
    }
}
