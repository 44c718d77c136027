//! Exposition handlers and the factory that builds them.

use crate::error::{ConfigError, Result};
use crate::metrics::Metrics;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";
const UPSTREAM_METRICS_PATH: &str = "/stats/prometheus";
const INSTALLATION_ID_LABEL: &str = "installation_id";

/// An HTTP handler serving metrics.
#[async_trait]
pub trait MetricsHandler: Send + Sync {
    /// Answer one request.
    async fn serve(&self, request: Request<Body>) -> Response<Body>;
}

/// Builds exposition handlers for the endpoint.
///
/// Called with the endpoint's state lock held, so construction blocks
/// request serving until it returns.
pub trait HandlerFactory: Send + Sync {
    /// Build a handler for `installation_id`, optionally merging metrics
    /// scraped from the upstream admin endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler cannot be constructed.
    fn build(
        &self,
        upstream_admin_url: Option<&str>,
        installation_id: &str,
    ) -> Result<Arc<dyn MetricsHandler>>;
}

/// Plain 404 response.
pub fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

pub(crate) fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Factory for [`PrometheusHandler`]s.
pub struct PrometheusHandlerFactory {
    metrics: Metrics,
    scrape_timeout: Duration,
}

impl PrometheusHandlerFactory {
    /// Create a factory exporting `metrics`.
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            scrape_timeout: Duration::from_secs(5),
        }
    }

    /// Set the timeout for upstream scrapes (default: 5s).
    pub fn with_scrape_timeout(mut self, timeout: Duration) -> Self {
        self.scrape_timeout = timeout;
        self
    }
}

impl HandlerFactory for PrometheusHandlerFactory {
    fn build(
        &self,
        upstream_admin_url: Option<&str>,
        installation_id: &str,
    ) -> Result<Arc<dyn MetricsHandler>> {
        let handler = PrometheusHandler::new(
            self.metrics.clone(),
            upstream_admin_url,
            installation_id,
            self.scrape_timeout,
        )?;
        Ok(Arc::new(handler))
    }
}

struct Upstream {
    client: reqwest::Client,
    url: reqwest::Url,
}

/// Serves the local registry, plus the upstream admin endpoint's metrics when
/// one is configured, in the Prometheus text format.
///
/// Every sample is labelled with the installation id when it is non-empty.
/// A failed upstream scrape is logged and the local metrics are still served.
pub struct PrometheusHandler {
    metrics: Metrics,
    upstream: Option<Upstream>,
    installation_id: String,
}

impl PrometheusHandler {
    /// Create a handler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HandlerError`] if the upstream URL is not an
    /// absolute http(s) URL or the HTTP client cannot be built.
    pub fn new(
        metrics: Metrics,
        upstream_admin_url: Option<&str>,
        installation_id: &str,
        scrape_timeout: Duration,
    ) -> Result<Self> {
        let upstream = match upstream_admin_url {
            None => None,
            Some(raw) => {
                let base = reqwest::Url::parse(raw).map_err(|e| {
                    ConfigError::HandlerError(format!("invalid upstream admin url {}: {}", raw, e))
                })?;
                if !matches!(base.scheme(), "http" | "https") {
                    return Err(ConfigError::HandlerError(format!(
                        "unsupported upstream admin url scheme: {}",
                        base.scheme()
                    )));
                }
                let url = base.join(UPSTREAM_METRICS_PATH).map_err(|e| {
                    ConfigError::HandlerError(format!("invalid upstream admin url {}: {}", raw, e))
                })?;
                let client = reqwest::Client::builder()
                    .timeout(scrape_timeout)
                    .build()
                    .map_err(|e| {
                        ConfigError::HandlerError(format!("failed to build http client: {}", e))
                    })?;
                Some(Upstream { client, url })
            }
        };

        Ok(Self {
            metrics,
            upstream,
            installation_id: installation_id.to_string(),
        })
    }

    async fn scrape(upstream: &Upstream) -> reqwest::Result<String> {
        upstream
            .client
            .get(upstream.url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl MetricsHandler for PrometheusHandler {
    async fn serve(&self, request: Request<Body>) -> Response<Body> {
        if request.method() != Method::GET && request.method() != Method::HEAD {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let mut text = match self.metrics.render() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "metrics: failed to render registry");
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error\n");
            }
        };

        if let Some(upstream) = &self.upstream {
            match Self::scrape(upstream).await {
                Ok(scraped) => text.push_str(&scraped),
                Err(err) => {
                    tracing::warn!(error = %err, url = %upstream.url, "metrics: upstream scrape failed")
                }
            }
        }

        let label = (!self.installation_id.is_empty())
            .then_some((INSTALLATION_ID_LABEL, self.installation_id.as_str()));
        let body = relabel(&text, label);

        let mut response = Response::new(Body::from(body));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));
        response
    }
}

/// Normalize exposition text to newline-terminated lines, adding `label` to
/// every sample that does not already carry it.
pub(crate) fn relabel(text: &str, label: Option<(&str, &str)>) -> String {
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        match label {
            Some((name, value)) if !line.is_empty() && !line.starts_with('#') => {
                add_label(&mut out, line, name, value)
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }

    out
}

fn add_label(out: &mut String, line: &str, name: &str, value: &str) {
    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
        .unwrap_or(line.len());
    let (metric, rest) = line.split_at(name_end);
    let pair = format!("{}=\"{}\"", name, escape_label_value(value));

    out.push_str(metric);
    match rest.strip_prefix('{') {
        Some(labels) if has_label(labels, name) => {
            out.push_str(rest);
        }
        Some(labels) if labels.starts_with('}') => {
            out.push('{');
            out.push_str(&pair);
            out.push_str(labels);
        }
        Some(labels) => {
            out.push('{');
            out.push_str(&pair);
            out.push(',');
            out.push_str(labels);
        }
        None => {
            out.push('{');
            out.push_str(&pair);
            out.push('}');
            out.push_str(rest);
        }
    }
}

/// Whether the label block following `{` names `name`. Values are skipped
/// whole, honouring escapes, so only label names are compared.
fn has_label(block: &str, name: &str) -> bool {
    let mut rest = block;
    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() || rest.starts_with('}') {
            return false;
        }
        let Some(eq) = rest.find('=') else {
            return false;
        };
        if rest[..eq].trim() == name {
            return true;
        }

        let Some(value) = rest[eq + 1..].trim_start().strip_prefix('"') else {
            return false;
        };
        let mut escaped = false;
        let mut close = None;
        for (i, c) in value.char_indices() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    close = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return false;
        };
        rest = &value[close + 1..];
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get() -> Request<Body> {
        Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_relabel_samples() {
        let text = "# HELP up Up\n# TYPE up gauge\nup 1\nreqs{code=\"200\"} 5\nempty{} 0";
        let out = relabel(text, Some(("installation_id", "abc")));
        assert_eq!(
            out,
            "# HELP up Up\n# TYPE up gauge\nup{installation_id=\"abc\"} 1\n\
             reqs{installation_id=\"abc\",code=\"200\"} 5\nempty{installation_id=\"abc\"} 0\n"
        );
    }

    #[test]
    fn test_relabel_keeps_existing_label() {
        let text = "up{installation_id=\"other\"} 1\nreqs{code=\"200\", installation_id=\"x\"} 2\n";
        assert_eq!(relabel(text, Some(("installation_id", "abc"))), text);

        // the name only appears inside another label's name or a value
        let text = "envoy_up{envoy_installation_id=\"x\"} 1\n\
                    req{path=\"/installation_id=1\"} 2\n\
                    esc{q=\"a\\\",installation_id=\\\"b\"} 3\n";
        assert_eq!(
            relabel(text, Some(("installation_id", "abc"))),
            "envoy_up{installation_id=\"abc\",envoy_installation_id=\"x\"} 1\n\
             req{installation_id=\"abc\",path=\"/installation_id=1\"} 2\n\
             esc{installation_id=\"abc\",q=\"a\\\",installation_id=\\\"b\"} 3\n"
        );
    }

    #[test]
    fn test_relabel_escapes_value() {
        let out = relabel("up 1", Some(("installation_id", "a\"b\\c")));
        assert_eq!(out, "up{installation_id=\"a\\\"b\\\\c\"} 1\n");
    }

    #[test]
    fn test_relabel_without_label_normalizes() {
        assert_eq!(relabel("up 1", None), "up 1\n");
    }

    #[test]
    fn test_invalid_upstream_url() {
        let metrics = Metrics::new().unwrap();
        let factory = PrometheusHandlerFactory::new(metrics);
        assert!(matches!(
            factory.build(Some("not a url"), "abc"),
            Err(ConfigError::HandlerError(_))
        ));
        assert!(matches!(
            factory.build(Some("ftp://127.0.0.1:9901"), "abc"),
            Err(ConfigError::HandlerError(_))
        ));
    }

    #[tokio::test]
    async fn test_serves_local_registry_with_installation_id() {
        let metrics = Metrics::new().unwrap();
        metrics.set_build_info("plane", "host-a");
        let handler = PrometheusHandlerFactory::new(metrics)
            .build(None, "install-1")
            .unwrap();

        let response = handler.serve(get()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_FORMAT);

        let body = body_text(response).await;
        let build_info = body
            .lines()
            .find(|line| line.starts_with("build_info{"))
            .unwrap();
        assert!(build_info.starts_with("build_info{installation_id=\"install-1\","));
        assert!(build_info.contains("hostname=\"host-a\""));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_still_serves_local() {
        let metrics = Metrics::new().unwrap();
        let handler = PrometheusHandlerFactory::new(metrics)
            .with_scrape_timeout(Duration::from_millis(500))
            .build(Some("http://127.0.0.1:1"), "")
            .unwrap();

        let response = handler.serve(get()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("config_changes_total 0"));
    }

    #[tokio::test]
    async fn test_rejects_other_methods() {
        let handler = PrometheusHandlerFactory::new(Metrics::new().unwrap())
            .build(None, "")
            .unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = handler.serve(request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "404 page not found\n");
    }
}
