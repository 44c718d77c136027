use crate::metrics::MetricsHandler;
use crate::metrics::handler::text_response;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

/// Wraps a handler so it only runs for requests carrying the expected
/// Basic credentials. Everything else gets `401 Unauthorized`.
pub struct RequireBasicAuth {
    inner: Arc<dyn MetricsHandler>,
    username: String,
    password: String,
}

impl RequireBasicAuth {
    /// Protect `inner` with `username` and `password`.
    pub fn new(
        inner: Arc<dyn MetricsHandler>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            username: username.into(),
            password: password.into(),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some((scheme, encoded)) = value.trim().split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Some(sep) = decoded.iter().position(|b| *b == b':') else {
            return false;
        };

        // Non-short-circuit so both halves are always compared.
        constant_time_eq(&decoded[..sep], self.username.as_bytes())
            & constant_time_eq(&decoded[sep + 1..], self.password.as_bytes())
    }
}

#[async_trait]
impl MetricsHandler for RequireBasicAuth {
    async fn serve(&self, request: Request<Body>) -> Response<Body> {
        if !self.authorized(request.headers()) {
            let mut response = text_response(StatusCode::UNAUTHORIZED, "Unauthorized\n");
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"metrics\""),
            );
            return response;
        }
        self.inner.serve(request).await
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
