//! Security response headers.
//!
//! # Responsibilities
//! - Attach HSTS, framing, sniffing, referrer, permissions and CSP headers
//!   to every response, including 429s and errors
//!
//! # Design Decisions
//! - Headers overwrite whatever a handler set
//! - Development CSP additionally allows `localhost:*` for connect-src

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Environment;

pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains";
pub const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=()";
pub const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

const CSP_PRODUCTION: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none';";
const CSP_DEVELOPMENT: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self' localhost:*; frame-ancestors 'none';";

pub fn content_security_policy(environment: Environment) -> &'static str {
    match environment {
        Environment::Production => CSP_PRODUCTION,
        Environment::Development => CSP_DEVELOPMENT,
    }
}

/// The full header set for an environment.
pub fn security_headers(environment: Environment) -> Vec<(HeaderName, HeaderValue)> {
    vec![
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static(REFERRER_POLICY),
        ),
        (
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        ),
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(content_security_policy(environment)),
        ),
    ]
}

/// Wrap a router so every response carries the security headers.
pub fn with_security_headers<S>(router: Router<S>, environment: Environment) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers(environment)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[test]
    fn test_csp_differs_by_environment() {
        assert!(content_security_policy(Environment::Development).contains("localhost:*"));
        assert!(!content_security_policy(Environment::Production).contains("localhost"));
    }

    #[tokio::test]
    async fn test_headers_on_every_response() {
        let app = with_security_headers(
            Router::new().route("/", get(|| async { "ok" })),
            Environment::Production,
        );

        for uri in ["/", "/missing"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let headers = response.headers();
            assert_eq!(headers["x-frame-options"], "DENY");
            assert_eq!(headers["x-content-type-options"], "nosniff");
            assert_eq!(headers["strict-transport-security"], STRICT_TRANSPORT_SECURITY);
            assert_eq!(headers["permissions-policy"], PERMISSIONS_POLICY);
            assert_eq!(headers["content-security-policy"], CSP_PRODUCTION);
        }
    }
}
