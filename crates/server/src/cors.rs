//! Cross-origin policy: listed origins are echoed back, anything else is
//! answered as if it came from the default origin.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, header, header::InvalidHeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allowed: Vec<HeaderValue>,
    default_origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allowed: &[String], default_origin: &str) -> Result<Self, InvalidHeaderValue> {
        let default_origin = HeaderValue::from_str(default_origin)?;
        let mut allowed = allowed
            .iter()
            .map(|origin| HeaderValue::from_str(origin.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        if !allowed.contains(&default_origin) {
            allowed.push(default_origin.clone());
        }

        Ok(Self {
            allowed,
            default_origin,
        })
    }

    /// Point an unlisted or missing `Origin` at the default origin.
    pub fn rewrite(&self, headers: &mut HeaderMap) {
        let listed = headers
            .get(header::ORIGIN)
            .is_some_and(|origin| self.allowed.contains(origin));

        if !listed {
            headers.insert(header::ORIGIN, self.default_origin.clone());
        }
    }

    pub fn layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(self.allowed.clone()))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    }
}

/// Middleware running [`CorsPolicy::rewrite`] ahead of the [`CorsLayer`].
pub async fn rewrite_origin(
    State(policy): State<Arc<CorsPolicy>>,
    mut request: Request,
    next: Next,
) -> Response {
    policy.rewrite(request.headers_mut());
    next.run(request).await
}
