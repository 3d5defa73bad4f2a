//! CORS and fallback-route handling.

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// A small, explicit allow-list instead of a wildcard origin, generalized
/// from a single host/port pair the same way a dev server computes its own
/// origin plus its dev-port sibling.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    pub fn new(host: &str, port: u16) -> Self {
        let mut origins = vec![format!("http://{host}:{port}")];
        if host == "127.0.0.1" || host == "localhost" {
            origins.push(format!("http://localhost:{port}"));
            origins.push(format!("http://127.0.0.1:{port}"));
        }
        Self { origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

pub async fn handle_404() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_host_also_allows_127_0_0_1() {
        let allowed = AllowedOrigins::new("localhost", 8080);
        assert!(allowed.is_allowed("http://127.0.0.1:8080"));
        assert!(allowed.is_allowed("http://localhost:8080"));
    }

    #[test]
    fn unrelated_origin_rejected() {
        let allowed = AllowedOrigins::new("127.0.0.1", 8080);
        assert!(!allowed.is_allowed("http://evil.example:8080"));
    }
}
