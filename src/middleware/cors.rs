use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Cross-origin access for the admin console; download names stay readable.
pub fn admin_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_DISPOSITION])
        .allow_origin(Any)
}
