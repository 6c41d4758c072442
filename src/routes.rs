use crate::handlers::{self, AppState};
use crate::middleware::security_headers;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// HTTP routes. Serve with `into_make_service_with_connect_info::<SocketAddr>()`
/// so rate limiting sees the peer address.
///
/// `/create` reads its body through `handlers::read_capped`, which is the only
/// size limit on uploads.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/create", post(handlers::create_paste))
        .route("/:id", get(handlers::get_paste))
        .route("/api/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .layer(axum::middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
