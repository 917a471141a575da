use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler::{self, CounterHandler};

/// Build the axum router with all counter endpoints.
pub fn build_router(counter: CounterHandler) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(
            "/view-counter",
            get(handler::increment_get).post(handler::increment_post),
        )
        .route(
            "/api/view_counter",
            get(handler::increment_get).post(handler::increment_post),
        )
        .route("/api/counter", get(handler::current_handler))
        .route("/api/counter/increment", post(handler::increment_post))
        .route("/api/counter/reset", post(handler::reset_handler))
        .route("/v1/health", get(handler::health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(counter)
}
