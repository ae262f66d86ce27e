use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod publishers;
pub mod sources;
pub mod state;
pub mod stats;
pub mod wiring;

pub use state::AppState;

/// Monitoring surface: health, cycle history, summary and Prometheus metrics.
pub fn app(state: AppState) -> Router {
    // dashboards poll from other origins
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .merge(stats::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
