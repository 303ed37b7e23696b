//! Web application router and middleware setup.

use crate::relay::RelayController;
use crate::web::config::WebConfig;
use crate::web::handlers::{self, AppState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, controller: Arc<RelayController>) -> Router {
    let state = Arc::new(AppState { controller });

    let mut app = Router::new()
        .route("/", get(handlers::index))
        // Relay routes
        .route("/status/:relay", get(handlers::relay_status))
        .route("/toggle/:relay", get(handlers::relay_toggle))
        .route("/on/:relay", get(handlers::relay_on))
        .route("/off/:relay", get(handlers::relay_off))
        .route("/all_on", get(handlers::all_on))
        .route("/all_on/", get(handlers::all_on))
        .route("/all_off", get(handlers::all_off))
        .route("/all_off/", get(handlers::all_off))
        // API routes
        .route("/api/relays", get(handlers::list_relays))
        .route("/api/health", get(handlers::health_check))
        .fallback(handlers::not_found)
        .with_state(state);

    // Add CORS if enabled
    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
