pub mod machines;
pub mod management;
pub mod validation;

use axum::Router;
use axum::middleware;
use axum::routing::post;

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Single machines
        .route(
            "/machines",
            post(machines::start_machine).get(machines::list_machines),
        )
        .route("/machines/stop", post(machines::stop_machine))
        // Management fleet
        .route(
            "/management",
            post(management::start_fleet).get(management::list_fleet),
        )
        .route("/management/stop", post(management::stop_fleet))
        // Pre-flight validation
        .route("/validate", post(validation::validate_config))
        // Auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
