use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_database::SharedStore;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::AvailabilityState;

pub fn availability_routes(config: Arc<AppConfig>, store: SharedStore) -> Router {
    let state = AvailabilityState {
        config: config.clone(),
        store,
    };

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}/schedule", get(handlers::get_weekly_schedule))
        .route("/{doctor_id}/exceptions", get(handlers::list_exceptions))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots))
        .route("/{doctor_id}/check", get(handlers::check_availability));

    // Protected routes (doctor owning the schedule, or admin)
    let protected_routes = Router::new()
        .route("/{doctor_id}/schedule", put(handlers::replace_weekly_schedule))
        .route("/{doctor_id}/exceptions", post(handlers::create_exception))
        .route("/exceptions/{exception_id}", delete(handlers::delete_exception))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
