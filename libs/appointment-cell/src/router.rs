use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::SharedStore;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::AppointmentState;
use crate::services::SlotLocks;

pub fn appointment_routes(config: Arc<AppConfig>, store: SharedStore) -> Router {
    let state = AppointmentState {
        config: config.clone(),
        store,
        locks: Arc::new(SlotLocks::new()),
    };

    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
