use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::models::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/check", post(handlers::check_appointment))
        .route("/business-hours/{date}", get(handlers::get_business_hours))
        .with_state(state)
}
