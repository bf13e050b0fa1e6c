use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, SchedulingState};
use reminder_cell::{reminder_routes, ReminderState};

pub fn create_router(scheduling: Arc<SchedulingState>, reminders: Arc<ReminderState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic reminders API is running!" }))
        .nest("/appointments", appointment_routes(scheduling))
        .merge(reminder_routes(reminders))
}
