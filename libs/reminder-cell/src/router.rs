use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::{self, ReminderState};

/// The `/whatsapp/config` routes carry no authentication of their own and are
/// expected to be mounted behind the clinic's admin auth layer.
pub fn reminder_routes(state: Arc<ReminderState>) -> Router {
    Router::new()
        .route(
            "/whatsapp/webhook",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .route(
            "/whatsapp/config",
            get(handlers::get_config).put(handlers::update_config),
        )
        .route("/reminders/stats", get(handlers::get_stats))
        .with_state(state)
}
