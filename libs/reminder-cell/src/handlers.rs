use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_database::MessagingConfigStore;
use shared_models::error::AppError;
use shared_models::{MessagingConfig, MessagingConfigUpdate};

use crate::error::ReminderError;

use crate::models::{WebhookPayload, WebhookVerifyQuery};
use crate::services::scheduler::{SchedulerStats, SchedulerStatsSnapshot};
use crate::services::tracker::DeliveryStatusTracker;
use crate::services::whatsapp::{verify_signature, verify_subscription};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub struct ReminderState {
    pub tracker: Arc<DeliveryStatusTracker>,
    pub messaging_config: Arc<dyn MessagingConfigStore>,
    pub stats: Arc<SchedulerStats>,
    /// When set, webhook deliveries must carry a valid signature.
    pub app_secret: Option<String>,
}

/// Subscription handshake from Meta.
#[axum::debug_handler]
pub async fn verify_webhook(
    State(state): State<Arc<ReminderState>>,
    Query(query): Query<WebhookVerifyQuery>,
) -> Result<String, AppError> {
    let config = state.messaging_config.get_messaging_config().await.map_err(|e| {
        warn!("Webhook verification without WhatsApp configuration: {}", e);
        ReminderError::Config("WhatsApp configuration unavailable".to_string())
    })?;

    match verify_subscription(
        &config,
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
    ) {
        Some(challenge) => {
            info!("WhatsApp webhook subscription verified");
            Ok(challenge)
        }
        None => Err(AppError::Forbidden("Webhook verification failed".to_string())),
    }
}

/// Status callbacks. Once the body is authentic and parses, the response is
/// 200 even when individual events fail, so the provider does not redeliver.
#[axum::debug_handler]
pub async fn receive_webhook(
    State(state): State<Arc<ReminderState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = &state.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_string()))?;

        if !verify_signature(secret, &body, signature) {
            return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let report = state.tracker.apply_payload(&payload).await;
    if report.failed > 0 {
        warn!("{} webhook event(s) could not be applied", report.failed);
    }

    Ok(Json(json!({ "status": "ok" })))
}

pub async fn get_stats(State(state): State<Arc<ReminderState>>) -> Json<SchedulerStatsSnapshot> {
    Json(state.stats.snapshot())
}

/// Current WhatsApp settings. Tokens are never serialized.
pub async fn get_config(
    State(state): State<Arc<ReminderState>>,
) -> Result<Json<MessagingConfig>, AppError> {
    let config = state
        .messaging_config
        .get_messaging_config()
        .await
        .map_err(ReminderError::from)?;
    Ok(Json(config))
}

/// Partial update of the WhatsApp settings. Empty tokens keep the stored ones.
#[axum::debug_handler]
pub async fn update_config(
    State(state): State<Arc<ReminderState>>,
    payload: Result<Json<MessagingConfigUpdate>, JsonRejection>,
) -> Result<Json<MessagingConfig>, AppError> {
    let Json(update) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let config = state
        .messaging_config
        .update_messaging_config(&update)
        .await
        .map_err(ReminderError::from)?;

    info!("WhatsApp configuration updated");
    Ok(Json(config))
}
