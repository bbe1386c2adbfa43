use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Extension;
use serde::Deserialize;
use webhook_core::types::{BackoffStrategy, WebhookConfig};

use crate::app::AppState;
use crate::auth::{check_scope, AuthContext};
use crate::error::AppError;

fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

// ─── Request bodies ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWebhookBody {
    pub name: String,
    pub target_url: String,
    pub secret: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub backoff_strategy: Option<BackoffStrategy>,
    #[serde(default)]
    pub initial_interval_s: Option<u64>,
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    #[serde(default)]
    pub max_interval_s: Option<u64>,
    #[serde(default)]
    pub max_age_s: Option<u64>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn register_webhook(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    axum::Json(body): axum::Json<RegisterWebhookBody>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "webhooks:manage") {
        return Err(AppError::Forbidden);
    }

    let now = now_ms();
    let config = WebhookConfig {
        id: ulid::Ulid::new().to_string(),
        name: body.name,
        target_url: body.target_url,
        secret: body.secret,
        active: body.active.unwrap_or(true),
        max_retries: body.max_retries.unwrap_or(5),
        backoff_strategy: body.backoff_strategy.unwrap_or(BackoffStrategy::Exponential),
        initial_interval_s: body.initial_interval_s.unwrap_or(1),
        backoff_factor: body.backoff_factor.unwrap_or(2.0),
        max_interval_s: body.max_interval_s.unwrap_or(3_600),
        max_age_s: body.max_age_s.unwrap_or(86_400),
        headers: body.headers,
        created_at: now,
        updated_at: now,
    };

    state.management.register_webhook(config.clone()).await?;
    Ok((StatusCode::CREATED, axum::Json(config)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveEventBody {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub deliver_immediately: Option<bool>,
}

pub async fn receive_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(name): Path<String>,
    axum::Json(body): axum::Json<ReceiveEventBody>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "webhooks:ingest") {
        return Err(AppError::Forbidden);
    }

    let raw_payload =
        serde_json::to_string(&body.payload).map_err(|e| AppError::BadRequest(e.to_string()))?;

    // `deliver_immediately` is accepted for envelope compatibility but synchronous
    // delivery to callers is out of scope; the message always flows through the
    // normal queued dispatch path.
    let _ = body.deliver_immediately;

    let message_id = state
        .ingestion
        .receive(&name, &raw_payload, body.headers, body.target_url)
        .await?;

    Ok((StatusCode::ACCEPTED, axum::Json(serde_json::json!({ "messageId": message_id }))))
}

pub async fn get_health(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "webhooks:read") {
        return Err(AppError::Forbidden);
    }

    let config = state.store.get_active_config_by_name(&name).await.map_err(|_| {
        webhook_core::error::DeliveryError::new(
            webhook_core::error::DeliveryErrorKind::ResourceNotFound,
            webhook_core::error::Phase::ResponseHandling,
        )
        .with_webhook(name.clone())
    })?;

    let stats = state.management.get_webhook_health(&config.id).await?;
    Ok(axum::Json(stats))
}
