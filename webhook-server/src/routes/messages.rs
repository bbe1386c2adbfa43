use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Extension;
use serde::Deserialize;
use webhook_core::management::BulkRetryRequest;
use webhook_core::types::{MessageSearchFilters, MessageStatus, Page};

use crate::app::AppState;
use crate::auth::{check_scope, AuthContext};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub webhook_config_id: Option<String>,
    pub status: Option<MessageStatus>,
    pub created_after: Option<f64>,
    pub created_before: Option<f64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkRetryBody {
    #[serde(default)]
    pub message_ids: Option<Vec<String>>,
    #[serde(default)]
    pub time_range_hours: Option<f64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub destination_url: Option<String>,
}

pub async fn get_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "messages:read") {
        return Err(AppError::Forbidden);
    }

    let message = state.management.get_message(&id).await?;
    Ok(axum::Json(message))
}

pub async fn search_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "messages:read") {
        return Err(AppError::Forbidden);
    }

    let filters = MessageSearchFilters {
        webhook_config_id: query.webhook_config_id,
        status: query.status,
        created_after: query.created_after,
        created_before: query.created_before,
    };
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };

    let messages = state.management.search_messages(&filters, page).await?;
    Ok(axum::Json(messages))
}

pub async fn cancel_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "messages:manage") {
        return Err(AppError::Forbidden);
    }

    let cancelled = state.management.cancel_message(&id).await?;
    if cancelled {
        Ok((StatusCode::OK, axum::Json(serde_json::json!({ "cancelled": true }))))
    } else {
        Ok((StatusCode::CONFLICT, axum::Json(serde_json::json!({ "cancelled": false }))))
    }
}

pub async fn retry_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "messages:manage") {
        return Err(AppError::Forbidden);
    }

    state.management.retry_message(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn bulk_retry_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    axum::Json(body): axum::Json<BulkRetryBody>,
) -> Result<impl IntoResponse, AppError> {
    if !check_scope(&auth, "messages:manage") {
        return Err(AppError::Forbidden);
    }

    let request = BulkRetryRequest {
        message_ids: body.message_ids,
        time_range_hours: body.time_range_hours,
        limit: body.limit,
        destination_url: body.destination_url,
    };
    let retried = state.management.bulk_retry_messages(&request).await;
    Ok(axum::Json(serde_json::json!({ "retried": retried })))
}
