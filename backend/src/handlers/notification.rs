//! HTTP handlers for notification settings endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{HistoryLimit, NotificationHistory};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::notification_settings::{
    CheckLowStockInput, LowStockCheckResult, NotificationSettingsService,
    NotificationSettingsView, TestNotificationInput, TestNotificationResult,
    UpdateNotificationSettingsInput,
};
use crate::AppState;

fn service(state: &AppState) -> NotificationSettingsService {
    NotificationSettingsService::new(state.db.clone(), state.channels.clone())
}

/// 206 when some channel failed
fn delivery_status(partial: bool) -> StatusCode {
    if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    }
}

// ============================================================================
// Notification Settings
// ============================================================================

/// Get the caller's notification settings
pub async fn get_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<NotificationSettingsView>> {
    let settings = service(&state).get_settings(current_user.0.user_id).await?;
    Ok(Json(settings))
}

/// Save the caller's notification settings
pub async fn update_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateNotificationSettingsInput>,
) -> AppResult<Json<NotificationSettingsView>> {
    let settings = service(&state)
        .update_settings(current_user.0.user_id, input)
        .await?;
    Ok(Json(settings))
}

/// Send a test notification
pub async fn send_test_notification(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TestNotificationInput>,
) -> AppResult<(StatusCode, Json<TestNotificationResult>)> {
    let result = service(&state)
        .send_test_notification(current_user.0.user_id, input)
        .await?;
    Ok((delivery_status(result.is_partial()), Json(result)))
}

// ============================================================================
// History
// ============================================================================

/// Query parameters for listing history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Get the caller's notification history
pub async fn get_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<NotificationHistory>>> {
    let history = service(&state)
        .get_history(current_user.0.user_id, HistoryLimit::from_query(query.limit))
        .await?;
    Ok(Json(history))
}

// ============================================================================
// Manual Low Stock Check
// ============================================================================

/// Check stock now and notify the caller
pub async fn check_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    input: Option<Json<CheckLowStockInput>>,
) -> AppResult<(StatusCode, Json<LowStockCheckResult>)> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let result = service(&state)
        .check_low_stock(current_user.0.user_id, input)
        .await?;
    Ok((delivery_status(result.is_partial()), Json(result)))
}
