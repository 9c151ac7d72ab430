//! HTTP handlers for site-wide channel settings

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::site_settings::{
    ChannelSettingsView, SiteSettingsService, UpdateChannelSettingsInput,
};
use crate::AppState;

/// Get WhatsApp and SMTP overrides
pub async fn get_channel_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ChannelSettingsView>> {
    let service = SiteSettingsService::new(state.db, state.site_settings);
    let settings = service.get_channel_settings(&current_user.0).await?;
    Ok(Json(settings))
}

/// Update WhatsApp and SMTP overrides
pub async fn update_channel_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateChannelSettingsInput>,
) -> AppResult<Json<ChannelSettingsView>> {
    let service = SiteSettingsService::new(state.db, state.site_settings);
    let settings = service
        .update_channel_settings(&current_user.0, input)
        .await?;
    Ok(Json(settings))
}
