//! HTTP handlers for inventory endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use shared::LowStockEntry;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::low_stock::compute_low_stock_entries;
use crate::services::store::{InventorySnapshotSource, PgNotificationStore};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LowStockResponse {
    pub count: usize,
    pub items: Vec<LowStockEntry>,
}

/// Current low stock entries, without sending anything
pub async fn list_low_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<LowStockResponse>> {
    let store = PgNotificationStore::new(state.db);
    let items = store.load_active_items().await?;
    let entries = compute_low_stock_entries(&items);

    Ok(Json(LowStockResponse {
        count: entries.len(),
        items: entries,
    }))
}
