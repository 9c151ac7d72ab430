//! Inventory models read by the low stock checks

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An inventory item as stored in a warehouse.
///
/// Items carrying a serial number (`sn`) represent single tracked units and are
/// rolled up per warehouse and category when checking stock levels. Items
/// without one are bulk stock evaluated on their own quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub sn: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub min_stock: Decimal,
    pub is_active: bool,
    /// Zero when the item is not assigned to a warehouse
    pub warehouse_id: i64,
    pub warehouse_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Whether the item is tracked by serial number
    pub fn has_serial_number(&self) -> bool {
        self.sn.as_deref().map(str::trim).is_some_and(|sn| !sn.is_empty())
    }
}

/// A reporting row for stock at or below its configured minimum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LowStockEntry {
    /// Item id, absent for aggregated rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_name: Option<String>,
    pub quantity: Decimal,
    pub min_stock: Decimal,
    pub unit: String,
    pub aggregated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub item_ids: Vec<i64>,
}
