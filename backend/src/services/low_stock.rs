//! Low stock aggregation and digest rendering
//!
//! Shared by the background scheduler, the manual "check now" action and the
//! low stock listing so all of them report the same rows.

use std::collections::HashMap;

use rust_decimal::Decimal;
use shared::{InventoryItem, LowStockEntry};

const UNCATEGORIZED: &str = "Uncategorized";
const ALL_WAREHOUSES: &str = "Semua Gudang";
const DEFAULT_UNIT: &str = "unit";

const MESSAGE_HEADER: &str = "🔔 *LOW STOCK ALERT* 🔔\n\n";

/// Closing line of every non-empty digest
pub const RESTOCK_REMINDER: &str = "⚠️ Segera lakukan restocking untuk item di atas!";

/// Running totals for one `(warehouse, category)` group of serialized items
struct SerialGroup {
    category: String,
    warehouse_id: Option<i64>,
    warehouse_name: String,
    quantity: Decimal,
    min_stock: Decimal,
    unit: String,
    item_ids: Vec<i64>,
}

fn is_low(quantity: Decimal, min_stock: Decimal) -> bool {
    min_stock > Decimal::ZERO && quantity <= min_stock
}

fn trimmed(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Turn an inventory snapshot into low stock entries, most depleted first.
///
/// Items without a serial number are reported individually. Serialized items
/// are summed per warehouse and case-insensitive category, with the largest
/// minimum in the group as the threshold. Inactive items are ignored.
pub fn compute_low_stock_entries(items: &[InventoryItem]) -> Vec<LowStockEntry> {
    let mut entries = Vec::new();
    let mut groups: Vec<SerialGroup> = Vec::new();
    let mut group_index: HashMap<(i64, String), usize> = HashMap::new();

    for item in items.iter().filter(|item| item.is_active) {
        let unit = trimmed(item.unit.as_deref());
        let warehouse_name = trimmed(item.warehouse_name.as_deref());
        let warehouse_id = (item.warehouse_id != 0).then_some(item.warehouse_id);

        if !item.has_serial_number() {
            if is_low(item.quantity, item.min_stock) {
                entries.push(LowStockEntry {
                    id: Some(item.id),
                    name: item.name.clone(),
                    category: item.category.clone().unwrap_or_default(),
                    warehouse_id,
                    warehouse_name: warehouse_id.and_then(|_| non_empty(warehouse_name)),
                    quantity: item.quantity,
                    min_stock: item.min_stock,
                    unit: unit.to_string(),
                    aggregated: false,
                    item_ids: vec![item.id],
                });
            }
            continue;
        }

        let category = match trimmed(item.category.as_deref()) {
            "" => UNCATEGORIZED,
            category => category,
        };
        let key = (item.warehouse_id, category.to_lowercase());

        let index = *group_index.entry(key).or_insert_with(|| {
            groups.push(SerialGroup {
                category: category.to_string(),
                warehouse_id,
                warehouse_name: warehouse_name.to_string(),
                quantity: Decimal::ZERO,
                min_stock: Decimal::ZERO,
                unit: unit.to_string(),
                item_ids: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[index];
        group.quantity += item.quantity;
        if item.min_stock > group.min_stock {
            group.min_stock = item.min_stock;
        }
        if group.unit.is_empty() {
            group.unit = unit.to_string();
        }
        if group.warehouse_name.is_empty() {
            group.warehouse_name = warehouse_name.to_string();
        }
        group.item_ids.push(item.id);
    }

    for group in groups {
        if !is_low(group.quantity, group.min_stock) {
            continue;
        }

        let display_warehouse = if group.warehouse_name.is_empty() {
            ALL_WAREHOUSES
        } else {
            group.warehouse_name.as_str()
        };

        entries.push(LowStockEntry {
            id: None,
            name: format!("{} ({})", group.category, display_warehouse),
            warehouse_name: non_empty(&group.warehouse_name),
            category: group.category,
            warehouse_id: group.warehouse_id,
            quantity: group.quantity,
            min_stock: group.min_stock,
            unit: if group.unit.is_empty() {
                DEFAULT_UNIT.to_string()
            } else {
                group.unit
            },
            aggregated: true,
            item_ids: group.item_ids,
        });
    }

    // Stable: ties keep insertion order
    entries.sort_by(|a, b| a.quantity.cmp(&b.quantity));
    entries
}

/// Whole numbers without decimals, everything else with two
pub fn format_quantity(value: Decimal) -> String {
    let formatted = format!("{:.2}", value.round_dp(2));
    match formatted.strip_suffix(".00") {
        Some(whole) if whole == "-0" => "0".to_string(),
        Some(whole) => whole.to_string(),
        None => formatted,
    }
}

/// Render the digest sent to every recipient. Empty input renders nothing.
pub fn build_low_stock_message(entries: &[LowStockEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut message = String::from(MESSAGE_HEADER);
    for (idx, entry) in entries.iter().enumerate() {
        let unit = if entry.unit.is_empty() {
            DEFAULT_UNIT
        } else {
            entry.unit.as_str()
        };
        let warehouse = entry
            .warehouse_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(ALL_WAREHOUSES);
        let title = [entry.name.as_str(), entry.category.as_str()]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
            .unwrap_or("Item");

        message.push_str(&format!("{}. *{}*\n", idx + 1, title));
        message.push_str(&format!("   • Gudang: {}\n", warehouse));
        message.push_str(&format!(
            "   • Stok tersisa: {} {}\n",
            format_quantity(entry.quantity),
            unit
        ));
        message.push_str(&format!(
            "   • Minimum: {} {}\n",
            format_quantity(entry.min_stock),
            unit
        ));
        if entry.aggregated {
            message.push_str(&format!(
                "   • Akumulasi {} item SN unik\n",
                entry.item_ids.len()
            ));
        } else if !entry.category.is_empty() {
            message.push_str(&format!("   • Kategori: {}\n", entry.category));
        }
        message.push('\n');
    }

    message.push_str(RESTOCK_REMINDER);
    message
}

/// Email subject for a digest of `count` entries
pub fn low_stock_subject(count: usize) -> String {
    format!("Low Stock Alert - {} Items", count)
}
