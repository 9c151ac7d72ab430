//! Low stock aggregation tests
//!
//! Tests for the aggregator and digest including:
//! - Every reported entry is at or below a positive minimum
//! - Aggregation does not depend on input order
//! - Digest formatting

use chrono::Utc;
use inventory_backend::services::low_stock::{
    build_low_stock_message, compute_low_stock_entries, RESTOCK_REMINDER,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{InventoryItem, LowStockEntry};

const CATEGORIES: [&str; 4] = ["Router", "Kabel", "Switch", ""];
const WAREHOUSES: [(i64, &str); 3] = [(0, ""), (1, "Gudang Utama"), (2, "Gudang Timur")];

fn item(
    id: i64,
    sn: Option<&str>,
    category: &str,
    warehouse: (i64, &str),
    quantity: Decimal,
    min_stock: Decimal,
) -> InventoryItem {
    InventoryItem {
        id,
        name: format!("Item {}", id),
        sn: sn.map(str::to_string),
        category: (!category.is_empty()).then(|| category.to_string()),
        unit: Some("pcs".to_string()),
        quantity,
        min_stock,
        is_active: true,
        warehouse_id: warehouse.0,
        warehouse_name: (!warehouse.1.is_empty()).then(|| warehouse.1.to_string()),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_mixed_snapshot_sorted_most_depleted_first() {
        let items = vec![
            item(1, None, "Kabel", WAREHOUSES[1], Decimal::new(4, 0), Decimal::new(5, 0)),
            item(2, Some("SN-1"), "Router", WAREHOUSES[1], Decimal::ONE, Decimal::new(3, 0)),
            item(3, Some("SN-2"), "router", WAREHOUSES[1], Decimal::ONE, Decimal::new(2, 0)),
            item(4, None, "Switch", WAREHOUSES[2], Decimal::new(25, 1), Decimal::new(3, 0)),
            item(5, None, "Switch", WAREHOUSES[2], Decimal::new(9, 0), Decimal::new(3, 0)),
        ];

        let entries = compute_low_stock_entries(&items);
        let quantities: Vec<Decimal> = entries.iter().map(|e| e.quantity).collect();
        assert_eq!(
            quantities,
            vec![Decimal::new(2, 0), Decimal::new(25, 1), Decimal::new(4, 0)]
        );

        let router = &entries[0];
        assert!(router.aggregated);
        assert_eq!(router.name, "Router (Gudang Utama)");
        assert_eq!(router.min_stock, Decimal::new(3, 0));
        assert_eq!(router.item_ids, vec![2, 3]);
    }

    #[test]
    fn test_serialized_items_without_warehouse() {
        let items = vec![item(1, Some("SN-1"), "", WAREHOUSES[0], Decimal::ZERO, Decimal::ONE)];

        let entries = compute_low_stock_entries(&items);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Uncategorized (Semua Gudang)");
        assert_eq!(entries[0].category, "Uncategorized");
        assert_eq!(entries[0].warehouse_id, None);
        assert_eq!(entries[0].warehouse_name, None);
    }

    #[test]
    fn test_group_above_minimum_not_reported() {
        let items = vec![
            item(1, Some("SN-1"), "Router", WAREHOUSES[1], Decimal::ONE, Decimal::new(2, 0)),
            item(2, Some("SN-2"), "Router", WAREHOUSES[1], Decimal::new(2, 0), Decimal::new(2, 0)),
        ];
        assert!(compute_low_stock_entries(&items).is_empty());
    }

    #[test]
    fn test_same_category_in_different_warehouses_not_merged() {
        let items = vec![
            item(1, Some("SN-1"), "Router", WAREHOUSES[1], Decimal::ONE, Decimal::new(2, 0)),
            item(2, Some("SN-2"), "Router", WAREHOUSES[2], Decimal::ONE, Decimal::new(2, 0)),
        ];
        assert_eq!(compute_low_stock_entries(&items).len(), 2);
    }

    #[test]
    fn test_default_unit_for_aggregated_entry() {
        let mut unitless = item(1, Some("SN-1"), "Router", WAREHOUSES[1], Decimal::ONE, Decimal::new(2, 0));
        unitless.unit = None;

        let entries = compute_low_stock_entries(&[unitless]);
        assert_eq!(entries[0].unit, "unit");
    }

    #[test]
    fn test_message_for_standalone_entry() {
        let items = vec![item(
            9,
            None,
            "Kabel",
            WAREHOUSES[2],
            Decimal::new(15, 1),
            Decimal::new(5, 0),
        )];
        let message = build_low_stock_message(&compute_low_stock_entries(&items));

        let expected = "🔔 *LOW STOCK ALERT* 🔔\n\n\
                        1. *Item 9*\n   \
                        • Gudang: Gudang Timur\n   \
                        • Stok tersisa: 1.50 pcs\n   \
                        • Minimum: 5 pcs\n   \
                        • Kategori: Kabel\n\n\
                        ⚠️ Segera lakukan restocking untuk item di atas!";
        assert_eq!(message, expected);
    }

    #[test]
    fn test_message_title_falls_back() {
        let entry = LowStockEntry {
            id: Some(1),
            name: String::new(),
            category: String::new(),
            warehouse_id: None,
            warehouse_name: None,
            quantity: Decimal::ZERO,
            min_stock: Decimal::ONE,
            unit: String::new(),
            aggregated: false,
            item_ids: vec![1],
        };
        let message = build_low_stock_message(&[entry]);

        assert!(message.contains("1. *Item*\n"));
        assert!(message.contains("   • Gudang: Semua Gudang\n"));
        assert!(message.contains("   • Stok tersisa: 0 unit\n"));
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(build_low_stock_message(&[]), "");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for an inventory snapshot with sequential ids
    fn snapshot_strategy() -> impl Strategy<Value = Vec<InventoryItem>> {
        prop::collection::vec(
            (
                any::<bool>(),
                0usize..CATEGORIES.len(),
                0usize..WAREHOUSES.len(),
                0i64..=200i64,
                0i64..=100i64,
                prop::bool::weighted(0.9),
            ),
            0..30,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(idx, (has_sn, category, warehouse, qty, min, active))| {
                    let id = idx as i64 + 1;
                    let sn = has_sn.then(|| format!("SN-{}", id));
                    let mut item = item(
                        id,
                        sn.as_deref(),
                        CATEGORIES[category],
                        WAREHOUSES[warehouse],
                        Decimal::new(qty, 1),
                        Decimal::new(min, 1),
                    );
                    item.is_active = active;
                    item
                })
                .collect()
        })
    }

    /// Order-independent identity of an entry
    fn entry_key(entry: &LowStockEntry) -> (bool, Option<i64>, String, Decimal, Decimal, Vec<i64>) {
        let mut ids = entry.item_ids.clone();
        ids.sort_unstable();
        (
            entry.aggregated,
            entry.warehouse_id,
            entry.category.to_lowercase(),
            entry.quantity,
            entry.min_stock,
            ids,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every entry is at or below a positive minimum
        #[test]
        fn prop_entries_are_low(items in snapshot_strategy()) {
            for entry in compute_low_stock_entries(&items) {
                prop_assert!(entry.min_stock > Decimal::ZERO);
                prop_assert!(entry.quantity <= entry.min_stock);
            }
        }

        /// Entries are sorted by quantity, most depleted first
        #[test]
        fn prop_entries_sorted_ascending(items in snapshot_strategy()) {
            let entries = compute_low_stock_entries(&items);
            for pair in entries.windows(2) {
                prop_assert!(pair[0].quantity <= pair[1].quantity);
            }
        }

        /// Inactive items never contribute
        #[test]
        fn prop_inactive_items_ignored(items in snapshot_strategy()) {
            let inactive: Vec<i64> = items.iter().filter(|i| !i.is_active).map(|i| i.id).collect();
            for entry in compute_low_stock_entries(&items) {
                for id in &entry.item_ids {
                    prop_assert!(!inactive.contains(id));
                }
            }
        }

        /// Permuting the snapshot yields the same groups and sums
        #[test]
        fn prop_aggregation_ignores_input_order(
            (items, shuffled) in snapshot_strategy()
                .prop_flat_map(|items| (Just(items.clone()), Just(items).prop_shuffle()))
        ) {
            let mut expected: Vec<_> = compute_low_stock_entries(&items).iter().map(entry_key).collect();
            let mut actual: Vec<_> = compute_low_stock_entries(&shuffled).iter().map(entry_key).collect();
            expected.sort();
            actual.sort();
            prop_assert_eq!(expected, actual);
        }

        /// Non-empty digests end with the restock reminder
        #[test]
        fn prop_message_ends_with_reminder(items in snapshot_strategy()) {
            let entries = compute_low_stock_entries(&items);
            let message = build_low_stock_message(&entries);
            if entries.is_empty() {
                prop_assert!(message.is_empty());
            } else {
                prop_assert!(message.ends_with(RESTOCK_REMINDER));
                let numbered = format!("{}. *", entries.len());
                prop_assert!(message.contains(&numbered));
            }
        }
    }
}
