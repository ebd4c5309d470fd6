//! Domain records shared between the fetcher, aggregation, and risk stages.
//!
//! These are plain in-memory structs decoupled from the GraphQL response
//! shapes: the fetcher converts API payloads into them once, and every
//! later stage is pure computation over these types.

use chrono::{DateTime, Utc};
use marginalia_core::{OrderId, ProductId, SalesChannel, VariantId};
use rust_decimal::Decimal;

/// Collection title marking products sold ahead of stock.
pub const PREORDER_COLLECTION: &str = "Preorder";

/// One paid order inside the reporting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    /// Human-facing order name, e.g. "#4821".
    pub name: String,
    pub processed_at: DateTime<Utc>,
    pub channel: SalesChannel,
    pub line_items: Vec<LineItemRecord>,
}

/// One line item on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRecord {
    pub title: String,
    pub quantity: i64,
    pub unfulfilled_quantity: i64,
    pub vendor: Option<String>,
    /// Absent for custom (non-catalog) line items, which are skipped.
    pub product_id: Option<ProductId>,
    pub variant: Option<VariantRef>,
    /// Inventory figure embedded in the order payload itself; the
    /// fallback when no product snapshot is available.
    pub product_total_inventory: Option<i64>,
    /// Order-level custom attributes as (key, value) pairs.
    pub custom_attributes: Vec<(String, String)>,
}

/// The variant fields the reports care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRef {
    pub id: VariantId,
    pub sku: Option<String>,
    pub barcode: Option<String>,
}

/// Point-in-time inventory state for one product, fetched once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub title: String,
    pub vendor: Option<String>,
    /// `None` when inventory is not tracked for the product.
    pub total_inventory: Option<i64>,
    /// Incoming units summed across every variant and inventory level.
    pub incoming: i64,
    /// Units committed to open orders, summed the same way. This is the
    /// canonical obligation figure for risk classification.
    pub committed: i64,
    /// Minimum variant price.
    pub min_price: Option<Decimal>,
    /// Titles of the collections the product belongs to.
    pub collections: Vec<String>,
}

impl ProductSnapshot {
    /// Whether the product is sold on preorder terms.
    #[must_use]
    pub fn is_preorder(&self) -> bool {
        self.collections
            .iter()
            .any(|c| c.eq_ignore_ascii_case(PREORDER_COLLECTION))
    }
}

/// One product from a full-catalog scan.
///
/// Carries the same snapshot fields plus the listing state, which only
/// the catalog-wide hygiene views care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: ProductId,
    /// Whether the product status is ACTIVE.
    pub active: bool,
    pub snapshot: ProductSnapshot,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(collections: Vec<String>) -> ProductSnapshot {
        ProductSnapshot {
            title: "Salt Fat Acid Heat".to_string(),
            vendor: Some("Simon & Schuster".to_string()),
            total_inventory: Some(3),
            incoming: 0,
            committed: 0,
            min_price: None,
            collections,
        }
    }

    #[test]
    fn test_preorder_collection_detected() {
        assert!(snapshot(vec!["Preorder".to_string()]).is_preorder());
        assert!(snapshot(vec!["preorder".to_string()]).is_preorder());
    }

    #[test]
    fn test_other_collections_are_not_preorder() {
        assert!(!snapshot(vec!["New Arrivals".to_string()]).is_preorder());
        assert!(!snapshot(Vec::new()).is_preorder());
    }
}
