//! Catalog maintenance views for the weekly hygiene report.
//!
//! Three pure views over a full catalog scan flag records that have
//! drifted out of shape, and a fourth view over the unfulfilled
//! backlog surfaces orders that could ship today. None of them mutate
//! anything; the report is a to-do list for a human.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use marginalia_core::{OrderId, ProductId, sort_key};

use crate::model::{CatalogProduct, ProductSnapshot};
use crate::risk::UnfulfilledLine;

/// One flagged product row, shared by all three catalog views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedProduct {
    pub product_id: ProductId,
    pub title: String,
    pub vendor: String,
    pub collections: Vec<String>,
    /// `None` when inventory is untracked.
    pub total_inventory: Option<i64>,
    pub committed: i64,
    pub incoming: i64,
}

impl FlaggedProduct {
    fn from_catalog(product: &CatalogProduct) -> Self {
        Self {
            product_id: product.id.clone(),
            title: product.snapshot.title.clone(),
            vendor: product.snapshot.vendor.clone().unwrap_or_default(),
            collections: product.snapshot.collections.clone(),
            total_inventory: product.snapshot.total_inventory,
            committed: product.snapshot.committed,
            incoming: product.snapshot.incoming,
        }
    }
}

/// The catalog views, each sorted by title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFindings {
    /// Tracked inventory below zero with nothing committed: the count
    /// has drifted and nobody is owed units, so a correction is safe.
    pub negative_without_commitments: Vec<FlaggedProduct>,
    /// Active listings in no collection, invisible to storefront
    /// navigation.
    pub active_without_collections: Vec<FlaggedProduct>,
    /// Out of stock with open commitments and no preorder terms; the
    /// catalog-wide complement of the order-driven risk summary.
    pub out_of_stock_committed: Vec<FlaggedProduct>,
}

impl CatalogFindings {
    /// Total flagged rows across the three views.
    #[must_use]
    pub fn total(&self) -> usize {
        self.negative_without_commitments.len()
            + self.active_without_collections.len()
            + self.out_of_stock_committed.len()
    }
}

/// Run every catalog view over a full scan.
///
/// A product may appear in more than one view; the views answer
/// different questions and are reported as separate sections.
#[must_use]
pub fn audit_catalog(catalog: &[CatalogProduct]) -> CatalogFindings {
    let mut findings = CatalogFindings::default();

    for product in catalog {
        let snapshot = &product.snapshot;
        if let Some(inventory) = snapshot.total_inventory {
            if inventory < 0 && snapshot.committed == 0 {
                findings
                    .negative_without_commitments
                    .push(FlaggedProduct::from_catalog(product));
            }
            if inventory <= 0 && snapshot.committed > 0 && !snapshot.is_preorder() {
                findings
                    .out_of_stock_committed
                    .push(FlaggedProduct::from_catalog(product));
            }
        }
        if product.active && snapshot.collections.is_empty() {
            findings
                .active_without_collections
                .push(FlaggedProduct::from_catalog(product));
        }
    }

    sort_by_title(&mut findings.negative_without_commitments);
    sort_by_title(&mut findings.active_without_collections);
    sort_by_title(&mut findings.out_of_stock_committed);
    findings
}

fn sort_by_title(rows: &mut [FlaggedProduct]) {
    rows.sort_by_cached_key(|row| (sort_key(&row.title), row.product_id.clone()));
}

/// An open order every line of which is covered by stock on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippableOrder {
    pub order_id: OrderId,
    /// Human-facing order name, e.g. "#4821".
    pub order_name: String,
    pub processed_at: DateTime<Utc>,
    /// Outstanding line items on the order.
    pub lines: usize,
    /// Outstanding units across those lines.
    pub units: i64,
}

/// Orders whose entire outstanding quantity is coverable right now.
///
/// An order qualifies only when every product it still owes has a
/// snapshot with tracked inventory at or above the order's own demand
/// for that product. A line without a product id, without a snapshot,
/// or with untracked inventory disqualifies the whole order rather
/// than being skipped: "shippable" is a promise, not an estimate.
/// Output is sorted oldest first.
#[must_use]
pub fn fully_shippable_orders(
    lines: &[UnfulfilledLine],
    snapshots: &HashMap<ProductId, ProductSnapshot>,
) -> Vec<ShippableOrder> {
    struct OrderDemand<'a> {
        name: &'a str,
        processed_at: DateTime<Utc>,
        lines: usize,
        per_product: HashMap<&'a ProductId, i64>,
        coverable: bool,
    }

    let mut orders: HashMap<&OrderId, OrderDemand<'_>> = HashMap::new();
    for line in lines {
        let demand = orders.entry(&line.order_id).or_insert_with(|| OrderDemand {
            name: &line.order_name,
            processed_at: line.processed_at,
            lines: 0,
            per_product: HashMap::new(),
            coverable: true,
        });
        demand.lines += 1;
        match &line.product_id {
            Some(product_id) => {
                *demand.per_product.entry(product_id).or_default() += line.quantity;
            }
            None => demand.coverable = false,
        }
    }

    let mut shippable: Vec<ShippableOrder> = orders
        .into_iter()
        .filter_map(|(order_id, demand)| {
            if !demand.coverable {
                return None;
            }
            let covered = demand.per_product.iter().all(|(product_id, &needed)| {
                snapshots
                    .get(product_id)
                    .and_then(|s| s.total_inventory)
                    .is_some_and(|inventory| inventory >= needed)
            });
            if !covered {
                return None;
            }
            Some(ShippableOrder {
                order_id: order_id.clone(),
                order_name: demand.name.to_string(),
                processed_at: demand.processed_at,
                lines: demand.lines,
                units: demand.per_product.values().sum(),
            })
        })
        .collect();

    shippable.sort_by(|a, b| {
        a.processed_at
            .cmp(&b.processed_at)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
    shippable
}
