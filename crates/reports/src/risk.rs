//! Unfulfilled-order risk classification.
//!
//! The unfulfilled audit looks at every outstanding line item over a
//! lookback window and asks one question per product: is the shop
//! committed to units it does not have? A product is at risk when it is
//! not a preorder, its tracked inventory is at or below zero, and open
//! orders hold committed units against it. Risk products carry order-age
//! statistics so the oldest obligations surface first.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use marginalia_core::{OrderId, ProductId};

use crate::aggregate::{SalesBucket, classify};
use crate::model::ProductSnapshot;

/// One outstanding line item from the lookback window.
///
/// The fetcher only emits lines with `quantity > 0` remaining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfulfilledLine {
    pub order_id: OrderId,
    /// Human-facing order name, e.g. "#4821".
    pub order_name: String,
    pub processed_at: DateTime<Utc>,
    pub product_id: Option<ProductId>,
    pub title: String,
    /// Units still awaiting fulfillment.
    pub quantity: i64,
}

/// Why a line is still open, derived from the product snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// Inventory is negative: the unit was sold without stock.
    Backorder,
    /// Stock exists (or is non-negative); fulfillment is simply pending.
    PendingFulfillment,
}

impl LineStatus {
    /// Label used in the CSV artifact.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Backorder => "backorder",
            Self::PendingFulfillment => "pending_fulfillment",
        }
    }
}

/// Status for one line, or `None` when no status applies (preorder
/// products and products with untracked inventory).
#[must_use]
pub fn line_status(snapshot: Option<&ProductSnapshot>) -> Option<LineStatus> {
    let snapshot = snapshot?;
    if snapshot.is_preorder() {
        return None;
    }
    let inventory = snapshot.total_inventory?;
    if inventory < 0 {
        Some(LineStatus::Backorder)
    } else {
        Some(LineStatus::PendingFulfillment)
    }
}

/// Order-age buckets for the risk summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgeBucket {
    UpToWeek,
    UpToTwoWeeks,
    UpToMonth,
    UpToTwoMonths,
    OverTwoMonths,
}

impl AgeBucket {
    /// Bucket for an order age in whole days.
    #[must_use]
    pub const fn from_days(days: i64) -> Self {
        match days {
            i64::MIN..=7 => Self::UpToWeek,
            8..=14 => Self::UpToTwoWeeks,
            15..=30 => Self::UpToMonth,
            31..=60 => Self::UpToTwoMonths,
            _ => Self::OverTwoMonths,
        }
    }

    /// Label used in the CSV artifact.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UpToWeek => "0-7",
            Self::UpToTwoWeeks => "8-14",
            Self::UpToMonth => "15-30",
            Self::UpToTwoMonths => "31-60",
            Self::OverTwoMonths => "60+",
        }
    }
}

/// One product the shop owes units on without stock to cover them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskProduct {
    pub product_id: ProductId,
    pub title: String,
    pub vendor: String,
    pub collections: Vec<String>,
    pub total_inventory: i64,
    /// Units committed to open orders (the canonical obligation).
    pub committed: i64,
    /// Oldest open order touching the product.
    pub earliest: DateTime<Utc>,
    /// Newest open order touching the product.
    pub latest: DateTime<Utc>,
    /// Whole days since the oldest open order.
    pub age_days: i64,
    pub age_bucket: AgeBucket,
}

/// Whether a product snapshot marks the product as at risk.
///
/// Risk requires all three: not a preorder, tracked inventory at or
/// below zero, and a positive committed quantity.
#[must_use]
pub fn is_risk(snapshot: &ProductSnapshot) -> bool {
    if snapshot.is_preorder() {
        return false;
    }
    match snapshot.total_inventory {
        Some(inventory) => inventory <= 0 && snapshot.committed > 0,
        None => false,
    }
}

/// Build the risk summary from unfulfilled lines and snapshots.
///
/// Lines are grouped by product; each risk product records the earliest
/// and latest open order and its age bucket. Output is sorted oldest
/// first (descending `age_days`).
#[must_use]
pub fn classify_risk(
    lines: &[UnfulfilledLine],
    snapshots: &HashMap<ProductId, ProductSnapshot>,
    now: DateTime<Utc>,
) -> Vec<RiskProduct> {
    let mut spans: HashMap<&ProductId, (DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
    for line in lines {
        let Some(product_id) = &line.product_id else {
            continue;
        };
        spans
            .entry(product_id)
            .and_modify(|(earliest, latest)| {
                *earliest = (*earliest).min(line.processed_at);
                *latest = (*latest).max(line.processed_at);
            })
            .or_insert((line.processed_at, line.processed_at));
    }

    let mut products: Vec<RiskProduct> = spans
        .into_iter()
        .filter_map(|(product_id, (earliest, latest))| {
            let snapshot = snapshots.get(product_id)?;
            if !is_risk(snapshot) {
                return None;
            }
            let age_days = (now - earliest).num_days();
            Some(RiskProduct {
                product_id: product_id.clone(),
                title: snapshot.title.clone(),
                vendor: snapshot.vendor.clone().unwrap_or_default(),
                collections: snapshot.collections.clone(),
                total_inventory: snapshot.total_inventory.unwrap_or_default(),
                committed: snapshot.committed,
                earliest,
                latest,
                age_days,
                age_bucket: AgeBucket::from_days(age_days),
            })
        })
        .collect();

    products.sort_by(|a, b| {
        b.age_days
            .cmp(&a.age_days)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    products
}

/// Orders whose outstanding lines span more than one availability class.
///
/// Two explicit passes: collect the availability classes seen per order
/// first, then report the orders whose set holds more than one class.
/// Rows are never mutated retroactively.
#[must_use]
pub fn mixed_availability_orders(
    lines: &[UnfulfilledLine],
    snapshots: &HashMap<ProductId, ProductSnapshot>,
) -> HashSet<OrderId> {
    let mut classes: HashMap<&OrderId, HashSet<SalesBucket>> = HashMap::new();
    for line in lines {
        let Some(product_id) = &line.product_id else {
            continue;
        };
        let bucket = classify(snapshots.get(product_id), None);
        classes.entry(&line.order_id).or_default().insert(bucket);
    }

    classes
        .into_iter()
        .filter(|(_, set)| set.len() > 1)
        .map(|(order_id, _)| order_id.clone())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Days, TimeZone};

    fn product(n: u64) -> ProductId {
        ProductId::new(format!("gid://shopify/Product/{n}"))
    }

    fn snapshot(total_inventory: Option<i64>, committed: i64) -> ProductSnapshot {
        ProductSnapshot {
            title: "Six Seasons".to_string(),
            vendor: Some("Artisan".to_string()),
            total_inventory,
            incoming: 0,
            committed,
            min_price: None,
            collections: Vec::new(),
        }
    }

    fn line(order: u64, product_id: u64, processed_at: DateTime<Utc>) -> UnfulfilledLine {
        UnfulfilledLine {
            order_id: OrderId::new(format!("gid://shopify/Order/{order}")),
            order_name: format!("#{order}"),
            processed_at,
            product_id: Some(product(product_id)),
            title: "Six Seasons".to_string(),
            quantity: 1,
        }
    }

    #[test]
    fn test_is_risk_requires_all_three_conditions() {
        assert!(is_risk(&snapshot(Some(0), 5)));
        assert!(is_risk(&snapshot(Some(-2), 1)));
        // Stock on hand: not at risk.
        assert!(!is_risk(&snapshot(Some(3), 5)));
        // Nothing committed: not at risk.
        assert!(!is_risk(&snapshot(Some(0), 0)));
        // Untracked inventory: not at risk.
        assert!(!is_risk(&snapshot(None, 5)));
    }

    #[test]
    fn test_preorder_is_never_at_risk() {
        let mut snap = snapshot(Some(0), 5);
        snap.collections.push("Preorder".to_string());
        assert!(!is_risk(&snap));
    }

    #[test]
    fn test_age_bucket_thresholds() {
        assert_eq!(AgeBucket::from_days(0).label(), "0-7");
        assert_eq!(AgeBucket::from_days(7).label(), "0-7");
        assert_eq!(AgeBucket::from_days(8).label(), "8-14");
        assert_eq!(AgeBucket::from_days(15).label(), "15-30");
        assert_eq!(AgeBucket::from_days(30).label(), "15-30");
        assert_eq!(AgeBucket::from_days(31).label(), "31-60");
        assert_eq!(AgeBucket::from_days(61).label(), "60+");
    }

    #[test]
    fn test_line_status_labels() {
        assert_eq!(
            line_status(Some(&snapshot(Some(-1), 0))),
            Some(LineStatus::Backorder)
        );
        assert_eq!(
            line_status(Some(&snapshot(Some(4), 0))),
            Some(LineStatus::PendingFulfillment)
        );
        assert_eq!(line_status(Some(&snapshot(None, 0))), None);
        assert_eq!(line_status(None), None);

        let mut preorder = snapshot(Some(-1), 0);
        preorder.collections.push("Preorder".to_string());
        assert_eq!(line_status(Some(&preorder)), None);
    }

    #[test]
    fn test_risk_product_ages_from_earliest_order() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let old = now.checked_sub_days(Days::new(40)).unwrap();
        let recent = now.checked_sub_days(Days::new(2)).unwrap();
        let snapshots: HashMap<ProductId, ProductSnapshot> =
            [(product(1), snapshot(Some(0), 5))].into_iter().collect();
        let lines = vec![line(1, 1, old), line(2, 1, recent)];

        let risks = classify_risk(&lines, &snapshots, now);
        assert_eq!(risks.len(), 1);
        let risk = &risks[0];
        assert_eq!(risk.committed, 5);
        assert_eq!(risk.earliest, old);
        assert_eq!(risk.latest, recent);
        assert_eq!(risk.age_days, 40);
        assert_eq!(risk.age_bucket.label(), "31-60");
    }

    #[test]
    fn test_risk_summary_sorted_oldest_first() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let snapshots: HashMap<ProductId, ProductSnapshot> = [
            (product(1), snapshot(Some(0), 1)),
            (product(2), snapshot(Some(-1), 2)),
        ]
        .into_iter()
        .collect();
        let lines = vec![
            line(1, 1, now.checked_sub_days(Days::new(3)).unwrap()),
            line(2, 2, now.checked_sub_days(Days::new(20)).unwrap()),
        ];

        let risks = classify_risk(&lines, &snapshots, now);
        let ages: Vec<i64> = risks.iter().map(|r| r.age_days).collect();
        assert_eq!(ages, vec![20, 3]);
    }

    #[test]
    fn test_in_stock_products_excluded_from_summary() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let snapshots: HashMap<ProductId, ProductSnapshot> =
            [(product(1), snapshot(Some(4), 5))].into_iter().collect();
        let lines = vec![line(1, 1, now)];
        assert!(classify_risk(&lines, &snapshots, now).is_empty());
    }

    #[test]
    fn test_mixed_availability_detection() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let snapshots: HashMap<ProductId, ProductSnapshot> = [
            (product(1), snapshot(Some(5), 0)),
            (product(2), snapshot(Some(-1), 0)),
        ]
        .into_iter()
        .collect();
        // Order 1 mixes in-stock and backorder; order 2 is uniform.
        let lines = vec![line(1, 1, now), line(1, 2, now), line(2, 1, now)];

        let mixed = mixed_availability_orders(&lines, &snapshots);
        assert!(mixed.contains(&OrderId::new("gid://shopify/Order/1")));
        assert!(!mixed.contains(&OrderId::new("gid://shopify/Order/2")));
    }
}
