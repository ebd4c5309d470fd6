//! CSV artifact builders.
//!
//! Artifacts are built fully in memory so the same bytes go to disk and
//! into email attachments. Timestamps are shown in both UTC and Eastern
//! time; filenames carry an Eastern timestamp because that is the
//! timezone the shop operates in.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use csv::WriterBuilder;
use marginalia_core::{OrderId, ProductId};
use tracing::info;

use crate::aggregate::{SalesBucket, SalesBuckets};
use crate::calendar::ReportingWindow;
use crate::error::ReportError;
use crate::hygiene::{CatalogFindings, FlaggedProduct, ShippableOrder};
use crate::model::ProductSnapshot;
use crate::risk::{RiskProduct, UnfulfilledLine, line_status};
use crate::window::REPORTING_TIMEZONE;

/// Bucket section order in the daily sales artifact.
const BUCKET_ORDER: &[SalesBucket] = &[
    SalesBucket::Main,
    SalesBucket::Preorder,
    SalesBucket::Backorder,
    SalesBucket::OutOfStock,
];

const SALES_COLUMNS: &[&str] = &[
    "Title",
    "Author",
    "ISBN",
    "Price",
    "Available",
    "Incoming",
    "Online",
    "POS",
    "Total",
    "Attributes",
    "Vendor",
    "Collections",
];

const UNFULFILLED_COLUMNS: &[&str] = &[
    "Order",
    "Processed At (UTC)",
    "Processed At (ET)",
    "Title",
    "Unfulfilled Qty",
    "Status",
    "Mixed Availability",
];

const HYGIENE_COLUMNS: &[&str] = &[
    "Title",
    "Vendor",
    "Collections",
    "Available",
    "Committed",
    "Incoming",
];

const SHIPPABLE_COLUMNS: &[&str] = &[
    "Order",
    "Processed At (UTC)",
    "Processed At (ET)",
    "Lines",
    "Units",
];

const RISK_COLUMNS: &[&str] = &[
    "Title",
    "Vendor",
    "Collections",
    "Available",
    "Committed",
    "Earliest Order (UTC)",
    "Earliest Order (ET)",
    "Latest Order (UTC)",
    "Latest Order (ET)",
    "Age (days)",
    "Age Bucket",
];

/// One finished CSV artifact: a filename plus its bytes.
#[derive(Debug, Clone)]
pub struct CsvArtifact {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Write an artifact into the output directory, creating it if needed.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be written.
pub fn write_artifact(output_dir: &Path, artifact: &CsvArtifact) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&artifact.filename);
    fs::write(&path, &artifact.content)?;
    info!(path = %path.display(), bytes = artifact.content.len(), "wrote report artifact");
    Ok(path)
}

fn eastern(instant: DateTime<Utc>) -> DateTime<Tz> {
    instant.with_timezone(&REPORTING_TIMEZONE)
}

fn filename_stamp(generated_at: DateTime<Utc>) -> String {
    eastern(generated_at).format("%Y%m%d_%H%M%S").to_string()
}

// =============================================================================
// Daily sales
// =============================================================================

/// Build the daily sales artifact: a report-date header followed by the
/// four bucket sections in fixed order, each sorted by title.
///
/// # Errors
///
/// Returns a CSV error if serialization fails.
pub fn daily_sales(
    window: &ReportingWindow,
    buckets: &SalesBuckets,
    generated_at: DateTime<Utc>,
) -> Result<CsvArtifact, ReportError> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    let date_label = if window.start == window.end {
        window.start.to_string()
    } else {
        format!("{} to {}", window.start, window.end)
    };
    writer.write_record(["Report Date", date_label.as_str()])?;
    writer.write_record([""])?;

    for &bucket in BUCKET_ORDER {
        writer.write_record([bucket.heading()])?;
        writer.write_record(SALES_COLUMNS)?;
        for (_, entry) in buckets.sorted_rows(bucket) {
            writer.write_record([
                entry.title.clone(),
                entry.author.clone(),
                entry.isbn.clone(),
                entry.price.map(|p| p.to_string()).unwrap_or_default(),
                entry.available.map(|a| a.to_string()).unwrap_or_default(),
                entry.incoming.to_string(),
                entry.online_sold.to_string(),
                entry.pos_sold.to_string(),
                entry.total_sold().to_string(),
                entry.attributes.clone(),
                entry.vendor.clone(),
                entry.collections.join(", "),
            ])?;
        }
        writer.write_record([""])?;
    }

    finish(writer, format!("daily_sales_{}.csv", filename_stamp(generated_at)))
}

// =============================================================================
// Unfulfilled audit
// =============================================================================

/// Build the unfulfilled line-item view.
///
/// Each row carries the line's status (when one applies) and whether its
/// order spans more than one availability class.
///
/// # Errors
///
/// Returns a CSV error if serialization fails.
pub fn unfulfilled_lines(
    lines: &[UnfulfilledLine],
    snapshots: &HashMap<ProductId, ProductSnapshot>,
    mixed_orders: &HashSet<OrderId>,
    generated_at: DateTime<Utc>,
) -> Result<CsvArtifact, ReportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(UNFULFILLED_COLUMNS)?;

    for line in lines {
        let snapshot = line.product_id.as_ref().and_then(|id| snapshots.get(id));
        let status = line_status(snapshot).map_or("", |s| s.label());
        let mixed = if mixed_orders.contains(&line.order_id) {
            "yes"
        } else {
            ""
        };
        writer.write_record([
            line.order_name.clone(),
            line.processed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            eastern(line.processed_at)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            line.title.clone(),
            line.quantity.to_string(),
            status.to_string(),
            mixed.to_string(),
        ])?;
    }

    finish(
        writer,
        format!("unfulfilled_lines_{}.csv", filename_stamp(generated_at)),
    )
}

/// Build the risk-product summary, already sorted oldest first.
///
/// # Errors
///
/// Returns a CSV error if serialization fails.
pub fn risk_summary(
    risks: &[RiskProduct],
    generated_at: DateTime<Utc>,
) -> Result<CsvArtifact, ReportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(RISK_COLUMNS)?;

    for risk in risks {
        writer.write_record([
            risk.title.clone(),
            risk.vendor.clone(),
            risk.collections.join(", "),
            risk.total_inventory.to_string(),
            risk.committed.to_string(),
            risk.earliest.format("%Y-%m-%d %H:%M:%S").to_string(),
            eastern(risk.earliest).format("%Y-%m-%d %H:%M:%S").to_string(),
            risk.latest.format("%Y-%m-%d %H:%M:%S").to_string(),
            eastern(risk.latest).format("%Y-%m-%d %H:%M:%S").to_string(),
            risk.age_days.to_string(),
            risk.age_bucket.label().to_string(),
        ])?;
    }

    finish(
        writer,
        format!("risk_summary_{}.csv", filename_stamp(generated_at)),
    )
}

// =============================================================================
// Inventory hygiene
// =============================================================================

/// Build the catalog hygiene artifact: three sections of flagged
/// products, one per maintenance view, each already sorted by title.
///
/// # Errors
///
/// Returns a CSV error if serialization fails.
pub fn hygiene_report(
    findings: &CatalogFindings,
    generated_at: DateTime<Utc>,
) -> Result<CsvArtifact, ReportError> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    let sections: [(&str, &[FlaggedProduct]); 3] = [
        (
            "NEGATIVE INVENTORY, NOTHING COMMITTED",
            &findings.negative_without_commitments,
        ),
        (
            "ACTIVE WITHOUT COLLECTIONS",
            &findings.active_without_collections,
        ),
        (
            "OUT OF STOCK WITH COMMITMENTS",
            &findings.out_of_stock_committed,
        ),
    ];

    for (heading, rows) in sections {
        writer.write_record([heading])?;
        writer.write_record(HYGIENE_COLUMNS)?;
        for row in rows {
            writer.write_record([
                row.title.clone(),
                row.vendor.clone(),
                row.collections.join(", "),
                row.total_inventory.map(|i| i.to_string()).unwrap_or_default(),
                row.committed.to_string(),
                row.incoming.to_string(),
            ])?;
        }
        writer.write_record([""])?;
    }

    finish(
        writer,
        format!("inventory_hygiene_{}.csv", filename_stamp(generated_at)),
    )
}

/// Build the fully-shippable order list, already sorted oldest first.
///
/// # Errors
///
/// Returns a CSV error if serialization fails.
pub fn shippable_orders(
    orders: &[ShippableOrder],
    generated_at: DateTime<Utc>,
) -> Result<CsvArtifact, ReportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(SHIPPABLE_COLUMNS)?;

    for order in orders {
        writer.write_record([
            order.order_name.clone(),
            order.processed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            eastern(order.processed_at)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            order.lines.to_string(),
            order.units.to_string(),
        ])?;
    }

    finish(
        writer,
        format!("shippable_orders_{}.csv", filename_stamp(generated_at)),
    )
}

fn finish(writer: csv::Writer<Vec<u8>>, filename: String) -> Result<CsvArtifact, ReportError> {
    let content = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(CsvArtifact { filename, content })
}
