//! Report runners: resolve the window, fetch, compute, emit.
//!
//! A run either completes fully (artifacts on disk, email sent) or
//! fails with no partial output; scheduled runs on closed days skip
//! with a reason instead of producing an empty report.

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::aggregate::{ExclusionList, aggregate};
use crate::calendar::{BusinessCalendar, CalendarConfig, ReportingWindow};
use crate::config::ReportsConfig;
use crate::emit::csv::{self, CsvArtifact};
use crate::emit::email::{EmailError, ReportMailer};
use crate::error::ReportError;
use crate::hygiene::{audit_catalog, fully_shippable_orders};
use crate::risk::{classify_risk, mixed_availability_orders};
use crate::shopify::{
    ReportsClient, fetch_catalog_products, fetch_product_snapshots, fetch_sales_orders,
    fetch_unfulfilled_lines,
};
use crate::window::{REPORTING_TIMEZONE, TimeWindow};

/// Default lookback for the unfulfilled audit.
pub const DEFAULT_AUDIT_LOOKBACK_DAYS: u64 = 60;

/// Options for a daily sales run.
#[derive(Debug, Clone, Default)]
pub struct DailySalesOptions {
    /// Explicit first trading day (bypasses the calendar).
    pub start_date: Option<NaiveDate>,
    /// Explicit last trading day (defaults to `start_date`).
    pub end_date: Option<NaiveDate>,
    /// Compute only; write no files and send no email.
    pub dry_run: bool,
    /// Write files but send no email.
    pub no_email: bool,
    /// Skip (rather than run) when today is not an open business day.
    /// Set for scheduled runs; manual runs always execute.
    pub skip_closed_days: bool,
}

/// Options for an unfulfilled audit run.
///
/// Date overrides use the same convention as the daily sales report:
/// both bounds name covered trading days, inclusive.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// Lookback in trading days when no explicit range is given.
    pub lookback_days: u64,
    /// Explicit first trading day of the lookback.
    pub since: Option<NaiveDate>,
    /// Explicit last covered trading day (defaults to today, ET).
    pub until: Option<NaiveDate>,
    /// Compute only; write no files and send no email.
    pub dry_run: bool,
    /// Write files but send no email.
    pub no_email: bool,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_AUDIT_LOOKBACK_DAYS,
            since: None,
            until: None,
            dry_run: false,
            no_email: false,
        }
    }
}

/// Options for an inventory hygiene run.
#[derive(Debug, Clone)]
pub struct HygieneOptions {
    /// Lookback in trading days for the shippable-order view.
    pub lookback_days: u64,
    /// Compute only; write no files and send no email.
    pub dry_run: bool,
    /// Write files but send no email.
    pub no_email: bool,
}

impl Default for HygieneOptions {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_AUDIT_LOOKBACK_DAYS,
            dry_run: false,
            no_email: false,
        }
    }
}

/// What a run produced, serialized into the job result column.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped { reason: String },
}

/// Counts and artifact paths from a completed run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfulfilled_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_products: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged_products: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shippable_orders: Option<usize>,
    pub products: usize,
    pub files: Vec<String>,
    pub emailed: bool,
}

/// Resolve a lookback range ending on `until` (or today when absent).
///
/// Both bounds are covered trading days, matching the daily sales
/// convention; the caller materializes the timestamps.
fn resolve_lookback_window(
    today: NaiveDate,
    lookback_days: u64,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> Result<ReportingWindow, ReportError> {
    let until = until.unwrap_or(today);
    let since = match since {
        Some(since) => since,
        None => until.checked_sub_days(Days::new(lookback_days)).ok_or_else(|| {
            ReportError::InvalidDateRange(format!(
                "lookback of {lookback_days} days before {until} is out of range"
            ))
        })?,
    };
    if until < since {
        return Err(ReportError::InvalidDateRange(format!(
            "until {until} precedes since {since}"
        )));
    }
    Ok(ReportingWindow { start: since, end: until })
}

/// Run the daily sales report.
///
/// The window comes from the business calendar unless explicit dates
/// are given. Fetches the window's paid orders, snapshots every product
/// touched, aggregates into the four buckets, and emits the CSV (plus
/// email unless suppressed).
///
/// # Errors
///
/// Any fetch, emit, or delivery failure aborts the run.
#[instrument(skip(config), fields(dry_run = options.dry_run))]
pub async fn run_daily_sales(
    config: &ReportsConfig,
    options: &DailySalesOptions,
) -> Result<RunOutcome, ReportError> {
    let calendar = BusinessCalendar::new(CalendarConfig::standard());
    let today = Utc::now().with_timezone(&REPORTING_TIMEZONE).date_naive();

    let window = match (options.start_date, options.end_date) {
        (Some(start), end) => {
            let end = end.unwrap_or(start);
            if end < start {
                return Err(ReportError::InvalidDateRange(format!(
                    "end date {end} precedes start date {start}"
                )));
            }
            ReportingWindow { start, end }
        }
        (None, Some(end)) => {
            return Err(ReportError::InvalidDateRange(format!(
                "end date {end} given without a start date"
            )));
        }
        (None, None) => {
            if options.skip_closed_days && !calendar.is_open(today) {
                info!(%today, "shop closed today; skipping scheduled daily sales run");
                return Ok(RunOutcome::Skipped {
                    reason: "non_business_day".to_string(),
                });
            }
            calendar.reporting_window(today)?
        }
    };
    let time_window = TimeWindow::materialize(&window)?;
    info!(start = %window.start, end = %window.end, "resolved daily sales window");

    let client = ReportsClient::new(&config.shopify);
    let orders = fetch_sales_orders(&client, &time_window).await?;

    let mut product_ids = Vec::new();
    for order in &orders {
        for line in &order.line_items {
            if let Some(id) = &line.product_id
                && !product_ids.contains(id)
            {
                product_ids.push(id.clone());
            }
        }
    }
    let snapshots = fetch_product_snapshots(&client, &product_ids).await;

    let buckets = aggregate(&orders, &snapshots, &ExclusionList::standard());
    let generated_at = Utc::now();
    let artifact = csv::daily_sales(&window, &buckets, generated_at)?;

    let mut summary = RunSummary {
        orders: Some(orders.len()),
        products: buckets.len(),
        ..RunSummary::default()
    };
    if options.dry_run {
        info!(orders = orders.len(), products = buckets.len(), "dry run; nothing written");
        return Ok(RunOutcome::Completed(summary));
    }

    let path = csv::write_artifact(&config.output_dir, &artifact)?;
    summary.files.push(path.display().to_string());

    let date_label = if window.start == window.end {
        window.start.to_string()
    } else {
        format!("{} to {}", window.start, window.end)
    };
    summary.emailed = deliver(
        config,
        options.no_email,
        &format!("Daily Sales Report - {date_label}"),
        &format!(
            "Daily sales for {date_label}: {} orders across {} products.",
            orders.len(),
            buckets.len()
        ),
        std::slice::from_ref(&artifact),
    )
    .await?;

    Ok(RunOutcome::Completed(summary))
}

/// Run the unfulfilled audit.
///
/// Covers the lookback window (or an explicit range), attaches a status
/// to every outstanding line, flags mixed-availability orders, and
/// builds the committed-inventory risk summary.
///
/// # Errors
///
/// Any fetch, emit, or delivery failure aborts the run.
#[instrument(skip(config), fields(dry_run = options.dry_run))]
pub async fn run_unfulfilled_audit(
    config: &ReportsConfig,
    options: &AuditOptions,
) -> Result<RunOutcome, ReportError> {
    let today = Utc::now().with_timezone(&REPORTING_TIMEZONE).date_naive();
    let window = resolve_lookback_window(
        today,
        options.lookback_days,
        options.since,
        options.until,
    )?;
    let (since, until) = (window.start, window.end);
    let time_window = TimeWindow::materialize(&window)?;
    info!(%since, %until, "resolved audit window");

    let client = ReportsClient::new(&config.shopify);
    let (lines, product_ids) = fetch_unfulfilled_lines(&client, &time_window).await?;
    let snapshots = fetch_product_snapshots(&client, &product_ids).await;

    let now = Utc::now();
    let mixed = mixed_availability_orders(&lines, &snapshots);
    let risks = classify_risk(&lines, &snapshots, now);

    let lines_artifact = csv::unfulfilled_lines(&lines, &snapshots, &mixed, now)?;
    let risk_artifact = csv::risk_summary(&risks, now)?;

    let mut summary = RunSummary {
        unfulfilled_lines: Some(lines.len()),
        risk_products: Some(risks.len()),
        products: snapshots.len(),
        ..RunSummary::default()
    };
    if options.dry_run {
        info!(lines = lines.len(), risks = risks.len(), "dry run; nothing written");
        return Ok(RunOutcome::Completed(summary));
    }

    let artifacts = [lines_artifact, risk_artifact];
    for artifact in &artifacts {
        let path = csv::write_artifact(&config.output_dir, artifact)?;
        summary.files.push(path.display().to_string());
    }

    summary.emailed = deliver(
        config,
        options.no_email,
        &format!("Unfulfilled Audit - {since} to {until}"),
        &format!(
            "Unfulfilled audit: {} outstanding lines, {} products at risk.",
            lines.len(),
            risks.len()
        ),
        &artifacts,
    )
    .await?;

    Ok(RunOutcome::Completed(summary))
}

/// Run the inventory hygiene report.
///
/// Scans the full catalog for the three maintenance views, then walks
/// the unfulfilled backlog over the lookback window to surface orders
/// that stock on hand could fully cover.
///
/// # Errors
///
/// Any fetch, emit, or delivery failure aborts the run.
#[instrument(skip(config), fields(dry_run = options.dry_run))]
pub async fn run_inventory_hygiene(
    config: &ReportsConfig,
    options: &HygieneOptions,
) -> Result<RunOutcome, ReportError> {
    let today = Utc::now().with_timezone(&REPORTING_TIMEZONE).date_naive();
    let window = resolve_lookback_window(today, options.lookback_days, None, None)?;
    let time_window = TimeWindow::materialize(&window)?;
    info!(since = %window.start, until = %window.end, "resolved hygiene lookback");

    let client = ReportsClient::new(&config.shopify);
    let catalog = fetch_catalog_products(&client).await?;
    let findings = audit_catalog(&catalog);

    let (lines, product_ids) = fetch_unfulfilled_lines(&client, &time_window).await?;
    let snapshots = fetch_product_snapshots(&client, &product_ids).await;
    let shippable = fully_shippable_orders(&lines, &snapshots);

    let generated_at = Utc::now();
    let findings_artifact = csv::hygiene_report(&findings, generated_at)?;
    let shippable_artifact = csv::shippable_orders(&shippable, generated_at)?;

    let mut summary = RunSummary {
        flagged_products: Some(findings.total()),
        shippable_orders: Some(shippable.len()),
        products: catalog.len(),
        ..RunSummary::default()
    };
    if options.dry_run {
        info!(
            flagged = findings.total(),
            shippable = shippable.len(),
            "dry run; nothing written"
        );
        return Ok(RunOutcome::Completed(summary));
    }

    let artifacts = [findings_artifact, shippable_artifact];
    for artifact in &artifacts {
        let path = csv::write_artifact(&config.output_dir, artifact)?;
        summary.files.push(path.display().to_string());
    }

    summary.emailed = deliver(
        config,
        options.no_email,
        &format!("Inventory Hygiene Report - {today}"),
        &format!(
            "Inventory hygiene: {} flagged products, {} fully shippable orders.",
            findings.total(),
            shippable.len()
        ),
        &artifacts,
    )
    .await?;

    Ok(RunOutcome::Completed(summary))
}

/// Send the report email if delivery is enabled and configured.
async fn deliver(
    config: &ReportsConfig,
    no_email: bool,
    subject: &str,
    body: &str,
    attachments: &[CsvArtifact],
) -> Result<bool, ReportError> {
    if no_email {
        return Ok(false);
    }
    let Some(email_config) = &config.email else {
        info!("email not configured; skipping delivery");
        return Ok(false);
    };

    let mailer = ReportMailer::new(email_config).map_err(EmailError::from)?;
    let html = format!("<p>{body}</p>");
    mailer.send_report(subject, body, &html, attachments).await?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_lookback_defaults_end_on_today() {
        let window =
            resolve_lookback_window(date(2025, 6, 10), 60, None, None).unwrap();
        assert_eq!(window.end, date(2025, 6, 10));
        assert_eq!(window.start, date(2025, 4, 11));
    }

    #[test]
    fn test_until_is_a_covered_day_like_daily_end_date() {
        // --until and the daily report's --end-date share one meaning:
        // the last trading day the window covers, inclusive.
        let window = resolve_lookback_window(
            date(2025, 6, 10),
            60,
            Some(date(2025, 6, 1)),
            Some(date(2025, 6, 3)),
        )
        .unwrap();
        assert_eq!(window, ReportingWindow { start: date(2025, 6, 1), end: date(2025, 6, 3) });

        let tw = TimeWindow::materialize(&window).unwrap();
        assert_eq!(tw.end.to_string(), "2025-06-04 09:59:59 EDT");

        let daily = TimeWindow::materialize(&ReportingWindow {
            start: date(2025, 6, 1),
            end: date(2025, 6, 3),
        })
        .unwrap();
        assert_eq!(tw, daily);
    }

    #[test]
    fn test_explicit_until_anchors_the_lookback() {
        let window =
            resolve_lookback_window(date(2025, 6, 10), 7, None, Some(date(2025, 6, 3))).unwrap();
        assert_eq!(window.start, date(2025, 5, 27));
        assert_eq!(window.end, date(2025, 6, 3));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = resolve_lookback_window(
            date(2025, 6, 10),
            60,
            Some(date(2025, 6, 5)),
            Some(date(2025, 6, 3)),
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::InvalidDateRange(_)));
    }
}
