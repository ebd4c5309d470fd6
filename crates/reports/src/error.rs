//! Top-level error type for report runs.

use thiserror::Error;

use crate::calendar::CalendarError;
use crate::config::ConfigError;
use crate::emit::email::EmailError;
use crate::shopify::ShopifyError;
use crate::window::WindowError;

/// Any failure surfaced by a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operator-supplied date overrides that cannot form a window.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
}
