//! Report artifact emission: CSV files and email delivery.

pub mod csv;
pub mod email;

pub use csv::{CsvArtifact, write_artifact};
pub use email::ReportMailer;
