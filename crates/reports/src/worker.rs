//! Postgres-backed report job worker.
//!
//! Jobs live in the `report_jobs` table and are claimed atomically with
//! `FOR UPDATE SKIP LOCKED`, so several workers can poll the same queue
//! without double-running a job. A job either completes with result
//! metadata or fails with an error message; there is no partial state.

use chrono::{DateTime, NaiveDate, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::{ConfigError, ReportsConfig};
use crate::error::ReportError;
use crate::run::{self, AuditOptions, DailySalesOptions, HygieneOptions, RunOutcome};

/// Job identifier for the daily sales report.
pub const DAILY_SALES_REPORT_ID: &str = "daily_sales";
/// Job identifier for the unfulfilled audit.
pub const UNFULFILLED_AUDIT_REPORT_ID: &str = "unfulfilled_audit";
/// Job identifier for the inventory hygiene report.
pub const INVENTORY_HYGIENE_REPORT_ID: &str = "inventory_hygiene";

/// A claimed row from `report_jobs`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportJob {
    /// Unique job ID.
    pub id: Uuid,
    /// Which report to run.
    pub report_id: String,
    /// JSONB run parameters.
    pub parameters: serde_json::Value,
    /// Current status.
    pub status: String,
    /// When the job was queued.
    pub created_at: DateTime<Utc>,
}

/// Optional overrides carried in the job's parameters column.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobParameters {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    lookback_days: Option<u64>,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
}

/// Polling worker that executes queued report jobs.
pub struct Worker {
    pool: PgPool,
    config: ReportsConfig,
}

impl Worker {
    /// Connect to the job database.
    ///
    /// # Errors
    ///
    /// Returns error if `DATABASE_URL` is not configured or the pool
    /// cannot connect.
    pub async fn connect(config: ReportsConfig) -> Result<Self, ReportError> {
        let database_url = config
            .database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self { pool, config })
    }

    /// Poll for jobs until the process is stopped.
    ///
    /// # Errors
    ///
    /// Only database connectivity failures propagate; individual job
    /// failures are recorded on the job row and polling continues.
    pub async fn run(&self) -> Result<(), ReportError> {
        info!(
            interval_secs = self.config.worker_poll_interval.as_secs(),
            "report worker started"
        );
        loop {
            let worked = self.poll_once().await?;
            // Drain the queue back-to-back; sleep only when idle.
            if !worked {
                tokio::time::sleep(self.config.worker_poll_interval).await;
            }
        }
    }

    /// Claim and execute at most one job. Returns whether a job ran.
    ///
    /// # Errors
    ///
    /// Returns error if claiming or updating the job row fails.
    pub async fn poll_once(&self) -> Result<bool, ReportError> {
        let Some(job) = claim_next_job(&self.pool).await? else {
            return Ok(false);
        };
        info!(job_id = %job.id, report_id = %job.report_id, "claimed report job");

        match self.execute(&job).await {
            Ok(outcome) => {
                let result = serde_json::to_value(&outcome)?;
                complete_job(&self.pool, job.id, &result).await?;
                info!(job_id = %job.id, "report job completed");
            }
            Err(err) => {
                error!(job_id = %job.id, %err, "report job failed");
                fail_job(&self.pool, job.id, &err.to_string()).await?;
            }
        }
        Ok(true)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, report_id = %job.report_id))]
    async fn execute(&self, job: &ReportJob) -> Result<RunOutcome, ReportError> {
        let params: JobParameters = serde_json::from_value(job.parameters.clone())?;

        match job.report_id.as_str() {
            DAILY_SALES_REPORT_ID => {
                let explicit_dates = params.start_date.is_some();
                let options = DailySalesOptions {
                    start_date: params.start_date,
                    end_date: params.end_date,
                    dry_run: false,
                    no_email: false,
                    // Scheduled runs skip closed days; date overrides force a run.
                    skip_closed_days: !explicit_dates,
                };
                run::run_daily_sales(&self.config, &options).await
            }
            UNFULFILLED_AUDIT_REPORT_ID => {
                let options = AuditOptions {
                    lookback_days: params
                        .lookback_days
                        .unwrap_or(run::DEFAULT_AUDIT_LOOKBACK_DAYS),
                    since: params.since,
                    until: params.until,
                    dry_run: false,
                    no_email: false,
                };
                run::run_unfulfilled_audit(&self.config, &options).await
            }
            INVENTORY_HYGIENE_REPORT_ID => {
                let options = HygieneOptions {
                    lookback_days: params
                        .lookback_days
                        .unwrap_or(run::DEFAULT_AUDIT_LOOKBACK_DAYS),
                    dry_run: false,
                    no_email: false,
                };
                run::run_inventory_hygiene(&self.config, &options).await
            }
            other => Err(ReportError::InvalidDateRange(format!(
                "unknown report id: {other}"
            ))),
        }
    }
}

// =============================================================================
// Queue operations
// =============================================================================

/// Atomically claim the oldest queued job, if any.
///
/// # Errors
///
/// Returns error if the query fails.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<ReportJob>, sqlx::Error> {
    sqlx::query_as::<_, ReportJob>(
        r"
        UPDATE report_jobs
        SET status = 'running', started_at = now()
        WHERE id = (
            SELECT id FROM report_jobs
            WHERE status = 'queued'
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, report_id, parameters, status, created_at
        ",
    )
    .fetch_optional(pool)
    .await
}

/// Mark a job completed with its result metadata.
///
/// # Errors
///
/// Returns error if the update fails.
pub async fn complete_job(
    pool: &PgPool,
    id: Uuid,
    result: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE report_jobs
        SET status = 'completed', completed_at = now(), result = $2
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(result)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job failed with its error message.
///
/// # Errors
///
/// Returns error if the update fails.
pub async fn fail_job(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE report_jobs
        SET status = 'failed', completed_at = now(), error = $2
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Queue a new job. Used by operational tooling and tests.
///
/// # Errors
///
/// Returns error if the insert fails.
pub async fn enqueue_job(
    pool: &PgPool,
    report_id: &str,
    parameters: &serde_json::Value,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r"
        INSERT INTO report_jobs (report_id, parameters, status)
        VALUES ($1, $2, 'queued')
        RETURNING id
        ",
    )
    .bind(report_id)
    .bind(parameters)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_job_parameters_default_when_empty() {
        let params: JobParameters = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.start_date.is_none());
        assert!(params.lookback_days.is_none());
    }

    #[test]
    fn test_job_parameters_parse_date_overrides() {
        let params: JobParameters = serde_json::from_value(serde_json::json!({
            "start_date": "2025-06-03",
            "end_date": "2025-06-04"
        }))
        .unwrap();
        assert_eq!(
            params.start_date,
            NaiveDate::from_ymd_opt(2025, 6, 3)
        );
        assert_eq!(
            params.end_date,
            NaiveDate::from_ymd_opt(2025, 6, 4)
        );
    }

    #[test]
    fn test_job_parameters_ignore_unknown_keys() {
        let params: JobParameters = serde_json::from_value(serde_json::json!({
            "lookback_days": 30,
            "requested_by": "ops"
        }))
        .unwrap();
        assert_eq!(params.lookback_days, Some(30));
    }
}
