//! Marginalia CLI - manual report runs and the job worker.
//!
//! # Usage
//!
//! ```bash
//! # Run the daily sales report for the calendar-resolved window
//! mgl-cli daily-sales
//!
//! # Re-run a specific trading-day range
//! mgl-cli daily-sales --start-date 2025-06-07 --end-date 2025-06-08
//!
//! # Run the unfulfilled audit over the default 60-day lookback
//! mgl-cli unfulfilled
//!
//! # Run the inventory hygiene report
//! mgl-cli hygiene
//!
//! # Start the job worker (requires DATABASE_URL)
//! mgl-cli worker
//! ```
//!
//! # Commands
//!
//! - `daily-sales` - Run the daily sales report
//! - `unfulfilled` - Run the unfulfilled audit
//! - `hygiene` - Run the inventory hygiene report
//! - `worker` - Poll the job queue and execute queued reports
//! - `migrate` - Run job-queue database migrations

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use marginalia_reports::ReportsConfig;
use marginalia_reports::run::{
    AuditOptions, DEFAULT_AUDIT_LOOKBACK_DAYS, DailySalesOptions, HygieneOptions, RunOutcome,
    run_daily_sales, run_inventory_hygiene, run_unfulfilled_audit,
};
use marginalia_reports::worker::Worker;

#[derive(Parser)]
#[command(name = "mgl-cli")]
#[command(author, version, about = "Marginalia reporting tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily sales report
    DailySales {
        /// First trading day (defaults to the calendar-resolved window)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last covered trading day, inclusive (defaults to the start date)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Compute only; write no files and send no email
        #[arg(long)]
        dry_run: bool,

        /// Write files but send no email
        #[arg(long)]
        no_email: bool,
    },
    /// Run the unfulfilled audit
    Unfulfilled {
        /// Lookback in days
        #[arg(long, default_value_t = DEFAULT_AUDIT_LOOKBACK_DAYS)]
        days: u64,

        /// First trading day of the lookback
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Last covered trading day, inclusive (defaults to today, ET)
        #[arg(long)]
        until: Option<NaiveDate>,

        /// Compute only; write no files and send no email
        #[arg(long)]
        dry_run: bool,

        /// Write files but send no email
        #[arg(long)]
        no_email: bool,
    },
    /// Run the inventory hygiene report
    Hygiene {
        /// Lookback in days for the shippable-order view
        #[arg(long, default_value_t = DEFAULT_AUDIT_LOOKBACK_DAYS)]
        days: u64,

        /// Compute only; write no files and send no email
        #[arg(long)]
        dry_run: bool,

        /// Write files but send no email
        #[arg(long)]
        no_email: bool,
    },
    /// Poll the job queue and execute queued reports
    Worker,
    /// Run job-queue database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReportsConfig::from_env()?;

    match cli.command {
        Commands::DailySales {
            start_date,
            end_date,
            dry_run,
            no_email,
        } => {
            let options = DailySalesOptions {
                start_date,
                end_date,
                dry_run,
                no_email,
                skip_closed_days: false,
            };
            report_outcome(run_daily_sales(&config, &options).await?);
        }
        Commands::Unfulfilled {
            days,
            since,
            until,
            dry_run,
            no_email,
        } => {
            let options = AuditOptions {
                lookback_days: days,
                since,
                until,
                dry_run,
                no_email,
            };
            report_outcome(run_unfulfilled_audit(&config, &options).await?);
        }
        Commands::Hygiene {
            days,
            dry_run,
            no_email,
        } => {
            let options = HygieneOptions {
                lookback_days: days,
                dry_run,
                no_email,
            };
            report_outcome(run_inventory_hygiene(&config, &options).await?);
        }
        Commands::Worker => {
            let worker = Worker::connect(config).await?;
            worker.run().await?;
        }
        Commands::Migrate => {
            let database_url = config.database_url.ok_or("DATABASE_URL is not set")?;
            let pool = sqlx::PgPool::connect(database_url.expose_secret()).await?;
            sqlx::migrate!("../reports/migrations").run(&pool).await?;
            tracing::info!("job-queue migrations complete");
        }
    }
    Ok(())
}

fn report_outcome(outcome: RunOutcome) {
    match &outcome {
        RunOutcome::Completed(summary) => {
            tracing::info!(
                products = summary.products,
                files = ?summary.files,
                emailed = summary.emailed,
                "report completed"
            );
        }
        RunOutcome::Skipped { reason } => {
            tracing::info!(%reason, "report skipped");
        }
    }
}
