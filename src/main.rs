use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use payrun::application::disbursement::DisbursementOrchestrator;
use payrun::application::webhook::{WebhookReconciler, WebhookResponse};
use payrun::config::AppConfig;
use payrun::domain::month::MonthKey;
use payrun::domain::ports::{PaymentLedger, SharedClock, SharedLedger};
use payrun::infrastructure::clock::SystemClock;
use payrun::infrastructure::in_memory::{InMemoryEmployeeDirectory, InMemoryLedger};
use payrun::interfaces::csv::employee_reader::EmployeeReader;
use payrun::interfaces::csv::payout_writer::PayoutWriter;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Monthly salary disbursement and transfer reconciliation", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pay one employee for the current month.
    ///
    /// Without a persistent ledger (--db-path with the storage-rocksdb
    /// feature) earlier runs are not visible, so the once-per-month check
    /// only covers this invocation.
    Pay { employee_id: String },
    /// Pay every employee in the directory. Same ledger caveat as `pay`.
    PayAll,
    /// Ask the provider for a transfer's current status
    Status { transfer_code: String },
    /// Verify and apply a webhook body as the event receiver would.
    /// Only records in a persistent ledger can be reconciled across runs.
    Webhook {
        /// File holding the raw request body
        body: PathBuf,
        /// Value of the x-paystack-signature header
        #[arg(long)]
        signature: Option<String>,
    },
    /// List ledger records for an employee and month (YYYY-MM)
    Ledger { employee_id: String, month: MonthKey },
}

fn open_ledger(config: &AppConfig, clock: SharedClock) -> Result<SharedLedger> {
    match &config.db_path {
        Some(db_path) => open_persistent_ledger(db_path, clock),
        None => Ok(Arc::new(InMemoryLedger::with_clock(clock))),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent_ledger(db_path: &Path, clock: SharedClock) -> Result<SharedLedger> {
    let ledger = payrun::infrastructure::rocksdb::RocksDbLedger::open_with_clock(db_path, clock)
        .into_diagnostic()?;
    Ok(Arc::new(ledger))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent_ledger(db_path: &Path, clock: SharedClock) -> Result<SharedLedger> {
    tracing::warn!(
        db_path = %db_path.display(),
        "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage. Records and the once-per-month check last only for this run."
    );
    Ok(Arc::new(InMemoryLedger::with_clock(clock)))
}

fn load_directory(config: &AppConfig) -> Result<InMemoryEmployeeDirectory> {
    let Some(path) = &config.employees else {
        return Ok(InMemoryEmployeeDirectory::new());
    };
    let file = File::open(path).into_diagnostic()?;
    let employees = EmployeeReader::new(file).read_all().into_diagnostic()?;
    tracing::info!(count = employees.len(), "loaded employee directory");
    Ok(InMemoryEmployeeDirectory::from_employees(employees))
}

fn build_orchestrator(
    config: &AppConfig,
    ledger: SharedLedger,
    clock: SharedClock,
) -> Result<DisbursementOrchestrator> {
    let directory = Arc::new(load_directory(config)?);
    let gateway = Arc::new(config.gateway());
    Ok(DisbursementOrchestrator::new(
        directory,
        ledger,
        gateway,
        clock,
        config.currency.clone(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    // Composition root: every component gets its dependencies here, once.
    let clock: SharedClock = Arc::new(SystemClock);
    let ledger = open_ledger(&config, clock.clone())?;

    match cli.command {
        Command::Pay { employee_id } => {
            let orchestrator = build_orchestrator(&config, ledger, clock)?;
            let result = orchestrator.pay_employee(&employee_id).await.into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        }
        Command::PayAll => {
            let orchestrator = build_orchestrator(&config, ledger, clock)?;
            let outcomes = orchestrator.pay_all().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = PayoutWriter::new(stdout.lock());
            writer.write_outcomes(&outcomes).into_diagnostic()?;
        }
        Command::Status { transfer_code } => {
            let orchestrator = build_orchestrator(&config, ledger, clock)?;
            let status = orchestrator.transfer_status(&transfer_code).await.into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&status).into_diagnostic()?);
        }
        Command::Webhook { body, signature } => {
            let raw = std::fs::read(body).into_diagnostic()?;
            let reconciler = WebhookReconciler::new(ledger, clock, config.webhook_secret.clone());
            let response = reconciler.handle(&raw, signature.as_deref()).await;
            println!("{} {}", response.status_code(), response.body());
            if response != WebhookResponse::Acknowledged {
                std::process::exit(1);
            }
        }
        Command::Ledger { employee_id, month } => {
            let records = ledger
                .find_by_employee_and_month(&employee_id, month)
                .await
                .into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&records).into_diagnostic()?);
        }
    }

    Ok(())
}
