use crate::infrastructure::paystack::{DEFAULT_BASE_URL, PaystackGateway};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings shared by every subcommand. Each flag falls back to an
/// environment variable.
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    /// Employee directory CSV (id,name,email,account_number,bank_code,salary_amount)
    #[arg(long, env = "PAYRUN_EMPLOYEES", global = true)]
    pub employees: Option<PathBuf>,

    /// Path to persistent ledger (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYRUN_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Provider API secret key
    #[arg(long, env = "PAYSTACK_SECRET_KEY", default_value = "", hide_env_values = true, global = true)]
    pub secret_key: String,

    /// Shared secret used to sign inbound webhooks
    #[arg(long, env = "PAYSTACK_WEBHOOK_SECRET", default_value = "", hide_env_values = true, global = true)]
    pub webhook_secret: String,

    #[arg(long, env = "PAYSTACK_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Currency recipients are created in
    #[arg(long, env = "PAYRUN_CURRENCY", default_value = "NGN", global = true)]
    pub currency: String,

    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value_t = 10_000, global = true)]
    pub gateway_timeout_ms: u64,

    /// Retries for transfer status queries (never applied to transfers)
    #[arg(long, default_value_t = 3, global = true)]
    pub status_retries: usize,
}

impl AppConfig {
    pub fn gateway(&self) -> PaystackGateway {
        PaystackGateway {
            timeout: Duration::from_millis(self.gateway_timeout_ms),
            status_retries: self.status_retries,
            ..PaystackGateway::new(&self.base_url, &self.secret_key)
        }
    }
}
