use crate::domain::month::MonthKey;
use crate::domain::payment::PaymentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisbursementError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Employee {employee_id} already paid for {month}")]
    AlreadyPaid { employee_id: String, month: MonthKey },
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("Invalid webhook signature")]
    Signature,
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl DisbursementError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into().into())
    }
}

pub type Result<T> = std::result::Result<T, DisbursementError>;
