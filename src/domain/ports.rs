use super::employee::Employee;
use super::month::MonthKey;
use super::payment::{NewPaymentRecord, PaymentPatch, PaymentRecord, PaymentUpdate};
use super::transfer::{RecipientRequest, TransferReceipt};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The system of record for disbursement attempts.
///
/// Implementations must make `create` and `update_by_transfer_code` atomic
/// read-modify-write operations.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Assigns `id` and `created_at` and stores the record. Never overwrites:
    /// a reused transfer code is a `Conflict`, a second `success` record for
    /// the same employee and month is `AlreadyPaid`.
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord>;

    async fn find_by_employee_and_month(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> Result<Vec<PaymentRecord>>;

    async fn find_by_transfer_code(&self, transfer_code: &str) -> Result<Option<PaymentRecord>>;

    /// `Ok(None)` when no record carries `transfer_code`. Moving a record to
    /// `success` while another record of the same employee and month is
    /// already `success` is `AlreadyPaid`.
    async fn update_by_transfer_code(
        &self,
        transfer_code: &str,
        patch: PaymentPatch,
    ) -> Result<Option<PaymentUpdate>>;
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Employee>>;
    /// All employees, in directory order.
    async fn list(&self) -> Result<Vec<Employee>>;
}

/// Client for the transfer provider. Every call is a blocking round-trip;
/// a `Gateway` error covers both "no response" and a provider-reported failure.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn create_recipient(&self, recipient: &RecipientRequest) -> Result<String>;

    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<TransferReceipt>;

    async fn get_transfer_status(&self, transfer_code: &str) -> Result<serde_json::Value>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedLedger = Arc<dyn PaymentLedger>;
pub type SharedDirectory = Arc<dyn EmployeeDirectory>;
pub type SharedGateway = Arc<dyn TransferGateway>;
pub type SharedClock = Arc<dyn Clock>;
