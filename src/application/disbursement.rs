use crate::domain::month::MonthKey;
use crate::domain::payment::{NewPaymentRecord, PaymentStatus};
use crate::domain::ports::{Clock, SharedClock, SharedDirectory, SharedGateway, SharedLedger};
use crate::domain::transfer::{PayoutOutcome, RecipientRequest, TransferResult};
use crate::error::{DisbursementError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per employee id, handed out on demand.
#[derive(Default)]
pub struct EmployeeLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EmployeeLocks {
    pub async fn acquire(&self, employee_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(employee_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Pays salaries through the transfer provider and records every attempt.
///
/// At most one successful payment per employee per calendar month (UTC).
/// Concurrent calls for the same employee are serialized from the ledger
/// check through the ledger write.
pub struct DisbursementOrchestrator {
    directory: SharedDirectory,
    ledger: SharedLedger,
    gateway: SharedGateway,
    clock: SharedClock,
    currency: String,
    locks: EmployeeLocks,
}

impl DisbursementOrchestrator {
    pub fn new(
        directory: SharedDirectory,
        ledger: SharedLedger,
        gateway: SharedGateway,
        clock: SharedClock,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            ledger,
            gateway,
            clock,
            currency: currency.into(),
            locks: EmployeeLocks::default(),
        }
    }

    /// Pays one employee their salary for the current month.
    ///
    /// Creating the recipient and initiating the transfer are not compensated:
    /// if the transfer fails after the recipient exists, nothing is persisted
    /// and the recipient is left in place.
    pub async fn pay_employee(&self, employee_id: &str) -> Result<TransferResult> {
        let employee = self
            .directory
            .get_by_id(employee_id)
            .await?
            .ok_or_else(|| DisbursementError::NotFound(format!("Employee {employee_id}")))?;

        let _guard = self.locks.acquire(employee_id).await;

        let month = MonthKey::of(self.clock.now());
        let existing = self.ledger.find_by_employee_and_month(employee_id, month).await?;
        if existing.iter().any(|r| r.status == PaymentStatus::Success) {
            return Err(DisbursementError::AlreadyPaid {
                employee_id: employee_id.to_string(),
                month,
            });
        }

        let recipient = RecipientRequest {
            name: employee.name.clone(),
            account_number: employee.account_number.clone(),
            bank_code: employee.bank_code.clone(),
            currency: self.currency.clone(),
        };
        let recipient_code = self.gateway.create_recipient(&recipient).await?;

        let reason = format!("Salary for {month}");
        let receipt = self
            .gateway
            .initiate_transfer(&recipient_code, employee.salary_amount, &reason)
            .await?;

        let status = receipt.initial_status();
        let amount = receipt.amount.unwrap_or(employee.salary_amount);
        let record = self
            .ledger
            .create(NewPaymentRecord {
                employee_id: employee_id.to_string(),
                transfer_code: receipt.transfer_code.clone(),
                amount,
                status,
                paid_at: (status == PaymentStatus::Success).then(|| self.clock.now()),
                metadata: receipt.raw,
            })
            .await?;

        tracing::info!(
            employee_id,
            transfer_code = %record.transfer_code,
            status = %record.status,
            %amount,
            "salary transfer recorded"
        );

        Ok(TransferResult {
            transfer_code: record.transfer_code,
            status,
            recipient: recipient_code,
            amount,
        })
    }

    /// Pays every employee in directory order. A failure for one employee is
    /// recorded in its entry and does not stop the run.
    pub async fn pay_all(&self) -> Result<Vec<PayoutOutcome>> {
        let employees = self.directory.list().await?;
        let mut outcomes = Vec::with_capacity(employees.len());

        for employee in employees {
            let result = self.pay_employee(&employee.id).await;
            let outcome = match result {
                Ok(result) => PayoutOutcome::Paid {
                    employee_id: employee.id,
                    result,
                },
                Err(e) => {
                    tracing::warn!(employee_id = %employee.id, error = %e, "salary payment failed");
                    PayoutOutcome::Failed {
                        employee_id: employee.id,
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// The provider's current view of a transfer.
    pub async fn transfer_status(&self, transfer_code: &str) -> Result<serde_json::Value> {
        if transfer_code.trim().is_empty() {
            return Err(DisbursementError::Validation("transfer code is required".to_string()));
        }
        self.gateway.get_transfer_status(transfer_code).await
    }
}
