use crate::domain::employee::Employee;
use crate::domain::month::MonthKey;
use crate::domain::payment::{NewPaymentRecord, PaymentPatch, PaymentRecord, PaymentStatus, PaymentUpdate};
use crate::domain::ports::{Clock, EmployeeDirectory, PaymentLedger, SharedClock};
use crate::error::{DisbursementError, Result};
use crate::infrastructure::clock::SystemClock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    /// Records in insertion order.
    records: Vec<PaymentRecord>,
    /// transfer_code -> position in `records`.
    by_transfer_code: HashMap<String, usize>,
}

/// A thread-safe in-memory payment ledger.
///
/// Every instance owns its own state; clones share it. Writes happen under a
/// single write lock, so `create` and `update_by_transfer_code` are atomic.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    clock: SharedClock,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Creates a new, empty ledger stamped with wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            clock,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord> {
        let mut state = self.state.write().await;
        let record = record.into_record(self.clock.now());

        if !record.transfer_code.is_empty() && state.by_transfer_code.contains_key(&record.transfer_code) {
            return Err(DisbursementError::Conflict(format!(
                "transfer code {} already recorded",
                record.transfer_code
            )));
        }

        if record.status == PaymentStatus::Success {
            let month = MonthKey::of(record.created_at);
            let already_paid = state.records.iter().any(|r| {
                r.employee_id == record.employee_id
                    && r.status == PaymentStatus::Success
                    && month.contains(r.created_at)
            });
            if already_paid {
                return Err(DisbursementError::AlreadyPaid {
                    employee_id: record.employee_id,
                    month,
                });
            }
        }

        if !record.transfer_code.is_empty() {
            let position = state.records.len();
            state.by_transfer_code.insert(record.transfer_code.clone(), position);
        }
        state.records.push(record.clone());
        Ok(record)
    }

    async fn find_by_employee_and_month(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.employee_id == employee_id && month.contains(r.created_at))
            .cloned()
            .collect())
    }

    async fn find_by_transfer_code(&self, transfer_code: &str) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .by_transfer_code
            .get(transfer_code)
            .and_then(|&i| state.records.get(i))
            .cloned())
    }

    async fn update_by_transfer_code(
        &self,
        transfer_code: &str,
        patch: PaymentPatch,
    ) -> Result<Option<PaymentUpdate>> {
        let mut state = self.state.write().await;
        let Some(&position) = state.by_transfer_code.get(transfer_code) else {
            return Ok(None);
        };
        let Some(record) = state.records.get(position) else {
            return Ok(None);
        };

        if patch.status == PaymentStatus::Success && record.status != PaymentStatus::Success {
            let month = MonthKey::of(record.created_at);
            let already_paid = state.records.iter().any(|r| {
                r.id != record.id
                    && r.employee_id == record.employee_id
                    && r.status == PaymentStatus::Success
                    && month.contains(r.created_at)
            });
            if already_paid {
                return Err(DisbursementError::AlreadyPaid {
                    employee_id: record.employee_id.clone(),
                    month,
                });
            }
        }

        // Work on a copy so a rejected transition leaves the stored record intact.
        let mut updated = record.clone();
        let changed = updated.apply(patch)?;
        state.records[position] = updated.clone();
        Ok(Some(PaymentUpdate {
            record: updated,
            changed,
        }))
    }
}

/// An employee directory held in memory, preserving insertion order.
#[derive(Default, Clone)]
pub struct InMemoryEmployeeDirectory {
    employees: Arc<RwLock<Vec<Employee>>>,
}

impl InMemoryEmployeeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_employees(employees: Vec<Employee>) -> Self {
        Self {
            employees: Arc::new(RwLock::new(employees)),
        }
    }

    /// Adds or replaces an employee; a replaced entry keeps its position.
    pub async fn insert(&self, employee: Employee) {
        let mut employees = self.employees.write().await;
        match employees.iter_mut().find(|e| e.id == employee.id) {
            Some(existing) => *existing = employee,
            None => employees.push(employee),
        }
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryEmployeeDirectory {
    async fn get_by_id(&self, id: &str) -> Result<Option<Employee>> {
        let employees = self.employees.read().await;
        Ok(employees.iter().find(|e| e.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Employee>> {
        Ok(self.employees.read().await.clone())
    }
}
