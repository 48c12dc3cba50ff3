#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payrun::application::disbursement::DisbursementOrchestrator;
use payrun::domain::employee::Employee;
use payrun::domain::ports::{SharedLedger, TransferGateway};
use payrun::domain::transfer::{RecipientRequest, TransferReceipt};
use payrun::error::{DisbursementError, Result};
use payrun::infrastructure::clock::FixedClock;
use payrun::infrastructure::in_memory::{InMemoryEmployeeDirectory, InMemoryLedger};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A transfer gateway that replays queued answers in order and records
/// every call it receives.
#[derive(Default)]
pub struct ScriptedGateway {
    recipients: Mutex<VecDeque<Result<String>>>,
    transfers: Mutex<VecDeque<Result<TransferReceipt>>>,
    pub recipient_calls: Mutex<Vec<RecipientRequest>>,
    pub transfer_calls: Mutex<Vec<(String, Decimal, String)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recipient_ok(&self, code: &str) -> &Self {
        self.recipients.lock().unwrap().push_back(Ok(code.to_string()));
        self
    }

    pub fn recipient_err(&self, message: &str) -> &Self {
        self.recipients
            .lock()
            .unwrap()
            .push_back(Err(DisbursementError::Gateway(message.to_string())));
        self
    }

    pub fn transfer_ok(&self, data: Value) -> &Self {
        let receipt = payrun::infrastructure::paystack::transfer_receipt(data);
        self.transfers.lock().unwrap().push_back(receipt);
        self
    }

    pub fn transfer_err(&self, message: &str) -> &Self {
        self.transfers
            .lock()
            .unwrap()
            .push_back(Err(DisbursementError::Gateway(message.to_string())));
        self
    }

    pub fn recipient_call_count(&self) -> usize {
        self.recipient_calls.lock().unwrap().len()
    }

    pub fn transfer_call_count(&self) -> usize {
        self.transfer_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TransferGateway for ScriptedGateway {
    async fn create_recipient(&self, recipient: &RecipientRequest) -> Result<String> {
        self.recipient_calls.lock().unwrap().push(recipient.clone());
        self.recipients
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DisbursementError::Gateway("no scripted recipient".to_string())))
    }

    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<TransferReceipt> {
        self.transfer_calls
            .lock()
            .unwrap()
            .push((recipient_code.to_string(), amount, reason.to_string()));
        self.transfers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DisbursementError::Gateway("no scripted transfer".to_string())))
    }

    async fn get_transfer_status(&self, transfer_code: &str) -> Result<Value> {
        Ok(json!({"transfer_code": transfer_code, "status": "success"}))
    }
}

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn employee(id: &str, name: &str, salary: Decimal) -> Employee {
    Employee {
        id: id.to_string(),
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        account_number: "0123456789".to_string(),
        bank_code: "057".to_string(),
        salary_amount: salary,
    }
}

/// Everything a disbursement test needs, wired around one in-memory ledger.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub ledger: InMemoryLedger,
    pub gateway: Arc<ScriptedGateway>,
    pub directory: InMemoryEmployeeDirectory,
    pub orchestrator: DisbursementOrchestrator,
}

impl Harness {
    pub fn new(now: &str, employees: Vec<Employee>) -> Self {
        let clock = Arc::new(FixedClock::new(at(now)));
        let ledger = InMemoryLedger::with_clock(clock.clone());
        let gateway = Arc::new(ScriptedGateway::new());
        let directory = InMemoryEmployeeDirectory::from_employees(employees);
        let orchestrator = DisbursementOrchestrator::new(
            Arc::new(directory.clone()),
            Arc::new(ledger.clone()) as SharedLedger,
            gateway.clone(),
            clock.clone(),
            "NGN",
        );
        Self {
            clock,
            ledger,
            gateway,
            directory,
            orchestrator,
        }
    }
}
