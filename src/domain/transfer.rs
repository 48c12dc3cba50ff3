use super::payment::PaymentStatus;
use rust_decimal::Decimal;
use serde::Serialize;

/// Destination details sent to the provider when creating a payee.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientRequest {
    pub name: String,
    pub account_number: String,
    pub bank_code: String,
    pub currency: String,
}

/// The provider's immediate answer to a transfer initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub transfer_code: String,
    pub status: Option<String>,
    pub amount: Option<Decimal>,
    /// The full `data` object as returned by the provider.
    pub raw: serde_json::Value,
}

impl TransferReceipt {
    /// Status the new ledger record starts in. Anything the provider reports
    /// other than `success` (`otp`, `received`, `queued`, ...) is still in flight.
    pub fn initial_status(&self) -> PaymentStatus {
        match self.status.as_deref().map(str::parse::<PaymentStatus>) {
            Some(Ok(PaymentStatus::Success)) => PaymentStatus::Success,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Outcome of a single successful disbursement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResult {
    pub transfer_code: String,
    pub status: PaymentStatus,
    pub recipient: String,
    pub amount: Decimal,
}

/// One entry of a batch run: either a disbursement or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PayoutOutcome {
    Paid {
        employee_id: String,
        #[serde(flatten)]
        result: TransferResult,
    },
    Failed {
        employee_id: String,
        error: String,
    },
}

impl PayoutOutcome {
    pub fn employee_id(&self) -> &str {
        match self {
            Self::Paid { employee_id, .. } | Self::Failed { employee_id, .. } => employee_id,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid { .. })
    }
}
