use crate::error::DisbursementError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a disbursement attempt.
///
/// Records start out `Pending` or `Success` (from the provider's immediate
/// answer) and move forward only:
///
/// ```text
/// pending -> success -> reversed
///    \
///     `---> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Reversed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Reversed => "reversed",
        }
    }

    /// Whether an inbound event may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Success) | (Self::Pending, Self::Failed) | (Self::Success, Self::Reversed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DisbursementError;

    /// Case-insensitive; the provider is not consistent about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "reversed" => Ok(Self::Reversed),
            other => Err(DisbursementError::Parse(format!(
                "unknown payment status {other:?}"
            ))),
        }
    }
}

/// One disbursement attempt, as persisted in the ledger.
///
/// Field names are part of the stored layout and must stay stable for
/// anything reading the ledger directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub employee_id: String,
    pub transfer_code: String,
    /// Provider currency unit, passed through unchanged.
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Latest raw provider payload for this record.
    pub metadata: serde_json::Value,
}

/// A record as handed to `PaymentLedger::create`, before the ledger
/// assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRecord {
    pub employee_id: String,
    pub transfer_code: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl NewPaymentRecord {
    pub fn into_record(self, created_at: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            employee_id: self.employee_id,
            transfer_code: self.transfer_code,
            amount: self.amount,
            status: self.status,
            paid_at: self.paid_at,
            created_at,
            metadata: self.metadata,
        }
    }
}

/// Fields an inbound status event may change.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPatch {
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// The stored record after `PaymentLedger::update_by_transfer_code`, and
/// whether that call changed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub record: PaymentRecord,
    pub changed: bool,
}

impl PaymentRecord {
    /// Merges `patch` into the record.
    ///
    /// Returns `Ok(false)` without touching anything when the record is already
    /// in the patched status, so replayed events are no-ops.
    pub fn apply(&mut self, patch: PaymentPatch) -> Result<bool, DisbursementError> {
        if self.status == patch.status {
            return Ok(false);
        }
        if !self.status.can_transition_to(patch.status) {
            return Err(DisbursementError::InvalidTransition {
                from: self.status,
                to: patch.status,
            });
        }

        self.status = patch.status;
        if patch.status == PaymentStatus::Success {
            self.paid_at = patch.paid_at;
        }
        self.metadata = patch.metadata;
        Ok(true)
    }
}
