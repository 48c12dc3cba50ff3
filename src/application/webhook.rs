use crate::domain::payment::{PaymentPatch, PaymentRecord, PaymentStatus};
use crate::domain::ports::{Clock, SharedClock, SharedLedger};
use crate::error::{DisbursementError, Result};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;
use subtle::ConstantTimeEq;

/// Header the provider puts the body signature in.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 of `payload` under `secret`.
pub fn sign(payload: &[u8], secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret).map_err(|e| DisbursementError::internal(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the HMAC-SHA512 of the exact raw `payload`.
///
/// An empty secret never verifies. The comparison is constant-time once the
/// lengths are known to match.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    try_verify_signature(payload, signature, secret).unwrap_or(false)
}

fn try_verify_signature(payload: &[u8], signature: &str, secret: &str) -> Result<bool> {
    if secret.is_empty() {
        return Ok(false);
    }
    let expected = sign(payload, secret.as_bytes())?;
    if expected.len() != signature.len() {
        return Ok(false);
    }
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

/// What the event receiver should answer the provider with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResponse {
    /// 200: the signature was valid, whatever happened afterwards.
    Acknowledged,
    /// 400: missing or invalid signature.
    InvalidSignature,
    /// 400: signed, but not a JSON document.
    InvalidPayload,
    /// 500: verification itself could not run.
    Error,
}

impl WebhookResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Acknowledged => 200,
            Self::InvalidSignature | Self::InvalidPayload => 400,
            Self::Error => 500,
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            Self::Acknowledged => "ok",
            Self::InvalidSignature => "Invalid signature",
            Self::InvalidPayload => "Invalid payload",
            Self::Error => "error",
        }
    }
}

/// Result of applying one event to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The record moved to a new status.
    Applied(PaymentRecord),
    /// The record was already in the event's status.
    Unchanged(PaymentRecord),
    /// No record carries the event's transfer code. Needs manual review.
    UnknownTransfer(String),
    /// Not a transfer event, or one this ledger cannot act on.
    Ignored(String),
}

/// Applies signed provider events to the payment ledger.
pub struct WebhookReconciler {
    ledger: SharedLedger,
    clock: SharedClock,
    secret: String,
}

impl WebhookReconciler {
    pub fn new(ledger: SharedLedger, clock: SharedClock, secret: impl Into<String>) -> Self {
        Self {
            ledger,
            clock,
            secret: secret.into(),
        }
    }

    /// `Err(Signature)` unless `signature` is present and matches the raw body.
    pub fn authenticate(&self, raw_body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(DisbursementError::Signature)?;
        if try_verify_signature(raw_body, signature, &self.secret)? {
            Ok(())
        } else {
            Err(DisbursementError::Signature)
        }
    }

    /// Entry point for the inbound event receiver.
    ///
    /// Only a bad signature or an unreadable body is rejected. Once the
    /// signature checks out, reconciliation failures are logged and the
    /// request is still acknowledged so the provider does not keep retrying.
    pub async fn handle(&self, raw_body: &[u8], signature: Option<&str>) -> WebhookResponse {
        match self.authenticate(raw_body, signature) {
            Ok(()) => {}
            Err(DisbursementError::Signature) => {
                tracing::warn!(header = SIGNATURE_HEADER, "webhook rejected: missing or invalid signature");
                return WebhookResponse::InvalidSignature;
            }
            Err(e) => {
                tracing::error!(error = %e, "webhook signature verification failed");
                return WebhookResponse::Error;
            }
        }

        let event: Value = match serde_json::from_slice(raw_body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "webhook rejected: unparsable payload");
                return WebhookResponse::InvalidPayload;
            }
        };

        match self.reconcile(&event).await {
            Ok(ReconcileOutcome::Applied(record)) => {
                tracing::info!(transfer_code = %record.transfer_code, status = %record.status, "reconciled transfer");
            }
            Ok(ReconcileOutcome::Unchanged(record)) => {
                tracing::debug!(transfer_code = %record.transfer_code, status = %record.status, "duplicate transfer event");
            }
            Ok(ReconcileOutcome::UnknownTransfer(code)) => {
                tracing::warn!(transfer_code = %code, "transfer record not found, needs manual review");
            }
            Ok(ReconcileOutcome::Ignored(reason)) => {
                tracing::debug!(%reason, "webhook event ignored");
            }
            Err(e) => {
                tracing::error!(error = %e, "webhook reconciliation error");
            }
        }

        WebhookResponse::Acknowledged
    }

    /// Applies a parsed event to the ledger. Replaying an event is a no-op.
    pub async fn reconcile(&self, event: &Value) -> Result<ReconcileOutcome> {
        let name = event.get("event").and_then(Value::as_str).unwrap_or_default();
        if !name.starts_with("transfer") {
            return Ok(ReconcileOutcome::Ignored(format!("event {name:?} is not a transfer event")));
        }

        let data = event.get("data").cloned().unwrap_or(Value::Null);
        let transfer_code = ["transfer_code", "reference"]
            .iter()
            .filter_map(|field| data.get(field).and_then(Value::as_str))
            .find(|code| !code.is_empty());
        let Some(transfer_code) = transfer_code else {
            return Ok(ReconcileOutcome::Ignored(format!("event {name:?} carries no transfer code")));
        };

        let raw_status = data.get("status").and_then(Value::as_str).unwrap_or_default();
        let status = match raw_status.parse::<PaymentStatus>() {
            Ok(status) => status,
            Err(_) => {
                return Ok(ReconcileOutcome::Ignored(format!(
                    "transfer {transfer_code} reported unsupported status {raw_status:?}"
                )));
            }
        };

        let Some(existing) = self.ledger.find_by_transfer_code(transfer_code).await? else {
            return Ok(ReconcileOutcome::UnknownTransfer(transfer_code.to_string()));
        };
        if existing.status == status {
            return Ok(ReconcileOutcome::Unchanged(existing));
        }

        let patch = PaymentPatch {
            status,
            paid_at: (status == PaymentStatus::Success).then(|| self.clock.now()),
            metadata: event.clone(),
        };
        match self.ledger.update_by_transfer_code(transfer_code, patch).await? {
            Some(update) if update.changed => Ok(ReconcileOutcome::Applied(update.record)),
            Some(update) => Ok(ReconcileOutcome::Unchanged(update.record)),
            None => Ok(ReconcileOutcome::UnknownTransfer(transfer_code.to_string())),
        }
    }
}
