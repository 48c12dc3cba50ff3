use crate::domain::ports::TransferGateway;
use crate::domain::transfer::{RecipientRequest, TransferReceipt};
use crate::error::{DisbursementError, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// Paystack Transfers API client.
///
/// Only status queries are retried. Transfer initiation never is: a lost
/// response may still mean the money moved.
pub struct PaystackGateway {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
    /// Retries after the first status query attempt.
    pub status_retries: usize,
    /// First backoff delay; doubles on each retry.
    pub retry_min_delay: Duration,
    pub client: reqwest::Client,
}

/// Envelope every Paystack response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// Unwraps `data`, turning a missing payload or `status: false` into a
    /// gateway error carrying the provider's message.
    pub fn into_data(self, action: &str) -> Result<Value> {
        if !self.status {
            return Err(DisbursementError::Gateway(
                self.message.unwrap_or_else(|| format!("Failed to {action}")),
            ));
        }
        match self.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(DisbursementError::Gateway(format!(
                "No response from provider when attempting to {action}"
            ))),
        }
    }
}

#[derive(Serialize)]
struct CreateRecipientBody<'a> {
    r#type: &'static str,
    name: &'a str,
    account_number: &'a str,
    bank_code: &'a str,
    currency: &'a str,
}

#[derive(Serialize)]
struct InitiateTransferBody<'a> {
    source: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    recipient: &'a str,
    reason: &'a str,
}

#[derive(Deserialize)]
struct TransferData {
    #[serde(default)]
    transfer_code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
}

/// Reads the recipient code out of a create-recipient `data` payload.
pub fn recipient_code(data: &Value) -> Result<String> {
    data.get("recipient_code")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| DisbursementError::Gateway("provider response missing recipient_code".to_string()))
}

/// Builds a receipt from an initiate-transfer `data` payload.
pub fn transfer_receipt(data: Value) -> Result<TransferReceipt> {
    let parsed: TransferData = serde_json::from_value(data.clone())
        .map_err(|e| DisbursementError::Gateway(format!("unreadable transfer response: {e}")))?;
    let transfer_code = parsed
        .transfer_code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| DisbursementError::Gateway("provider response missing transfer_code".to_string()))?;

    Ok(TransferReceipt {
        transfer_code,
        status: parsed.status,
        amount: parsed.amount,
        raw: data,
    })
}

/// Failure of one status query, split by whether it is worth retrying.
#[derive(Debug)]
enum StatusError {
    /// Transport failure or a 5xx from the provider.
    Unavailable(String),
    Rejected(DisbursementError),
}

impl From<StatusError> for DisbursementError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Unavailable(message) => DisbursementError::Gateway(message),
            StatusError::Rejected(err) => err,
        }
    }
}

impl PaystackGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(10),
            status_retries: 3,
            retry_min_delay: Duration::from_millis(200),
            client: reqwest::Client::new(),
        }
    }

    /// Backoff for status queries.
    fn status_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_min_delay)
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.status_retries)
            .with_jitter()
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DisbursementError::Validation(format!("invalid provider base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DisbursementError::Validation("provider base url cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B, action: &str) -> Result<Value> {
        let resp = self
            .client
            .post(self.url(&[path])?)
            .bearer_auth(&self.secret_key)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DisbursementError::Gateway(format!("No response from provider when attempting to {action}: {e}")))?;
        read_envelope(resp, action).await
    }

    async fn fetch_status(&self, url: &Url) -> std::result::Result<Value, StatusError> {
        const ACTION: &str = "fetch transfer status";
        let resp = self
            .client
            .get(url.clone())
            .bearer_auth(&self.secret_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                StatusError::Unavailable(format!("No response from provider when attempting to {ACTION}: {e}"))
            })?;

        if resp.status().is_server_error() {
            return Err(StatusError::Unavailable(format!(
                "provider returned {} when attempting to {ACTION}",
                resp.status()
            )));
        }
        read_envelope(resp, ACTION).await.map_err(StatusError::Rejected)
    }
}

async fn read_envelope(resp: reqwest::Response, action: &str) -> Result<Value> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| DisbursementError::Gateway(format!("No response from provider when attempting to {action}: {e}")))?;

    match serde_json::from_str::<Envelope>(&body) {
        Ok(envelope) => envelope.into_data(action),
        Err(_) if status == StatusCode::OK => Err(DisbursementError::Gateway(format!(
            "No response from provider when attempting to {action}"
        ))),
        Err(_) => Err(DisbursementError::Gateway(format!(
            "provider returned {status}: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

#[async_trait]
impl TransferGateway for PaystackGateway {
    async fn create_recipient(&self, recipient: &RecipientRequest) -> Result<String> {
        let body = CreateRecipientBody {
            r#type: "nuban",
            name: &recipient.name,
            account_number: &recipient.account_number,
            bank_code: &recipient.bank_code,
            currency: &recipient.currency,
        };
        let data = self.post("transferrecipient", &body, "create recipient").await?;
        recipient_code(&data)
    }

    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<TransferReceipt> {
        let body = InitiateTransferBody {
            source: "balance",
            amount,
            recipient: recipient_code,
            reason,
        };
        let data = self.post("transfer", &body, "initiate transfer").await?;
        transfer_receipt(data)
    }

    async fn get_transfer_status(&self, transfer_code: &str) -> Result<Value> {
        let url = self.url(&["transfer", transfer_code])?;

        let status = (|| async { self.fetch_status(&url).await })
            .retry(self.status_backoff())
            .when(|e| matches!(e, StatusError::Unavailable(_)))
            .notify(|err, delay| {
                tracing::warn!(transfer_code, ?delay, error = ?err, "retrying transfer status query");
            })
            .await?;
        Ok(status)
    }
}
