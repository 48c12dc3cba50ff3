use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A payee as supplied by the employee directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub account_number: String,
    pub bank_code: String,
    pub salary_amount: Decimal,
}
