use crate::domain::transfer::PayoutOutcome;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PayoutRow<'a> {
    employee_id: &'a str,
    transfer_code: &'a str,
    status: &'a str,
    recipient: &'a str,
    amount: String,
    error: &'a str,
}

impl<'a> From<&'a PayoutOutcome> for PayoutRow<'a> {
    fn from(outcome: &'a PayoutOutcome) -> Self {
        match outcome {
            PayoutOutcome::Paid {
                employee_id,
                result,
            } => Self {
                employee_id,
                transfer_code: &result.transfer_code,
                status: result.status.as_str(),
                recipient: &result.recipient,
                amount: result.amount.normalize().to_string(),
                error: "",
            },
            PayoutOutcome::Failed { employee_id, error } => Self {
                employee_id,
                transfer_code: "",
                status: "",
                recipient: "",
                amount: String::new(),
                error,
            },
        }
    }
}

/// Writes batch payout results as CSV, one row per employee in run order.
pub struct PayoutWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PayoutWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_outcomes(&mut self, outcomes: &[PayoutOutcome]) -> Result<()> {
        if outcomes.is_empty() {
            self.writer.write_record([
                "employee_id",
                "transfer_code",
                "status",
                "recipient",
                "amount",
                "error",
            ])?;
        }
        for outcome in outcomes {
            self.writer.serialize(PayoutRow::from(outcome))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::transfer::TransferResult;
    use rust_decimal_macros::dec;

    fn render(outcomes: &[PayoutOutcome]) -> String {
        let mut buf = Vec::new();
        PayoutWriter::new(&mut buf).write_outcomes(outcomes).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_writes_paid_and_failed_rows_in_order() {
        let outcomes = vec![
            PayoutOutcome::Paid {
                employee_id: "e1".to_string(),
                result: TransferResult {
                    transfer_code: "TRF_1".to_string(),
                    status: PaymentStatus::Success,
                    recipient: "RCP_1".to_string(),
                    amount: dec!(150000.00),
                },
            },
            PayoutOutcome::Failed {
                employee_id: "e2".to_string(),
                error: "Gateway error: Invalid bank code".to_string(),
            },
        ];

        let out = render(&outcomes);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "employee_id,transfer_code,status,recipient,amount,error");
        assert_eq!(lines[1], "e1,TRF_1,success,RCP_1,150000,");
        assert_eq!(lines[2], "e2,,,,,Gateway error: Invalid bank code");
    }

    #[test]
    fn test_empty_run_still_has_header() {
        assert_eq!(
            render(&[]).trim_end(),
            "employee_id,transfer_code,status,recipient,amount,error"
        );
    }
}
