use crate::domain::employee::Employee;
use crate::error::{DisbursementError, Result};
use std::io::Read;

/// Reads employee records from a CSV source.
///
/// Expected header: `id,name,email,account_number,bank_code,salary_amount`
/// (`email` may be empty). Whitespace around fields is trimmed.
pub struct EmployeeReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EmployeeReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes employees.
    pub fn employees(self) -> impl Iterator<Item = Result<Employee>> {
        self.reader.into_deserialize().map(|result| {
            let mut employee: Employee = result.map_err(DisbursementError::from)?;
            if employee.email.as_deref().is_some_and(str::is_empty) {
                employee.email = None;
            }
            if employee.id.is_empty() {
                return Err(DisbursementError::Validation("employee id is required".to_string()));
            }
            Ok(employee)
        })
    }

    /// Reads every employee, failing on the first malformed row.
    pub fn read_all(self) -> Result<Vec<Employee>> {
        self.employees().collect()
    }
}
