use crate::domain::month::MonthKey;
use crate::domain::payment::{NewPaymentRecord, PaymentPatch, PaymentRecord, PaymentStatus, PaymentUpdate};
use crate::domain::ports::{Clock, PaymentLedger, SharedClock};
use crate::error::{DisbursementError, Result};
use crate::infrastructure::clock::SystemClock;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding serialized payment records, keyed by record id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping transfer codes to record ids.
pub const CF_TRANSFER_CODES: &str = "transfer_codes";
/// Column Family indexing records by `employee_id \0 created_at \0 id`.
pub const CF_EMPLOYEE_MONTHS: &str = "employee_months";

/// A persistent payment ledger backed by RocksDB.
///
/// Records live in one column family; two index families serve the
/// transfer-code and employee/month lookups. Every write goes through a
/// single writer lock and lands as one `WriteBatch`, so a record and its
/// index entries are never observed half-written.
///
/// `Clone` shares the underlying `Arc<DB>` and the writer lock.
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
    clock: SharedClock,
}

impl RocksDbLedger {
    /// Opens or creates a ledger at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: SharedClock) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_PAYMENTS, CF_TRANSFER_CODES, CF_EMPLOYEE_MONTHS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
            clock,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DisbursementError::internal(format!("{name} column family not found")))
    }

    fn get_record(&self, id: &[u8]) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn record_id_for(&self, transfer_code: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(CF_TRANSFER_CODES)?;
        Ok(self.db.get_cf(cf, transfer_code.as_bytes())?)
    }

    fn scan_employee(&self, employee_id: &str, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<PaymentRecord>> {
        let cf = self.cf(CF_EMPLOYEE_MONTHS)?;
        let lower = index_bound(employee_id, from);
        let upper = index_bound(employee_id, until);

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&lower, Direction::Forward)) {
            let (key, id) = item?;
            if key.as_ref() >= upper.as_slice() {
                break;
            }
            if let Some(record) = self.get_record(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn put_record(&self, batch: &mut WriteBatch, record: &PaymentRecord) -> Result<()> {
        let cf = self.cf(CF_PAYMENTS)?;
        batch.put_cf(cf, record.id.as_bytes(), encode(record)?);
        Ok(())
    }
}

/// Index timestamps are written with a fixed width so byte order matches
/// chronological order.
fn index_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn index_bound(employee_id: &str, at: DateTime<Utc>) -> Vec<u8> {
    format!("{employee_id}\0{}\0", index_timestamp(at)).into_bytes()
}

fn index_key(record: &PaymentRecord) -> Vec<u8> {
    let mut key = index_bound(&record.employee_id, record.created_at);
    key.extend_from_slice(record.id.as_bytes());
    key
}

fn encode(record: &PaymentRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        DisbursementError::Internal(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode(bytes: &[u8]) -> Result<PaymentRecord> {
    serde_json::from_slice(bytes).map_err(|e| {
        DisbursementError::Internal(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl PaymentLedger for RocksDbLedger {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord> {
        let _writer = self.writer.lock().await;
        let record = record.into_record(self.clock.now());

        if !record.transfer_code.is_empty() && self.record_id_for(&record.transfer_code)?.is_some() {
            return Err(DisbursementError::Conflict(format!(
                "transfer code {} already recorded",
                record.transfer_code
            )));
        }

        if record.status == PaymentStatus::Success {
            let month = MonthKey::of(record.created_at);
            let existing = self.scan_employee(&record.employee_id, month.start(), month.end())?;
            if existing.iter().any(|r| r.status == PaymentStatus::Success) {
                return Err(DisbursementError::AlreadyPaid {
                    employee_id: record.employee_id,
                    month,
                });
            }
        }

        let mut batch = WriteBatch::default();
        self.put_record(&mut batch, &record)?;
        if !record.transfer_code.is_empty() {
            batch.put_cf(
                self.cf(CF_TRANSFER_CODES)?,
                record.transfer_code.as_bytes(),
                record.id.as_bytes(),
            );
        }
        batch.put_cf(self.cf(CF_EMPLOYEE_MONTHS)?, index_key(&record), record.id.as_bytes());
        self.db.write(batch)?;

        Ok(record)
    }

    async fn find_by_employee_and_month(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> Result<Vec<PaymentRecord>> {
        self.scan_employee(employee_id, month.start(), month.end())
    }

    async fn find_by_transfer_code(&self, transfer_code: &str) -> Result<Option<PaymentRecord>> {
        match self.record_id_for(transfer_code)? {
            Some(id) => self.get_record(&id),
            None => Ok(None),
        }
    }

    async fn update_by_transfer_code(
        &self,
        transfer_code: &str,
        patch: PaymentPatch,
    ) -> Result<Option<PaymentUpdate>> {
        let _writer = self.writer.lock().await;

        let Some(id) = self.record_id_for(transfer_code)? else {
            return Ok(None);
        };
        let Some(mut record) = self.get_record(&id)? else {
            return Ok(None);
        };

        if patch.status == PaymentStatus::Success && record.status != PaymentStatus::Success {
            let month = MonthKey::of(record.created_at);
            let existing = self.scan_employee(&record.employee_id, month.start(), month.end())?;
            if existing
                .iter()
                .any(|r| r.id != record.id && r.status == PaymentStatus::Success)
            {
                return Err(DisbursementError::AlreadyPaid {
                    employee_id: record.employee_id,
                    month,
                });
            }
        }

        let changed = record.apply(patch)?;
        if changed {
            let mut batch = WriteBatch::default();
            self.put_record(&mut batch, &record)?;
            self.db.write(batch)?;
        }
        Ok(Some(PaymentUpdate { record, changed }))
    }
}
