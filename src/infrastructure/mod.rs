//! Adapters behind the domain ports: ledgers, the employee directory, the
//! provider client and clocks.

pub mod clock;
pub mod in_memory;
pub mod paystack;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
