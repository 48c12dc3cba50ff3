//! Application layer: salary disbursement and webhook reconciliation.
//!
//! Both services receive their ledger, directory, gateway and clock at
//! construction; neither resolves a dependency at call time or reaches for
//! shared global state.

pub mod disbursement;
pub mod webhook;
