//! Input/output adapters at the edge of the crate.

pub mod csv;
