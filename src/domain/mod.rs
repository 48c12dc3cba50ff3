//! Domain types and the ports the application layer is written against.

pub mod employee;
pub mod month;
pub mod payment;
pub mod ports;
pub mod transfer;
