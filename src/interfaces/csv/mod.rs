pub mod employee_reader;
pub mod payout_writer;
