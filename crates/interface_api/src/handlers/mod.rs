//! Request handlers

pub mod health;
pub mod adjudication;
pub mod invoices;
pub mod insurance;
