//! Request and response bodies

pub mod adjudication;
pub mod invoice;
pub mod insurance;
