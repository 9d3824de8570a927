//! Services for cleaning-service.

pub mod database;
pub mod gateway;
pub mod invoicing;
pub mod metrics;
pub mod payments;

pub use database::Database;
pub use gateway::GatewayClient;
pub use invoicing::{DateSequenceNumbering, InvoiceNumbering, InvoiceParams};
