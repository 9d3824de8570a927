//! Data models for cleaning-service.

pub mod agent;
pub mod carpet;
pub mod catalog;
pub mod client;
pub mod commission;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod tax_setting;

pub use agent::*;
pub use carpet::*;
pub use catalog::*;
pub use client::*;
pub use commission::*;
pub use invoice::*;
pub use order::*;
pub use payment::*;
pub use tax_setting::*;
