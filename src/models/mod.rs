//! Domain model module declarations.

pub mod client;
pub mod ledger;
pub mod task;
