//! Persistence layer modules.

pub mod client_repo;
pub mod db;
pub mod ledger_repo;
pub mod schema;
pub mod task_repo;
