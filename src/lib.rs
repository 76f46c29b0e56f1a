#![forbid(unsafe_code)]

//! `task-harvester`: infers tasks from Slack and email with an LLM and
//! serves them to a task board.

pub mod api;
pub mod channels;
pub mod config;
pub mod errors;
pub mod inference;
pub mod models;
pub mod persistence;
pub mod poller;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
