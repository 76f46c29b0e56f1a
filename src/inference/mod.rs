//! Task inference: prompt construction, model calls, and output normalization.

pub mod client;
pub mod normalizer;
pub mod prompt;

pub use client::{BoxFuture, OpenAiClient, TaskInference};
pub use normalizer::normalize;
pub use prompt::{build_system_prompt, PromptContext};
