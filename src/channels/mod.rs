//! External message channels behind narrow read-only traits.

pub mod email;
pub mod slack;

pub use email::{EmailMessage, GmailSource, MailSource};
pub use slack::{ChatMessage, ChatSource, SlackHistorySource};
