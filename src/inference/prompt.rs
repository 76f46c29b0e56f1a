//! System prompt construction for task extraction.
//!
//! Pure and deterministic: the same inputs always produce the same text.

/// Channel-specific material folded into the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptContext {
    /// A chat message; the text itself arrives as the user turn.
    Chat,
    /// An email, whose subject and body are embedded in the prompt.
    Email {
        /// Subject header.
        subject: String,
        /// Decoded body text.
        body: String,
    },
}

impl PromptContext {
    fn medium(&self) -> &'static str {
        match self {
            Self::Chat => "a Slack message",
            Self::Email { .. } => "an email message",
        }
    }
}

const INSTRUCTIONS: &str = "\
Not every message contains a task. Each task is one the requester assigns to you.
If the message contains no task request, set \"title\" to an empty string.
If it contains a task request and you have all the information needed to finish it, put that information in the description field.
If information is missing, put a list of the questions you would ask the requester in the description field instead.
For example, for 'can you make a restaurant reservation for me?' you would need the time of the meal, the number of guests, and any dietary preferences before you could book.
Always respond with only a JSON object with exactly the keys \"title\", \"description\" and \"due_date\" (null when unknown). Do not include any other text.";

/// Build the system prompt for one inference call.
#[must_use]
pub fn build_system_prompt(profile: Option<&str>, context: &PromptContext) -> String {
    let mut prompt = format!(
        "You are a helpful assistant that extracts tasks from {}",
        context.medium()
    );

    match profile.map(str::trim).filter(|p| !p.is_empty()) {
        Some(profile) => {
            prompt.push_str(" for a requester with the following profile.\n\n");
            prompt.push_str("Requester profile:\n");
            prompt.push_str(profile);
            prompt.push_str(
                "\n\nTake the requester's expertise and preferences into account.\n\n",
            );
        }
        None => prompt.push_str(".\n\n"),
    }

    if let PromptContext::Email { subject, body } = context {
        prompt.push_str("The email subject is: ");
        prompt.push_str(subject);
        prompt.push_str("\nThe email body is: ");
        prompt.push_str(body);
        prompt.push_str("\n\n");
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}
