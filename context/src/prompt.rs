//! Summarization prompt template.
//!
//! The template is fixed: a system message describing the chunked summary
//! task and the `[[[ ... ]]]` convention, parameterized only by the target
//! summary size, and a user message embedding the text. Summaries folded back
//! into a larger document are wrapped in those literal markers so the model
//! sees them in-band.

use brif_types::ChatMessage;

use crate::token_counter::Tokenizer;

pub const SUMMARY_OPEN: &str = "[[[";
pub const SUMMARY_CLOSE: &str = "]]]";

fn system_instruction(target_summary_tokens: u32) -> String {
    format!(
        r"The user is requesting a summary of a book. Because the book is too long to read at once, you are asked to summarize it one chunk at a time. If a chunk contains a section enclosed in three square brackets, such as
    [[[ some text ]]]
then that section is itself a summary of a larger chunk produced earlier. Give such enclosed summaries more weight than ordinary text, because each one stands for the entire passage it condenses.

Do not mention the chunks or passages used to divide the text for summarization. Make the summary as detailed as possible while staying within a limit of {target_summary_tokens} tokens."
    )
}

/// The two-message prompt sent for every summarization call.
#[must_use]
pub fn summary_prompt(text: &str, target_summary_tokens: u32) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_instruction(target_summary_tokens)),
        ChatMessage::user(format!("Summarize the following: {text}")),
    ]
}

/// Tokens occupied by the prompt with an empty text body.
///
/// Counts the JSON rendering of the messages so role names and message
/// structure are included in the overhead. Messages hold only strings, so
/// rendering does not fail in practice; if it ever does, the role and content
/// of each message are counted instead, which undercounts only the JSON
/// punctuation.
pub fn prompt_overhead<T: Tokenizer + ?Sized>(tokenizer: &T, target_summary_tokens: u32) -> u32 {
    let messages = summary_prompt("", target_summary_tokens);
    match serde_json::to_string(&messages) {
        Ok(rendered) => tokenizer.count(&rendered),
        Err(err) => {
            tracing::error!("Failed to render prompt for overhead count: {err}");
            messages
                .iter()
                .map(|message| {
                    tokenizer.count(message.role.as_str()) + tokenizer.count(&message.content)
                })
                .sum()
        }
    }
}

/// Mark `summary` as standing in for a whole passage.
#[must_use]
pub fn wrap_summary(summary: &str) -> String {
    format!("{SUMMARY_OPEN} {} {SUMMARY_CLOSE}", summary.trim())
}

/// Remove every summary marker from final output.
///
/// The padding space [`wrap_summary`] puts inside each marker goes with it;
/// any marker left without padding is removed on its own.
#[must_use]
pub fn strip_summary_markers(text: &str) -> String {
    text.replace(&format!("{SUMMARY_OPEN} "), "")
        .replace(&format!(" {SUMMARY_CLOSE}"), "")
        .replace(SUMMARY_OPEN, "")
        .replace(SUMMARY_CLOSE, "")
}
