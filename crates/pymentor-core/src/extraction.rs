//! Pulling runnable code out of chat messages and model replies.

use regex::Regex;
use std::sync::LazyLock;

use crate::core_types::Message;
use crate::errors::MentorError;
use crate::llm::LLM;

pub const EXTRACT_CODE_PROMPT: &str =
    "Extract the Python code from this message. Only output the code, nothing else.";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:python3?|py)?[ \t]*\r?\n(.*?)```").expect("fenced block pattern")
});
static LEADING_TAGGED_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]+[ \t]*\r?\n").expect("tagged fence pattern"));
static LEADING_BARE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[ \t]*\r?\n?").expect("bare fence pattern"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```[ \t]*$").expect("trailing fence pattern"));
static EXECUTION_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:run|running|execute|executing|execution|output|outputs|result|results)\b|\bwhat (?:does|will|would) .*\bprint",
    )
    .expect("execution request pattern")
});

/// Removes markdown fences a model wrapped around code: a leading fence with
/// a language tag, then a leading bare fence, then a trailing fence.
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    let text = LEADING_TAGGED_FENCE.replace(text, "");
    let text = LEADING_BARE_FENCE.replace(&text, "");
    let text = TRAILING_FENCE.replace(&text, "");
    text.trim().to_string()
}

/// First fenced code block in `text`, if any.
pub fn find_fenced_code(text: &str) -> Option<String> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|code| !code.is_empty())
}

/// Finds the code in a user message. Fenced blocks are taken as-is; anything
/// else goes through the model with `EXTRACT_CODE_PROMPT`.
pub async fn extract_code(text: &str, llm: &dyn LLM) -> Result<String, MentorError> {
    if let Some(code) = find_fenced_code(text) {
        log::debug!("Extracted {} bytes of fenced code", code.len());
        return Ok(code);
    }

    log::debug!("No fenced block found, asking the model to extract code");
    let reply = llm
        .generate_text(
            vec![Message::system(EXTRACT_CODE_PROMPT), Message::user(text)],
            Some(0.0),
        )
        .await?;

    let code = strip_code_fences(&reply);
    if code.is_empty() {
        return Err(MentorError::ParsingError("No Python code found in message".to_string()));
    }
    Ok(code)
}

/// Whether the user asked to actually run the code rather than have it
/// explained.
pub fn is_execution_requested(text: &str) -> bool {
    EXECUTION_REQUEST.is_match(text)
}
