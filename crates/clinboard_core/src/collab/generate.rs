//! Generative-text collaborator.
//!
//! # Responsibility
//! - Define the opaque `prompt -> text` contract.
//! - Turn a free-form request into one task-sized line of content.
//!
//! # Invariants
//! - A model failure never reaches board state; callers decide what to do
//!   with the draft.
//! - Prompts and responses are never logged, only their sizes.

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound on drafted task content, in characters.
pub const MAX_DRAFT_CHARS: usize = 280;

static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("valid list marker regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Failure of the generative-text collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    EmptyPrompt,
    /// Model could not be reached or refused the request.
    Unavailable(String),
    /// Model answered without usable text.
    EmptyResponse,
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPrompt => write!(f, "prompt cannot be empty"),
            Self::Unavailable(message) => write!(f, "model unavailable: {message}"),
            Self::EmptyResponse => write!(f, "model returned no usable text"),
        }
    }
}

impl Error for ModelError {}

/// Opaque text generator.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String, ModelError>,
{
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self(prompt)
    }
}

/// Asks the model for a single task line describing `request`.
///
/// The first non-empty line of the answer is kept, list markers are
/// stripped, whitespace is collapsed and the result capped at
/// [`MAX_DRAFT_CHARS`].
pub fn draft_task_content<G: TextGenerator + ?Sized>(
    generator: &G,
    request: &str,
) -> Result<String, ModelError> {
    let request = request.trim();
    if request.is_empty() {
        return Err(ModelError::EmptyPrompt);
    }

    let prompt = format!(
        "Write one short, actionable task for a clinical team's task board. \
         Answer with the task text only.\nRequest: {request}"
    );
    let answer = generator.generate(&prompt).map_err(|err| {
        warn!("event=model_generate module=collab status=error error={err}");
        err
    })?;

    let draft = answer
        .lines()
        .map(|line| LIST_MARKER_RE.replace(line, ""))
        .map(|line| WHITESPACE_RE.replace_all(line.trim(), " ").into_owned())
        .map(|line| line.trim_matches('"').trim().to_string())
        .find(|line| !line.is_empty())
        .ok_or(ModelError::EmptyResponse)?;

    let draft: String = draft.chars().take(MAX_DRAFT_CHARS).collect();
    info!(
        "event=model_generate module=collab status=ok prompt_chars={} draft_chars={}",
        prompt.chars().count(),
        draft.chars().count()
    );
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::{draft_task_content, ModelError, MAX_DRAFT_CHARS};

    #[test]
    fn keeps_first_line_without_list_marker() {
        let generator =
            |_: &str| Ok::<_, ModelError>("\n  1. Call  patient about labs\n2. Other".to_string());
        assert_eq!(
            draft_task_content(&generator, "labs follow-up").expect("draft should succeed"),
            "Call patient about labs"
        );
    }

    #[test]
    fn strips_quotes_and_bullets() {
        let generator = |_: &str| Ok::<_, ModelError>("- \"Review discharge summary\"".to_string());
        assert_eq!(
            draft_task_content(&generator, "discharge").expect("draft should succeed"),
            "Review discharge summary"
        );
    }

    #[test]
    fn caps_long_answers() {
        let generator = |_: &str| Ok::<_, ModelError>("x".repeat(MAX_DRAFT_CHARS * 2));
        let draft = draft_task_content(&generator, "long").expect("draft should succeed");
        assert_eq!(draft.chars().count(), MAX_DRAFT_CHARS);
    }

    #[test]
    fn blank_request_never_reaches_the_model() {
        let generator = |_: &str| -> Result<String, ModelError> {
            panic!("model must not be called for a blank request")
        };
        assert_eq!(
            draft_task_content(&generator, "   "),
            Err(ModelError::EmptyPrompt)
        );
    }

    #[test]
    fn model_errors_and_blank_answers_propagate() {
        let failing = |_: &str| Err::<String, _>(ModelError::Unavailable("quota".to_string()));
        assert_eq!(
            draft_task_content(&failing, "x"),
            Err(ModelError::Unavailable("quota".to_string()))
        );

        let blank = |_: &str| Ok::<_, ModelError>(" \n - \n".to_string());
        assert_eq!(draft_task_content(&blank, "x"), Err(ModelError::EmptyResponse));
    }
}
