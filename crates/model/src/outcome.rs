//! Classification of raw model text into a `ModelOutcome`.
//!
//! The clarification heuristic lives in prompt content, not code: the system
//! instructions direct the model to prefix a clarifying question with the
//! configured marker. This function only recognizes the marker.

use tabletalk_core::model::ModelOutcome;

/// Classify model text as a clarifying question or a final answer.
///
/// Text beginning with the marker (after leading whitespace) becomes a
/// `ClarifyingQuestion` with the marker stripped; everything else is a
/// `FinalAnswer` passed through unmodified.
pub fn classify_text(text: &str, marker: &str) -> ModelOutcome {
    let trimmed = text.trim_start();
    if !marker.is_empty() {
        if let Some(question) = trimmed.strip_prefix(marker) {
            return ModelOutcome::ClarifyingQuestion(question.trim().to_string());
        }
    }
    ModelOutcome::FinalAnswer(text.to_string())
}
