//! Decides which input affordance to show for the assistant's latest message.
//!
//! The rules are plain substring checks over the lowercased text and are kept
//! exactly as they are: changing them changes which UI a patient sees for
//! ambiguous wording. Precedence is
//! `StructuredSummary > PhysicalScale > MentalFeelings > FreeText`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json.*```").unwrap();
    static ref ANY_FENCE: Regex = Regex::new(r"(?s)```(.*?)```").unwrap();
}

/// Words that mark a question about timing or causes. Any of them suppresses
/// the feelings chips even when the text asks how the patient feels.
pub const DURATION_OR_TRIGGER_KEYWORDS: [&str; 10] = [
    "how long", "while", "when", "time", "history", "trigger", "cause", "causing", "explain", "tell me",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    PhysicalScale,
    MentalFeelings,
    FreeText,
    StructuredSummary,
}

impl RenderMode {
    /// The free-text box is hidden only while the severity grid is up.
    pub fn shows_text_input(self) -> bool {
        matches!(self, RenderMode::MentalFeelings | RenderMode::FreeText)
    }
}

/// True when the text carries a ```json fence, or any fence whose body has a `{`.
pub fn is_structured_summary(text: &str) -> bool {
    JSON_FENCE.is_match(text)
        || ANY_FENCE
            .captures_iter(text)
            .any(|caps| caps.get(1).is_some_and(|body| body.as_str().contains('{')))
}

/// Caller-side check for a severity question: mentions "scale" along with a
/// numeric range marker.
pub fn expects_severity_scale(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("scale") && (lower.contains('1') || lower.contains("10"))
}

fn asks_about_duration_or_trigger(lower: &str) -> bool {
    DURATION_OR_TRIGGER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn asks_about_feeling(lower: &str) -> bool {
    (lower.contains("how") && lower.contains("you feel")) || lower.contains("one word") || lower.contains("describe")
}

/// Classifies an assistant message. `expect_scale` forces the severity grid
/// (see [`expects_severity_scale`]) unless the message is a summary.
pub fn classify(text: &str, expect_scale: bool) -> RenderMode {
    if is_structured_summary(text) {
        return RenderMode::StructuredSummary;
    }

    let lower = text.to_lowercase();
    let physical = lower.contains("scale") || expect_scale;
    if physical {
        return RenderMode::PhysicalScale;
    }

    if !asks_about_duration_or_trigger(&lower) && asks_about_feeling(&lower) {
        return RenderMode::MentalFeelings;
    }

    RenderMode::FreeText
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_wins_over_scale() {
        let text = "On a scale of 1 to 5 you said 4.\n```json\n{\"domain\": \"Physical\"}\n```";
        assert_eq!(classify(text, false), RenderMode::StructuredSummary);
        assert_eq!(classify(text, true), RenderMode::StructuredSummary);
    }

    #[test]
    fn generic_fence_with_brace_is_summary() {
        let text = "Here you go:\n```\n{\"domain\": \"Mental\"}\n```";
        assert_eq!(classify(text, false), RenderMode::StructuredSummary);
    }

    #[test]
    fn generic_fence_without_brace_is_not_summary() {
        let text = "Try this:\n```\nbreathe in, breathe out\n```\nCould you describe it?";
        assert!(!is_structured_summary(text));
        assert_eq!(classify(text, false), RenderMode::MentalFeelings);
    }

    #[test]
    fn upper_case_json_tag_without_brace_keeps_text_input() {
        let text = "Here is a tip:\n```JSON\nbreathe slowly\n```\nWhere does it hurt?";
        assert!(!is_structured_summary(text));
        assert_eq!(classify(text, false), RenderMode::FreeText);
        assert!(classify(text, false).shows_text_input());
    }

    #[test]
    fn unterminated_fence_is_not_summary() {
        assert!(!is_structured_summary("```json {\"domain\": \"NDIS\"}"));
    }

    #[test]
    fn scale_selects_physical() {
        assert_eq!(
            classify("On a scale of 1 to 5, how severe is the pain right now? 📉", false),
            RenderMode::PhysicalScale
        );
        assert_eq!(classify("Where on the SCALE would you put it?", false), RenderMode::PhysicalScale);
    }

    #[test]
    fn forced_flag_selects_physical() {
        assert_eq!(classify("Where is the pain located?", true), RenderMode::PhysicalScale);
    }

    #[test]
    fn scale_beats_describe() {
        assert_eq!(
            classify("Describe it on a scale from mild to severe.", false),
            RenderMode::PhysicalScale
        );
    }

    #[test]
    fn how_do_you_feel_is_mental() {
        assert_eq!(classify("How do you feel about this?", false), RenderMode::MentalFeelings);
    }

    #[test]
    fn one_word_is_mental() {
        assert_eq!(
            classify("In one word, how does this make you feel? 💭", false),
            RenderMode::MentalFeelings
        );
    }

    #[test]
    fn duration_keyword_suppresses_mental() {
        assert_eq!(classify("How long have you felt this way?", false), RenderMode::FreeText);
        assert_eq!(classify("How do you feel when it happens?", false), RenderMode::FreeText);
        assert_eq!(classify("Can you describe what might be causing it?", false), RenderMode::FreeText);
        assert_eq!(classify("Please tell me, how do you feel?", false), RenderMode::FreeText);
        assert_eq!(classify("Could you explain and describe it?", false), RenderMode::FreeText);
    }

    #[test]
    fn plain_question_is_free_text() {
        assert_eq!(classify("Where exactly is the pain located?", false), RenderMode::FreeText);
        assert_eq!(classify("", false), RenderMode::FreeText);
    }

    #[test]
    fn severity_flag_needs_range_marker() {
        assert!(expects_severity_scale("On a scale of 1 to 5, how bad is it?"));
        assert!(expects_severity_scale("Rate it on a Scale up to 10"));
        assert!(!expects_severity_scale("On a scale from mild to severe, how bad is it?"));
        assert!(!expects_severity_scale("Pick a number from 1 to 5"));
    }

    #[test]
    fn text_input_visibility() {
        assert!(!RenderMode::PhysicalScale.shows_text_input());
        assert!(RenderMode::MentalFeelings.shows_text_input());
        assert!(RenderMode::FreeText.shows_text_input());
        assert!(!RenderMode::StructuredSummary.shows_text_input());
    }
}
