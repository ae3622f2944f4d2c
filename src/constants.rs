// Defaults for the intake assistant, loaded from the environment where it makes sense.

use std::env;

lazy_static::lazy_static! {
    pub static ref DEFAULT_API_KEY: String = env::var("INTAKE_API_KEY")
        .or_else(|_| env::var("OPENROUTER_API_KEY"))
        .unwrap_or_default();
    pub static ref DEFAULT_BASE_URL: String = env::var("INTAKE_BASE_URL").unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
    pub static ref DEFAULT_MODEL: String = env::var("INTAKE_MODEL").unwrap_or_else(|_| "google/gemini-2.5-flash".to_string());
}

/// Token ceiling sent with every chat-completion request.
pub const MAX_TOKENS: u32 = 500;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// First user turn sent (with empty history) to open a session.
pub const GREETING: &str = "Hello! I am ready to start.";

/// Question shown before the assistant has said anything.
pub const PLACEHOLDER_PROMPT: &str = "I'm ready to help. What symptoms are you noticing?";

pub const PENDING_MESSAGE: &str = "Thinking gently... 🌿";

pub const VOICE_INPUT_UNSUPPORTED: &str = "Voice input is not supported on this device.";
pub const SPEECH_OUTPUT_UNSUPPORTED: &str = "Speech output is not supported on this device.";

/// One cell of the 1-5 severity grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SeverityOption {
    pub value: u8,
    pub label: &'static str,
    pub icon: &'static str,
}

impl SeverityOption {
    /// Text sent to the assistant when this option is tapped.
    pub fn reply(&self) -> String {
        format!("rated {}/5 ({})", self.value, self.label)
    }
}

pub const SEVERITY_OPTIONS: [SeverityOption; 5] = [
    SeverityOption { value: 1, label: "Mild", icon: "🙂" },
    SeverityOption { value: 2, label: "Okay", icon: "😐" },
    SeverityOption { value: 3, label: "Ouch", icon: "😟" },
    SeverityOption { value: 4, label: "Hard", icon: "😣" },
    SeverityOption { value: 5, label: "Severe", icon: "😫" },
];

pub const FEELING_OPTIONS: [&str; 8] = [
    "Anxious 😰",
    "Overwhelmed 🤯",
    "Sad 😢",
    "Tired 😴",
    "Angry 😠",
    "Confused 😕",
    "Okay 😐",
    "Hopeful 🙂",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_reply_format() {
        assert_eq!(SEVERITY_OPTIONS[0].reply(), "rated 1/5 (Mild)");
        assert_eq!(SEVERITY_OPTIONS[4].reply(), "rated 5/5 (Severe)");
    }

    #[test]
    fn severity_values_are_one_through_five() {
        let values: Vec<u8> = SEVERITY_OPTIONS.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
