//! Care-plan summary extraction.
//!
//! The assistant closes an intake with a fenced JSON block. Parsing is
//! permissive: missing fields stay empty, and anything that is not a JSON
//! object falls back to the message text with its fence markers removed.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

lazy_static! {
    static ref JSON_BLOCK: Regex = Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap();
    static ref ANY_BLOCK: Regex = Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Specialist {
    pub name: Option<String>,
    pub role: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub domain: Option<String>,
    pub problem: Option<String>,
    pub severity: Option<String>,
    pub duration: Option<String>,
    pub notes: Option<String>,
    pub impact: Option<String>,
    pub recommended_specialist: Specialist,
}

impl SummaryRecord {
    /// The specialist block is only shown when the match has a name.
    pub fn specialist(&self) -> Option<&Specialist> {
        present(&self.recommended_specialist.name).map(|_| &self.recommended_specialist)
    }
}

/// What the summary area should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryView {
    Card(SummaryRecord),
    PlainText { text: String },
}

/// Picks the JSON candidate: a `json`-tagged fence, else any fence, else the raw text.
pub fn extract_json_block(text: &str) -> &str {
    JSON_BLOCK
        .captures(text)
        .or_else(|| ANY_BLOCK.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Removes every "```json" and "```" marker.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

fn scalar(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn specialist(object: &Map<String, Value>) -> Specialist {
    let empty = Map::new();
    let fields = match object.get("recommended_specialist") {
        Some(Value::Object(fields)) => fields,
        _ => &empty,
    };
    Specialist {
        name: scalar(fields, "name"),
        role: scalar(fields, "role"),
        image_url: scalar(fields, "image"),
    }
}

fn record_from(object: &Map<String, Value>) -> SummaryRecord {
    SummaryRecord {
        domain: scalar(object, "domain"),
        problem: scalar(object, "problem").or_else(|| scalar(object, "complaint")),
        severity: scalar(object, "severity"),
        duration: scalar(object, "duration"),
        notes: scalar(object, "notes"),
        impact: scalar(object, "impact"),
        recommended_specialist: specialist(object),
    }
}

/// Parses an assistant message into a summary card. Never fails.
pub fn parse_summary(text: &str) -> SummaryView {
    match serde_json::from_str::<Value>(extract_json_block(text)) {
        Ok(Value::Object(object)) => SummaryView::Card(record_from(&object)),
        Ok(other) => {
            debug!(kind = ?other, "Summary JSON is not an object, showing text");
            SummaryView::PlainText { text: strip_fences(text) }
        }
        Err(e) => {
            debug!(error = %e, "Summary JSON did not parse, showing text");
            SummaryView::PlainText { text: strip_fences(text) }
        }
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

// Empty strings count as missing, same as an absent key.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl fmt::Display for SummaryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Care Plan")?;
        writeln!(f, "Based on your input")?;
        if let Some(specialist) = self.specialist() {
            writeln!(f)?;
            writeln!(f, "Recommended Specialist: {}", field(&specialist.name))?;
            if let Some(role) = present(&specialist.role) {
                writeln!(f, "  {role}")?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Focus Area: {}", field(&self.domain))?;
        writeln!(f, "Key Issue:  {}", field(&self.problem))?;
        if let Some(severity) = present(&self.severity) {
            writeln!(f, "Severity:   {severity}")?;
        }
        writeln!(f, "Duration:   {}", field(&self.duration))?;
        if let Some(impact) = present(&self.impact) {
            writeln!(f, "Impact:     {impact}")?;
        }
        writeln!(f)?;
        write!(f, "\"{}\"", field(&self.notes))
    }
}
