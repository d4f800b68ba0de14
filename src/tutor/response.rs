use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A step-by-step answer as produced by the model.
///
/// Only `steps` is checked. Every other field, and every step, is kept
/// exactly as the model wrote it; the accessors below read the usual
/// fields without changing what is serialized back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringResponse {
    pub steps: Vec<Step>,

    /// `topic`, `difficulty`, `final_answer` and anything else the model adds
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One revealable thinking step, usually an object with `step_number`,
/// `thinking_prompt`, `answer` and `explanation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(Value);

impl TutoringResponse {
    /// Short subject label, e.g. "Mathematics - Geometry"
    pub fn topic(&self) -> Cow<'_, str> {
        self.text("topic").unwrap_or_default()
    }

    /// Nominally beginner, intermediate or advanced
    pub fn difficulty(&self) -> Option<Cow<'_, str>> {
        self.text("difficulty")
    }

    pub fn final_answer(&self) -> Cow<'_, str> {
        self.text("final_answer").unwrap_or_default()
    }

    fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.fields.get(name).and_then(as_text)
    }
}

impl Step {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Declared step number; whole numbers only, given as a number or a string
    pub fn step_number(&self) -> Option<u64> {
        match self.0.get("step_number")? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Guiding question shown before the answer is revealed
    pub fn thinking_prompt(&self) -> Option<Cow<'_, str>> {
        self.text("thinking_prompt")
    }

    pub fn answer(&self) -> Option<Cow<'_, str>> {
        self.text("answer")
    }

    pub fn explanation(&self) -> Option<Cow<'_, str>> {
        self.text("explanation")
    }

    fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.0.get(name).and_then(as_text)
    }
}

impl From<Value> for Step {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// Models sometimes emit numbers or booleans where text is expected
fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Cow::Borrowed(text)),
        other => Some(Cow::Owned(other.to_string())),
    }
}
