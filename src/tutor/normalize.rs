//! Turns raw model output into a [`TutoringResponse`].
//!
//! Models are asked for bare JSON but regularly wrap it in a code fence and
//! write LaTeX commands with a single backslash (`\frac` instead of
//! `\\frac`). The normalizer strips the fence, parses, falls back to a
//! backslash repair pass, and finally checks that a `steps` array exists.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::TutoringResponse;

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*").expect("valid fence regex"));

/// LaTeX commands that start with a letter JSON reads as a control escape
/// (`\n`, `\r`, `\t`). `\b` and `\f` followed by any letter are always
/// treated as LaTeX.
const CONTROL_ESCAPE_COMMANDS: &[&str] = &[
    "nabla", "ne", "neg", "neq", "newline", "ngeq", "ni", "nleq", "nmid", "not", "notin", "nu",
    "rangle", "rceil", "rfloor", "rho", "right", "rightarrow", "rightleftharpoons", "rm",
    "tan", "tanh", "tau", "text", "textbf", "textit", "textrm", "tfrac", "therefore", "theta",
    "tilde", "times", "to", "top", "triangle",
];

/// Why raw model output could not be turned into a response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("response is not valid JSON: {message}")]
    Parse { message: String, raw: String },

    #[error("response has invalid structure: {reason}")]
    InvalidStructure { reason: String, raw: String },
}

impl NormalizeError {
    /// The model output as received, for diagnostics
    pub fn raw(&self) -> &str {
        match self {
            Self::Parse { raw, .. } | Self::InvalidStructure { raw, .. } => raw,
        }
    }
}

/// Normalize raw model output into a validated response
pub fn normalize(raw: &str) -> Result<TutoringResponse, NormalizeError> {
    let text = strip_code_fences(raw);

    let value = parse_with_repair(text).map_err(|e| NormalizeError::Parse {
        message: e.to_string(),
        raw: raw.to_string(),
    })?;

    validate(value).map_err(|reason| NormalizeError::InvalidStructure {
        reason,
        raw: raw.to_string(),
    })
}

/// Remove a leading fence (with optional language tag) and a trailing fence
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(found) = LEADING_FENCE.find(text) {
        text = &text[found.end()..];
    }
    if let Some(inner) = text.strip_suffix("```") {
        text = inner;
    }
    text.trim()
}

/// Double every backslash that does not start an escape JSON must keep.
///
/// `\"`, `\\`, `\/` and `\uXXXX` survive unchanged, as do control escapes
/// such as a newline that are not the start of a LaTeX command.
pub fn repair_latex_escapes(text: &str) -> String {
    let mut repaired = String::with_capacity(text.len() + text.len() / 8);
    let mut rest = text;

    while let Some(pos) = rest.find('\\') {
        repaired.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match escape_at(after) {
            Escape::Json => {
                // escape_at only accepts an ASCII first character here
                repaired.push('\\');
                repaired.push_str(&after[..1]);
                rest = &after[1..];
            }
            Escape::Latex => {
                repaired.push_str("\\\\");
                rest = after;
            }
        }
    }

    repaired.push_str(rest);
    repaired
}

fn parse_with_repair(text: &str) -> Result<Value, serde_json::Error> {
    if has_misread_latex(text) {
        debug!("LaTeX commands read as control escapes, repairing backslashes");
    } else {
        match serde_json::from_str(text) {
            Ok(value) => return Ok(value),
            Err(e) => debug!(error = %e, "direct parse failed, repairing backslashes"),
        }
    }

    serde_json::from_str(&repair_latex_escapes(text))
}

fn validate(value: Value) -> Result<TutoringResponse, String> {
    let Value::Object(fields) = &value else {
        return Err("expected a JSON object".to_string());
    };
    match fields.get("steps") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err("`steps` is not an array".to_string()),
        None => return Err("missing `steps`".to_string()),
    }

    // Steps and the remaining fields are held as-is, so this cannot reject
    serde_json::from_value(value).map_err(|e| e.to_string())
}

enum Escape {
    /// Valid JSON escape to keep as written
    Json,
    /// Backslash that belongs to LaTeX and needs escaping
    Latex,
}

/// Classify a backslash given the text right after it
fn escape_at(after: &str) -> Escape {
    let bytes = after.as_bytes();
    let word = &after[..bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count()];

    match bytes.first() {
        Some(b'"' | b'\\' | b'/') => Escape::Json,
        Some(b'u') if bytes.get(1..5).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) => {
            Escape::Json
        }
        Some(b'b' | b'f') if word.len() == 1 => Escape::Json,
        Some(b'n' | b'r' | b't') if !CONTROL_ESCAPE_COMMANDS.contains(&word) => Escape::Json,
        _ => Escape::Latex,
    }
}

/// Whether the text parses as JSON only by reading LaTeX as control escapes
fn has_misread_latex(text: &str) -> bool {
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        let after = &rest[pos + 1..];
        match escape_at(after) {
            Escape::Json => rest = &after[1..],
            Escape::Latex if after.starts_with(|c| matches!(c, 'b' | 'f' | 'n' | 'r' | 't')) => {
                return true;
            }
            Escape::Latex => rest = after,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_steps_round_trip_unchanged() {
        let response = normalize(r#"{"steps": []}"#).unwrap();

        assert!(response.steps.is_empty());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "steps": [] }));
    }

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"steps\": [{\"answer\": \"4\"}], \"final_answer\": \"4\"}\n```";

        let response = normalize(raw).unwrap();
        assert_eq!(response.steps[0].answer().as_deref(), Some("4"));
        assert_eq!(response.final_answer(), "4");
    }

    #[test]
    fn strips_bare_and_tagged_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  ```JSON{}```  "), "{}");
        assert_eq!(strip_code_fences("```javascript\n{}"), "{}");
        assert_eq!(strip_code_fences("{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn repairs_unescaped_fraction() {
        let raw = r#"{"steps":[{"answer":"\frac{1}{2}"}]}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(response.steps[0].answer().as_deref(), Some(r"\frac{1}{2}"));
    }

    #[test]
    fn repairs_commands_that_are_invalid_escapes() {
        let raw = r#"{"steps":[{"answer":"$\sqrt{2} \cdot \pi$"}]}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(
            response.steps[0].answer().as_deref(),
            Some(r"$\sqrt{2} \cdot \pi$")
        );
    }

    #[test]
    fn repairs_commands_colliding_with_control_escapes() {
        let raw = r#"{"steps":[{"answer":"$\theta \neq \beta$, \right)"}]}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(
            response.steps[0].answer().as_deref(),
            Some(r"$\theta \neq \beta$, \right)")
        );
    }

    #[test]
    fn repair_keeps_valid_escapes() {
        let raw = r#"{"steps":[{"answer":"say \"hi\"\n\\pi and \frac{1}{2} \u00e9"}]}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(
            response.steps[0].answer().as_deref(),
            Some("say \"hi\"\n\\pi and \\frac{1}{2} \u{e9}")
        );
    }

    #[test]
    fn repair_does_not_corrupt_escaped_quote() {
        assert_eq!(repair_latex_escapes(r#""a \"b\" c""#), r#""a \"b\" c""#);
        assert_eq!(repair_latex_escapes(r#""\alpha""#), r#""\\alpha""#);
        assert_eq!(repair_latex_escapes(r#""\\alpha""#), r#""\\alpha""#);
        assert_eq!(repair_latex_escapes("trailing \\"), "trailing \\\\");
    }

    #[test]
    fn well_escaped_latex_is_not_double_escaped() {
        let raw = r#"{"steps":[{"answer":"$A = \\pi r^2$"}], "final_answer": "$9\\pi$"}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(response.steps[0].answer().as_deref(), Some(r"$A = \pi r^2$"));
        assert_eq!(response.final_answer(), r"$9\pi$");
    }

    #[test]
    fn plain_newlines_are_kept() {
        let raw = r#"{"steps":[{"explanation":"first\nsecond\tthird"}]}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(
            response.steps[0].explanation().as_deref(),
            Some("first\nsecond\tthird")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = "```json\n{\"topic\": \"Algebra\", \"steps\": [{\"step_number\": 1, \"answer\": \"$\\frac{x}{2}$\"}], \"final_answer\": \"$x = \\sqrt{4}$\"}\n```";

        let first = normalize(raw).unwrap();
        let serialized = serde_json::to_string(&first).unwrap();
        let second = normalize(&serialized).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.steps[0].answer().as_deref(), Some(r"$\frac{x}{2}$"));
    }

    #[test]
    fn missing_steps_is_structural_failure() {
        let err = normalize(r#"{"topic": "x"}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidStructure { .. }));
        assert_eq!(err.raw(), r#"{"topic": "x"}"#);
    }

    #[test]
    fn non_array_steps_is_structural_failure() {
        for raw in [r#"{"steps": "one"}"#, r#"{"steps": null}"#, r#"{"steps": {}}"#, "[1, 2]", "42"] {
            let err = normalize(raw).unwrap_err();
            assert!(
                matches!(err, NormalizeError::InvalidStructure { .. }),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn steps_and_fields_pass_through_untouched() {
        let raw = r#"{"topic":{"area":"math"},"steps":[{"step_number":1.5,"answer":"x"},"Step two: add"],"final_answer":4}"#;

        let response = normalize(raw).unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "topic": { "area": "math" },
                "steps": [{ "step_number": 1.5, "answer": "x" }, "Step two: add"],
                "final_answer": 4
            })
        );
    }

    #[test]
    fn garbage_is_parse_failure() {
        let raw = "Sure! Here is how to solve it: first...";

        let err = normalize(raw).unwrap_err();
        assert!(matches!(err, NormalizeError::Parse { .. }));
        assert_eq!(err.raw(), raw);
    }
}
