//! Structured verdicts extracted from free-form judge output.
//!
//! Judges are asked for a single JSON object but often wrap it in prose. The
//! parser takes everything from the first `{` to the last `}` and decodes it.
//! Anything that does not decode to a JSON object is
//! [`Judgment::Unparseable`]; no default verdict is invented.

use serde::Serialize;

const MAX_REASON_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Label {
    Accept,
    Reject,
    /// Any other label, upper-cased. Empty if the field was missing.
    Unrecognized(String),
}

impl Label {
    fn parse(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "ACCEPT" => Self::Accept,
            "REJECT" => Self::Reject,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Reject => "REJECT",
            Self::Unrecognized(s) => s,
        }
    }
}

/// A decoded judge response. Numeric fields are clamped to `[0, 1]` and are
/// `None` when absent or not a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub label: Label,
    pub reason: String,
    pub risk: Option<f64>,
    pub utility: Option<f64>,
    pub importance: Option<f64>,
    pub uncertainty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Judgment {
    Parsed(Verdict),
    Unparseable { raw: String },
}

impl Judgment {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Unparseable { .. } => None,
        }
    }

    /// True only for a parsed ACCEPT.
    pub fn accepts(&self) -> bool {
        matches!(self, Self::Parsed(v) if v.label == Label::Accept)
    }

    pub fn risk(&self) -> Option<f64> {
        self.verdict().and_then(|v| v.risk)
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable { .. })
    }

    /// Label text for audit rows; `None` when unparseable.
    pub fn label_str(&self) -> Option<&str> {
        self.verdict().map(|v| v.label.as_str())
    }
}

/// The greedy brace span: first `{` through last `}`.
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn unit_number(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(serde_json::Value::as_f64)
        .map(|x| x.clamp(0.0, 1.0))
}

pub fn parse_judgment(raw: &str) -> Judgment {
    let unparseable = || Judgment::Unparseable {
        raw: raw.to_string(),
    };
    let Some(span) = brace_span(raw) else {
        return unparseable();
    };
    let obj = match serde_json::from_str::<serde_json::Value>(span.trim()) {
        Ok(serde_json::Value::Object(obj)) => obj,
        _ => return unparseable(),
    };

    let label = match obj.get("label") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let reason = match obj.get("reason") {
        Some(serde_json::Value::String(s)) => s.trim().chars().take(MAX_REASON_CHARS).collect(),
        _ => String::new(),
    };

    Judgment::Parsed(Verdict {
        label: Label::parse(&label),
        reason,
        risk: unit_number(&obj, "risk"),
        utility: unit_number(&obj, "utility"),
        importance: unit_number(&obj, "importance"),
        uncertainty: unit_number(&obj, "uncertainty"),
    })
}
