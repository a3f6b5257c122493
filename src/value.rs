// src/value.rs - Scalar observations and payload extraction
use crate::error::{AlarmError, Result};
use serde_json::Value as JsonValue;
use std::fmt;

/// Maximum number of nested JSON-in-string decodes before giving up.
pub const MAX_DECODE_DEPTH: usize = 8;

/// Canonical observation extracted from a message payload.
///
/// Every payload shape the engine accepts normalizes to exactly one of
/// these two variants. Booleans become `Number(1.0)` / `Number(0.0)`.
///
/// # Examples
///
/// ```rust
/// use threshold_alarm::Scalar;
///
/// let n = Scalar::Number(42.0);
/// assert_eq!(n.as_number(), Some(42.0));
/// assert_eq!(n.to_string(), "42");
///
/// let t = Scalar::Text("ERR".to_string());
/// assert_eq!(t.as_number(), None);
/// assert_eq!(t.type_name(), "text");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Numeric observation (any integer or float width, or a boolean)
    Number(f64),
    /// Free text observation
    Text(String),
}

impl Scalar {
    /// Numeric view, `None` for text
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }

    /// Get the type name of this scalar
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
        }
    }

    /// JSON rendering used in output messages.
    ///
    /// Integral numbers inside the exactly-representable range serialize as
    /// JSON integers so `42` does not come out as `42.0`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Number(n) => match integral(*n) {
                Some(i) => JsonValue::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null),
            },
            Scalar::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    // 2^53, the last integer an f64 represents exactly
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= EXACT {
        Some(n as i64)
    } else {
        None
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract the observation from `payload`, optionally following a dotted path.
///
/// Every path segment except the last must resolve to a JSON object; the
/// last one selects the value that gets canonicalized.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use threshold_alarm::{extract, Scalar};
///
/// let payload = json!({"a": {"b": 42}});
/// assert_eq!(extract(&payload, Some("a.b"))?, Scalar::Number(42.0));
/// assert!(extract(&payload, Some("a.c")).is_err());
/// # Ok::<(), threshold_alarm::AlarmError>(())
/// ```
pub fn extract(payload: &JsonValue, path: Option<&str>) -> Result<Scalar> {
    let target = match path.filter(|p| !p.is_empty()) {
        Some(path) => resolve(payload, path)?,
        None => payload,
    };
    canonicalize(target)
}

fn resolve<'a>(payload: &'a JsonValue, path: &str) -> Result<&'a JsonValue> {
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            JsonValue::Object(map) => map
                .get(segment)
                .ok_or_else(|| AlarmError::PathNotFound(path.to_string()))?,
            _ => return Err(AlarmError::PathNotFound(path.to_string())),
        };
    }
    Ok(current)
}

/// Normalize a resolved JSON value into a [`Scalar`].
pub fn canonicalize(value: &JsonValue) -> Result<Scalar> {
    canonicalize_at(value, 0)
}

fn canonicalize_at(value: &JsonValue, depth: usize) -> Result<Scalar> {
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .map(Scalar::Number)
            .ok_or(AlarmError::UnsupportedShape("number out of range")),
        JsonValue::Bool(b) => Ok(Scalar::Number(if *b { 1.0 } else { 0.0 })),
        JsonValue::String(s) => canonicalize_text(s, depth),
        JsonValue::Object(_) => Err(AlarmError::UnsupportedShape("object")),
        JsonValue::Array(_) => Err(AlarmError::UnsupportedShape("array")),
        JsonValue::Null => Err(AlarmError::UnsupportedShape("null")),
    }
}

fn canonicalize_text(text: &str, depth: usize) -> Result<Scalar> {
    if let Ok(decoded) = serde_json::from_str::<JsonValue>(text) {
        if depth + 1 >= MAX_DECODE_DEPTH {
            return Err(AlarmError::UnsupportedShape("string nesting too deep"));
        }
        return canonicalize_at(&decoded, depth + 1);
    }
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Scalar::Number(n)),
        _ => Ok(Scalar::Text(text.to_string())),
    }
}
