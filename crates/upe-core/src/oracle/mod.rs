//! Text-generation oracle seam.
//!
//! The engine never talks to a model vendor directly. It hands a compiled
//! prompt, a seed and a temperature to an [`Oracle`] and expects a JSON
//! object back. Implementations:
//!
//! - [`HttpOracle`]: POSTs to an HTTP endpoint (reqwest)
//! - [`CommandOracle`]: pipes the prompt to a local command
//! - [`ScriptedOracle`]: canned responses for tests and dry runs

pub mod command;
pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde_json::Value;

pub use command::CommandOracle;
pub use http::HttpOracle;
pub use scripted::ScriptedOracle;

/// Failure of a single oracle call. Never fatal to a run on its own.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle output is not valid JSON: {0}")]
    Malformed(String),

    #[error("oracle output must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("oracle command failed: {0}")]
    Command(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces one candidate output per call.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str, seed: u64, temperature: f64)
        -> Result<Value, OracleError>;
}

/// Strip a surrounding markdown code fence, if any.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```json") {
        let start = start + "```json".len();
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }
    text
}

/// Parse raw oracle text into a JSON object.
pub fn parse_output(text: &str) -> Result<Value, OracleError> {
    let value: Value = serde_json::from_str(extract_json(text))
        .map_err(|e| OracleError::Malformed(e.to_string()))?;
    require_object(value)
}

/// Accept an object as-is, or a string that itself contains a JSON object.
pub fn require_object(value: Value) -> Result<Value, OracleError> {
    match value {
        Value::Object(_) => Ok(value),
        Value::String(text) => match serde_json::from_str::<Value>(extract_json(&text)) {
            Ok(inner @ Value::Object(_)) => Ok(inner),
            Ok(other) => Err(OracleError::NotAnObject(kind_of(&other))),
            Err(e) => Err(OracleError::Malformed(e.to_string())),
        },
        other => Err(OracleError::NotAnObject(kind_of(&other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_fenced_json() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("note\n```\n{\"b\":2}\n```"), "{\"b\":2}");
        assert_eq!(extract_json("  {\"c\":3} "), "{\"c\":3}");
    }

    #[test]
    fn parse_output_requires_object() {
        assert_eq!(parse_output("{\"title\":\"x\"}").unwrap(), json!({ "title": "x" }));
        assert!(matches!(parse_output("[1]"), Err(OracleError::NotAnObject("array"))));
        assert!(matches!(parse_output("not json"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn string_bodies_are_unwrapped_once() {
        let wrapped = json!("{\"title\":\"inner\"}");
        assert_eq!(require_object(wrapped).unwrap(), json!({ "title": "inner" }));
        assert!(matches!(
            require_object(json!("\"still a string\"")),
            Err(OracleError::NotAnObject("string"))
        ));
        assert!(matches!(require_object(json!(3)), Err(OracleError::NotAnObject("number"))));
    }
}
