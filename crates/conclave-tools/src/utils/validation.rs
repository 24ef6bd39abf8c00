//! Parameter validation helpers.
//!
//! Malformed arguments surface as [`ToolError::Validation`]; the executor
//! hands the message back to the agent so it can retry with fixed arguments.

use serde_json::Value;

use crate::errors::ToolError;

fn invalid(message: String) -> ToolError {
    ToolError::Validation { message }
}

/// Extract a required, non-empty string parameter.
pub fn validate_required_string(args: &Value, param: &str, description: &str) -> Result<String, ToolError> {
    match args.get(param) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_) | Value::Null) | None => Err(invalid(format!(
            "Missing required parameter: {param} ({description})"
        ))),
        Some(_) => Err(invalid(format!(
            "Invalid type for parameter: {param} (expected string)"
        ))),
    }
}

/// Extract a required string parameter that may be empty.
pub fn validate_string(args: &Value, param: &str, description: &str) -> Result<String, ToolError> {
    match args.get(param) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(invalid(format!(
            "Missing required parameter: {param} ({description})"
        ))),
        Some(_) => Err(invalid(format!(
            "Invalid type for parameter: {param} (expected string)"
        ))),
    }
}

/// Extract an optional string parameter.
pub fn get_optional_string(args: &Value, param: &str) -> Option<String> {
    args.get(param).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn required_string_present() {
        let args = json!({"path": "a.txt"});
        assert_eq!(validate_required_string(&args, "path", "file").unwrap(), "a.txt");
    }

    #[test]
    fn required_string_missing_or_blank() {
        for args in [json!({}), json!({"path": null}), json!({"path": "  "})] {
            let err = validate_required_string(&args, "path", "file").unwrap_err();
            assert_matches!(err, ToolError::Validation { ref message } if message.starts_with("Missing required parameter: path"));
        }
    }

    #[test]
    fn required_string_wrong_type() {
        let err = validate_required_string(&json!({"path": 7}), "path", "file").unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn plain_string_allows_empty() {
        assert_eq!(validate_string(&json!({"content": ""}), "content", "c").unwrap(), "");
        assert!(validate_string(&json!({}), "content", "c").is_err());
        assert!(validate_string(&json!({"content": []}), "content", "c").is_err());
    }

    #[test]
    fn optional_string() {
        assert_eq!(get_optional_string(&json!({"dir": "src"}), "dir").as_deref(), Some("src"));
        assert_eq!(get_optional_string(&json!({}), "dir"), None);
    }
}
