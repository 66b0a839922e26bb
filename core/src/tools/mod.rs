use crate::traits::REQUEST_PARAM;
use serde_json::Value;

pub mod function;
pub mod unit_tool;

pub use function::FunctionTool;
pub use unit_tool::UnitTool;

pub fn extract_request_arg(arguments: &str) -> String {
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => match map.get(REQUEST_PARAM) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => match map.values().find_map(|v| v.as_str()) {
                Some(s) if map.len() == 1 => s.to_string(),
                _ => arguments.to_string(),
            },
        },
        Ok(Value::String(s)) => s,
        _ => arguments.to_string(),
    }
}

pub fn tool_error_text(tool: &str, cause: impl std::fmt::Display) -> String {
    format!("Error executing tool '{tool}': {cause}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_field() {
        assert_eq!(extract_request_arg(r#"{"request": "rust"}"#), "rust");
    }

    #[test]
    fn single_other_string_field() {
        assert_eq!(extract_request_arg(r#"{"query": "tokio"}"#), "tokio");
    }

    #[test]
    fn bare_string_and_raw_text() {
        assert_eq!(extract_request_arg(r#""plain""#), "plain");
        assert_eq!(extract_request_arg("not json"), "not json");
        assert_eq!(
            extract_request_arg(r#"{"a": "1", "b": "2"}"#),
            r#"{"a": "1", "b": "2"}"#
        );
    }

    #[test]
    fn non_string_request_is_serialized() {
        assert_eq!(extract_request_arg(r#"{"request": 42}"#), "42");
    }
}
