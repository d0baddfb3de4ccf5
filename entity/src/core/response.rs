//! Standard response payloads returned by the engine.

use super::FailureInfo;
use serde_json::{json, Value};

/// Response `type` for the static fallback payload.
pub const STATIC_FALLBACK: &str = "static_fallback";
/// Response `type` for the plugin error payload.
pub const PLUGIN_ERROR: &str = "plugin_error";
/// Response `type` when no plugin produced a response.
pub const NO_RESPONSE: &str = "no_response";
/// Response `type` requesting another pass through the pipeline.
pub const CONTINUE_PROCESSING: &str = "continue_processing";

/// Builds the static fallback payload.
#[must_use]
pub fn static_fallback(error_id: &str, message: impl Into<String>) -> Value {
    json!({
        "error": "An internal error occurred",
        "message": message.into(),
        "error_id": error_id,
        "type": STATIC_FALLBACK,
    })
}

/// Builds the plugin error payload from captured failure info.
#[must_use]
pub fn plugin_error(error_id: &str, failure: &FailureInfo) -> Value {
    json!({
        "error": failure.error_type,
        "message": failure.error_message,
        "error_id": error_id,
        "plugin": failure.plugin_name,
        "stage": failure.stage.as_str(),
        "type": PLUGIN_ERROR,
    })
}

/// Builds the payload returned when OUTPUT completes without a response.
#[must_use]
pub fn no_response(error_id: &str) -> Value {
    json!({
        "error": "No response generated",
        "message": "The pipeline completed without producing a response",
        "error_id": error_id,
        "type": NO_RESPONSE,
    })
}

/// Returns the follow-up message if the response asks for another pass.
#[must_use]
pub fn continue_message(response: &Value) -> Option<&str> {
    if response.get("type").and_then(Value::as_str) != Some(CONTINUE_PROCESSING) {
        return None;
    }
    response.get("message").and_then(Value::as_str)
}

/// Returns the response `type`, if the payload is an object carrying one.
#[must_use]
pub fn response_type(response: &Value) -> Option<&str> {
    response.get("type").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineStage;

    #[test]
    fn test_static_fallback_shape() {
        let payload = static_fallback("run-1", "try again later");
        assert_eq!(payload["type"], STATIC_FALLBACK);
        assert_eq!(payload["error_id"], "run-1");
        assert_eq!(payload["message"], "try again later");
        assert!(payload.get("error").is_some());
    }

    #[test]
    fn test_plugin_error_shape() {
        let failure = FailureInfo::new(PipelineStage::Do, "explode", &anyhow::anyhow!("boom"));
        let payload = plugin_error("run-2", &failure);

        assert_eq!(payload["type"], PLUGIN_ERROR);
        assert_eq!(payload["plugin"], "explode");
        assert_eq!(payload["stage"], "DO");
        assert_eq!(payload["message"], "boom");
    }

    #[test]
    fn test_continue_message() {
        let follow_up = json!({"type": "continue_processing", "message": "next"});
        assert_eq!(continue_message(&follow_up), Some("next"));
        assert_eq!(continue_message(&json!({"type": "done"})), None);
        assert_eq!(continue_message(&json!("plain text")), None);
    }
}
