//! Recognition answers and the detections derived from them

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome class of one recognition call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    /// Service answered and identified something
    SuccessMatch,
    /// Service answered but found nothing
    SuccessNoMatch,
    /// Transport, authentication or service-side failure
    Error,
}

impl RecognitionStatus {
    /// Classify a raw service payload
    ///
    /// `status == "success"` with a non-null `result` is a match, without one
    /// it is a miss. Anything else is an error.
    pub fn classify(payload: &Value) -> Self {
        match payload.get("status").and_then(Value::as_str) {
            Some("success") => match payload.get("result") {
                Some(result) if !result.is_null() => RecognitionStatus::SuccessMatch,
                _ => RecognitionStatus::SuccessNoMatch,
            },
            _ => RecognitionStatus::Error,
        }
    }
}

/// One answer per segment, in segment order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionAnswer {
    pub segment_index: usize,
    pub status: RecognitionStatus,
    /// Service payload as received, or `{"message": ...}` for errors
    pub raw_payload: Value,
}

impl RecognitionAnswer {
    /// Build an answer from a decoded service payload
    ///
    /// Service-side errors are normalized to `{"message": ...}` so every
    /// error answer has the same shape regardless of where it came from.
    pub fn from_payload(segment_index: usize, payload: Value) -> Self {
        match RecognitionStatus::classify(&payload) {
            RecognitionStatus::Error => {
                let message = service_error_message(&payload);
                Self::error(segment_index, message)
            }
            status => Self {
                segment_index,
                status,
                raw_payload: payload,
            },
        }
    }

    /// Build an error answer
    pub fn error(segment_index: usize, message: impl Into<String>) -> Self {
        Self {
            segment_index,
            status: RecognitionStatus::Error,
            raw_payload: json!({ "message": message.into() }),
        }
    }

    /// The `result` object of a matching answer
    pub fn result(&self) -> Option<&Value> {
        match self.status {
            RecognitionStatus::SuccessMatch => self.raw_payload.get("result"),
            _ => None,
        }
    }

    /// Error message of an error answer
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            RecognitionStatus::Error => self.raw_payload.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

fn service_error_message(payload: &Value) -> String {
    let error = payload.get("error");
    error
        .and_then(|e| e.get("error_message").or_else(|| e.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| error.and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            format!(
                "Unexpected recognition status: {}",
                payload.get("status").unwrap_or(&Value::Null)
            )
        })
}

/// A detection on the absolute timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionEntry {
    pub segment_index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Provider payload the range was read from
    pub metadata: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_match_and_miss() {
        let hit = json!({"status": "success", "result": {"title": "Song A"}});
        let miss = json!({"status": "success", "result": null});
        let bare = json!({"status": "success"});

        assert_eq!(RecognitionStatus::classify(&hit), RecognitionStatus::SuccessMatch);
        assert_eq!(RecognitionStatus::classify(&miss), RecognitionStatus::SuccessNoMatch);
        assert_eq!(RecognitionStatus::classify(&bare), RecognitionStatus::SuccessNoMatch);
    }

    #[test]
    fn test_service_error_is_normalized() {
        let payload = json!({
            "status": "error",
            "error": {"error_code": 901, "error_message": "Recognition failed: token limit"}
        });

        let answer = RecognitionAnswer::from_payload(4, payload);
        assert_eq!(answer.status, RecognitionStatus::Error);
        assert_eq!(answer.segment_index, 4);
        assert_eq!(answer.error_message(), Some("Recognition failed: token limit"));
        assert!(answer.result().is_none());
    }

    #[test]
    fn test_unknown_status_is_error() {
        let answer = RecognitionAnswer::from_payload(0, json!({"unexpected": true}));
        assert_eq!(answer.status, RecognitionStatus::Error);
        assert!(answer.error_message().unwrap().contains("Unexpected recognition status"));
    }

    #[test]
    fn test_result_only_for_matches() {
        let answer = RecognitionAnswer::from_payload(
            1,
            json!({"status": "success", "result": {"title": "X"}}),
        );
        assert_eq!(answer.result(), Some(&json!({"title": "X"})));
        assert_eq!(answer.error_message(), None);
    }
}
