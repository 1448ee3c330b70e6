use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::models::GenerationResult;

/// The JSON wrapper every generation endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub generated_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl GenerationEnvelope {
    pub fn from_error(error: &StudioError) -> Self {
        Self {
            success: false,
            message: None,
            generated_files: Vec::new(),
            text_output: None,
            analysis: None,
            error: Some(error.public_message()),
            code: Some(error.code().to_string()),
        }
    }
}

impl From<GenerationResult> for GenerationEnvelope {
    fn from(result: GenerationResult) -> Self {
        Self {
            success: result.success,
            message: result.message,
            generated_files: result.generated_files,
            text_output: result.text_output.filter(|t| !t.is_empty()),
            analysis: result.analysis,
            error: None,
            code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let err = StudioError::ValidationError("Between 1 and 5 images must be provided".into());
        let json = serde_json::to_value(GenerationEnvelope::from_error(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["generated_files"], serde_json::json!([]));
        assert_eq!(json["code"], "validation_error");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_success_envelope_drops_empty_text() {
        let envelope = GenerationEnvelope::from(GenerationResult {
            success: true,
            generated_files: vec!["output/a.png".into()],
            message: Some("done".into()),
            text_output: Some(String::new()),
            analysis: None,
        });
        let json = serde_json::to_value(envelope).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("text_output").is_none());
        assert!(json.get("error").is_none());
    }
}
