use serde::{Deserialize, Serialize};

// =============================================================================
// Generate request
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    pub fn new(model: &str, prompt: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.into(),
            stream: false,
            format: None,
            options: None,
        }
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn format(mut self, schema: serde_json::Value) -> Self {
        self.format = Some(schema);
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(t) = temperature {
            self.options = Some(GenerateOptions {
                temperature: Some(t),
            });
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// =============================================================================
// Generate response
// =============================================================================

/// One `/api/generate` object. Non-streaming calls return exactly one;
/// streaming calls return one per line until `done` is set.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}
