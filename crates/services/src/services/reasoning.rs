//! Boundary to the external reasoning model.
//!
//! Callers describe the shape they expect with a typed struct; the JSON schema
//! for it travels with the request and the reply is validated by deserialising
//! into that same type, so loosely-shaped model output never reaches the core.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::claude_api::ClaudeApiError;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("claude api error: {0}")]
    ClaudeApi(#[from] ClaudeApiError),
    #[error("model call failed: {0}")]
    Call(String),
    #[error("response did not match the expected shape: {0}")]
    Schema(String),
}

/// Capabilities the model may use while answering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTool {
    WebSearch,
    PageFetch,
}

/// One structured-generation call
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system: String,
    pub prompt: String,
    /// JSON schema of the expected answer; `Null` when unconstrained
    pub schema: Value,
    pub temperature: f32,
    pub tools: Vec<ModelTool>,
    pub max_tokens: u32,
}

impl StructuredRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            schema: Value::Null,
            temperature: 0.7,
            tools: Vec::new(),
            max_tokens: 4096,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn tools(mut self, tools: &[ModelTool]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Run the request and return the parsed JSON answer
    async fn generate(&self, request: StructuredRequest) -> Result<Value, ModelError>;
}

/// Attach the schema of `T`, call the model and decode the answer as `T`
pub async fn generate_structured<T>(
    model: &dyn ReasoningModel,
    mut request: StructuredRequest,
) -> Result<T, ModelError>
where
    T: DeserializeOwned + JsonSchema,
{
    request.schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| ModelError::Schema(e.to_string()))?;

    let value = model.generate(request).await?;
    serde_json::from_value(value).map_err(|e| ModelError::Schema(e.to_string()))
}


#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::testing::ScriptedModel;
    use super::*;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Answer {
        name: String,
        score: u32,
    }

    #[tokio::test]
    async fn test_generate_structured_attaches_schema_and_decodes() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({"name": "a", "score": 3}))]);

        let answer: Answer = generate_structured(&model, StructuredRequest::new("sys", "prompt"))
            .await
            .unwrap();

        assert_eq!(answer, Answer { name: "a".to_string(), score: 3 });
        let sent = model.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].schema["properties"]["score"].is_object());
    }

    #[tokio::test]
    async fn test_generate_structured_rejects_shape_mismatch() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({"name": "a"}))]);

        let result: Result<Answer, _> =
            generate_structured(&model, StructuredRequest::new("sys", "prompt")).await;

        assert!(matches!(result, Err(ModelError::Schema(_))));
    }
}
