use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Provider, ResponseFormat};
use crate::config::LlmSettings;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not configured: set {0} or add it to the config file")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("API returned no content")]
    EmptyResponse,
}

impl Provider {
    /// Builds a provider from resolved settings; fails on an unknown provider
    /// name or a missing key.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ApiConnectionError> {
        let key_for = |env_var: &str, key: &Option<String>| {
            key.clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ApiConnectionError::MissingApiKey(env_var.to_string()))
        };
        match settings.provider.as_str() {
            "openai" => Ok(Provider::OpenAi {
                api_key: key_for("OPENAI_API_KEY", &settings.openai_api_key)?,
                model: settings.model.clone(),
            }),
            "openrouter" => Ok(Provider::OpenRouter {
                api_key: key_for("OPENROUTER_API_KEY", &settings.openrouter_api_key)?,
                model: settings.model.clone(),
            }),
            other => Err(ApiConnectionError::UnsupportedProvider(other.to_string())),
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        if self.api_key().trim().is_empty() {
            return Err(ApiConnectionError::MissingApiKey(format!("{} api key", self.name())));
        }

        let client = Client::new();
        let mut builder = client
            .post(self.chat_url())
            .bearer_auth(self.api_key())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Provider::OpenRouter { .. } = self {
            builder = builder.header("X-Title", "MealPlanner");
        }

        debug!(provider = self.name(), model = %request.model, "sending chat completion");
        let response = builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<ChatCompletionResponse>().await?)
        } else {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            Err(ApiConnectionError::ApiError { status, error_body })
        }
    }

    /// Sends `messages` and returns the trimmed text of the first choice.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        json_output: bool,
    ) -> Result<String, ApiConnectionError> {
        let request = ChatCompletionRequest {
            model: self.model().to_string(),
            messages,
            response_format: json_output.then(ResponseFormat::json_object),
            temperature: Some(temperature),
            max_tokens: None,
        };
        let response = self.call_chat_completion(request).await?;
        response
            .first_content()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ApiConnectionError::EmptyResponse)
    }
}
