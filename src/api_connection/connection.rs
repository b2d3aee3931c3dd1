use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, EmbedRequest, EmbedResponse,
    GenerateRequest, GenerateResponse, Provider, OLLAMA_EMBED_PATH, OLLAMA_GENERATE_PATH,
    OPENROUTER_CHAT_URL,
};

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(Client::new);

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("Malformed response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("API returned an empty response")]
    EmptyResponse,
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl From<reqwest::Error> for ApiConnectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiConnectionError::Timeout(err)
        } else if err.is_decode() {
            ApiConnectionError::Decode(err)
        } else {
            ApiConnectionError::NetworkError(err)
        }
    }
}

impl Provider {
    pub fn ollama(base_url: &str, model: &str) -> Self {
        Self::Ollama {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn openrouter(api_key_env_var_name: &str, model: &str) -> Self {
        dotenv().ok();
        Self::OpenRouter {
            api_key: api_key_env_var_name.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Ollama { model, .. } | Provider::OpenRouter { model, .. } => model,
        }
    }

    /// One non-streaming completion. The whole exchange is bounded by `timeout`.
    pub async fn call_generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ApiConnectionError> {
        match self {
            Provider::Ollama { base_url, model } => {
                let request = GenerateRequest {
                    model: model.clone(),
                    prompt: prompt.to_string(),
                    stream: false,
                };
                let url = format!("{}{}", base_url, OLLAMA_GENERATE_PATH);
                let response = HTTP_CLIENT
                    .post(&url)
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await?;
                let response = error_for_status(response).await?;
                let body = response.json::<GenerateResponse>().await?;
                debug!(model = ?body.model, done = ?body.done, "ollama generate returned");
                Ok(body.response)
            }
            Provider::OpenRouter {
                api_key: api_key_env_var_name,
                model,
            } => {
                dotenv().ok();
                let actual_api_key = env::var(api_key_env_var_name)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))?;

                let request = ChatCompletionRequest {
                    model: model.clone(),
                    messages: vec![ChatMessage {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    }],
                    stream: false,
                    temperature: None,
                    max_tokens: None,
                };

                let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
                let app_name = env::var("APP_NAME").unwrap_or_else(|_| "RecipeFinder".to_string());

                let response = HTTP_CLIENT
                    .post(OPENROUTER_CHAT_URL)
                    .timeout(timeout)
                    .bearer_auth(actual_api_key)
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request)
                    .send()
                    .await?;
                let response = error_for_status(response).await?;
                let body = response.json::<ChatCompletionResponse>().await?;
                body.choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or(ApiConnectionError::EmptyResponse)
            }
        }
    }

    /// Embeds `texts` in one request, one vector per input, order preserved.
    pub async fn call_embed(
        &self,
        texts: &[String],
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>, ApiConnectionError> {
        match self {
            Provider::Ollama { base_url, model } => {
                let request = EmbedRequest {
                    model: model.clone(),
                    input: texts.to_vec(),
                };
                let url = format!("{}{}", base_url, OLLAMA_EMBED_PATH);
                let response = HTTP_CLIENT
                    .post(&url)
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await?;
                let response = error_for_status(response).await?;
                Ok(response.json::<EmbedResponse>().await?.embeddings)
            }
            Provider::OpenRouter { .. } => Err(ApiConnectionError::UnsupportedProvider(
                "OpenRouter does not serve embeddings".to_string(),
            )),
        }
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiConnectionError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(ApiConnectionError::ApiError { status, error_body })
}
