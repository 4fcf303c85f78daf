use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use outreach_core::config::{LlmConfig, LlmProvider};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const MAX_OUTPUT_TOKENS: u32 = 4096;

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let api_key = config
        .api_key
        .as_ref()
        .map(|key| key.expose_secret().to_owned())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("llm.api_key is required for provider {:?}", config.provider))?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(&api_key, config)?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(&api_key, config)?),
    };
    Ok(client)
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Posts `body` and retries transient statuses up to `max_retries` times, one second apart.
async fn post_with_retry<B, R>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    max_retries: u32,
) -> Result<R>
where
    B: Serialize + Sync,
    R: for<'de> Deserialize<'de>,
{
    for attempt in 0..=max_retries {
        if attempt > 0 {
            warn!(attempt, "retrying completion request after transient error");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let response =
            client.post(url).json(body).send().await.context("completion request failed")?;
        let status = response.status();
        debug!(status = %status, attempt, "completion response received");

        if status.is_success() {
            return response.json::<R>().await.context("failed to decode completion response");
        }

        let text = response.text().await.unwrap_or_default();
        if is_transient(status) && attempt < max_retries {
            warn!(status = %status, body = %text, "transient error, will retry");
            continue;
        }
        bail!("completion API returned {status}: {text}");
    }

    bail!("completion request failed after retries")
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Clone, Debug)]
pub struct AnthropicClient {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: &str, config: &LlmConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).context("invalid API key header value")?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let base = config.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL).trim_end_matches('/');

        Ok(Self {
            client,
            url: format!("{base}/v1/messages"),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: [ChatMessage { role: "user", content: prompt }],
        };
        let response: MessagesResponse =
            post_with_retry(&self.client, &self.url, &request, self.max_retries).await?;

        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| anyhow!("completion response contained no text block"))
    }
}

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &LlmConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("invalid API key header value")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let base = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL).trim_end_matches('/');

        Ok(Self {
            client,
            url: format!("{base}/v1/chat/completions"),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: [ChatMessage { role: "user", content: prompt }],
        };
        let response: ChatCompletionResponse =
            post_with_retry(&self.client, &self.url, &request, self.max_retries).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response contained no message content"))
    }
}
