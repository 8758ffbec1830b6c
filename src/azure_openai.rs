//! Azure OpenAI chat-completions client.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AzureOpenAiSettings;
use crate::questions::{
    parse_question_lines, placeholder_questions_prompt, template_match_prompt, QuestionGenerator,
};

const MATCH_TEMPERATURE: f32 = 0.0;
const QUESTION_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct AzureOpenAiClient {
    http: Client,
    url: String,
}

impl AzureOpenAiClient {
    pub fn new(settings: &AzureOpenAiSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(&settings.api_key).context("api key header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .context("build http client")?;
        info!(deployment = %settings.deployment, "azure openai client ready");
        Ok(Self {
            http,
            url: chat_completions_url(settings),
        })
    }

    /// Sends one user message and returns the first choice's text.
    pub async fn complete(&self, prompt: &str, temperature: f32) -> anyhow::Result<String> {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };
        debug!(temperature, prompt_len = prompt.len(), "chat completion");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("chat completion request")?;
        let parsed: ChatResponse = check_response(response)
            .await?
            .json()
            .await
            .context("decode chat completion")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no content"))
    }
}

#[async_trait]
impl QuestionGenerator for AzureOpenAiClient {
    async fn best_template_match(
        &self,
        user_query: &str,
        templates: &[String],
    ) -> anyhow::Result<String> {
        let answer = self
            .complete(&template_match_prompt(user_query, templates), MATCH_TEMPERATURE)
            .await?;
        Ok(answer.trim().to_string())
    }

    async fn questions_for_placeholders(
        &self,
        placeholders: &[String],
    ) -> anyhow::Result<Vec<(String, String)>> {
        if placeholders.is_empty() {
            return Ok(Vec::new());
        }
        let answer = self
            .complete(&placeholder_questions_prompt(placeholders), QUESTION_TEMPERATURE)
            .await?;
        Ok(parse_question_lines(&answer))
    }
}

fn chat_completions_url(settings: &AzureOpenAiSettings) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        settings.endpoint.trim_end_matches('/'),
        settings.deployment,
        settings.api_version
    )
}

async fn check_response(response: Response) -> anyhow::Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or(text);
    Err(anyhow!("azure openai returned {status}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: "https://hr.openai.azure.com/".to_string(),
            api_key: "key".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-15-preview".to_string(),
        }
    }

    #[test]
    fn url_targets_the_deployment() {
        assert_eq!(
            chat_completions_url(&settings()),
            "https://hr.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
        };
        let v = serde_json::to_value(&body).expect("json");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "hi");
        assert!((v["temperature"].as_f64().expect("temp") - 0.2).abs() < 1e-6);
    }

    #[test]
    fn response_without_content_decodes() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#)
                .expect("decode");
        assert!(r.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn empty_placeholder_list_skips_the_call() {
        let client = AzureOpenAiClient::new(&settings()).expect("client");
        let pairs = client.questions_for_placeholders(&[]).await.expect("pairs");
        assert!(pairs.is_empty());
    }
}
