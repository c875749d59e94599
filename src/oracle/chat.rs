//! Chat-completions oracle
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint and asks for
//! a JSON object answer.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{parse_placement, parse_retention, parse_selection};
use super::{PlacementDecision, PlacementOracle, RelevanceOracle, RetentionOracle};
use crate::config::OracleConfig;
use crate::core::error::{Result, TreeError};
use crate::core::tree::{CategoryEntry, FlatMemory};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

/// Oracle backed by a chat-completions model
#[derive(Debug, Clone)]
pub struct ChatOracle {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl ChatOracle {
    /// Create oracle from config
    pub fn from_config(config: &OracleConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            config.api_key.clone(),
            config.timeout_secs,
        )
    }

    /// Create oracle with explicit parameters
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let endpoint = completions_url(base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            api_key,
        })
    }

    /// Send one user prompt and return the raw answer text
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TreeError::oracle(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(TreeError::oracle(format!("HTTP {}: {}", status, snippet)));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TreeError::oracle(format!("invalid response body: {}", e)))?;

        let answer = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TreeError::oracle("response has no message content"))?;

        debug!(model = %self.model, answer = %answer, "Oracle answered");
        Ok(answer)
    }
}

#[async_trait]
impl RetentionOracle for ChatOracle {
    async fn should_remember(&self, text: &str) -> Result<bool> {
        let answer = self.complete(&retention_prompt(text)).await?;
        parse_retention(&answer)
    }
}

#[async_trait]
impl PlacementOracle for ChatOracle {
    async fn place(&self, content: &str, categories: &[CategoryEntry]) -> Result<PlacementDecision> {
        let answer = self.complete(&placement_prompt(content, categories)).await?;
        parse_placement(&answer)
    }
}

#[async_trait]
impl RelevanceOracle for ChatOracle {
    async fn select_relevant(&self, query: &str, memories: &[FlatMemory]) -> Result<Vec<usize>> {
        let answer = self.complete(&relevance_prompt(query, memories)).await?;
        parse_selection(&answer)
    }
}

/// `{base}/chat/completions`, keeping any path prefix on the base
fn completions_url(base_url: &str) -> anyhow::Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).with_context(|| format!("Invalid oracle URL: {}", base_url))?;
    base.join("chat/completions")
        .with_context(|| format!("Invalid oracle URL: {}", base_url))
}

fn retention_prompt(text: &str) -> String {
    format!(
        "Decide whether the following user message contains personal information \
         worth keeping in long-term memory (identity, preferences, relationships, \
         plans, experiences). Small talk and questions are not worth keeping.\n\n\
         Message: {}\n\n\
         Answer with a JSON object: {{\"should_remember\": true or false}}",
        text
    )
}

fn placement_prompt(content: &str, categories: &[CategoryEntry]) -> String {
    let mut listing = String::new();
    for entry in categories {
        let _ = writeln!(listing, "- {} (id: {})", entry.path, entry.node_id);
    }

    format!(
        "You file personal memories into a category tree.\n\n\
         Existing categories:\n{}\n\
         New information: {}\n\n\
         Pick the best existing category, or propose a new top-level category \
         if none fits. Also write a short summary of the information to store.\n\n\
         Answer with a JSON object:\n\
         {{\"action\": \"attach\" or \"create\", \
         \"target_id\": \"<id of an existing category, for attach>\", \
         \"new_category\": \"<name, for create>\", \
         \"summary\": \"<short summary>\"}}",
        listing, content
    )
}

fn relevance_prompt(query: &str, memories: &[FlatMemory]) -> String {
    let mut listing = String::new();
    for (i, memory) in memories.iter().enumerate() {
        let _ = writeln!(listing, "{}. [{}] {}", i + 1, memory.path, memory.content);
    }

    format!(
        "Stored memories:\n{}\n\
         Question: {}\n\n\
         Select the memories that help answer the question, most relevant first. \
         Select none if nothing is relevant.\n\n\
         Answer with a JSON object: {{\"selected\": [<memory numbers>]}}",
        listing, query
    )
}
