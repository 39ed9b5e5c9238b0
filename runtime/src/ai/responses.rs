use anyhow::Context;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::Duration;

use super::llm::{ChatMessage, Role};

pub const DEFAULT_BASE: &str = "https://api.openai.com";

pub struct ResponsesClient {
    http: Client,
    api_key: String,
    base: String,
}

impl ResponsesClient {
    pub fn new(api_key: String, base: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            api_key,
            base: base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE.into()),
        })
    }

    /// Pulls the generated text out of a Responses API payload.
    ///
    /// Prefers the flattened `output_text` when present, otherwise joins every
    /// `output_text` block of every `message` item in `output`.
    fn extract_output_text(root: &Value) -> Option<String> {
        if let Some(text) = root.get("output_text").and_then(Value::as_str) {
            return Some(text.to_string());
        }

        let items = root.get("output")?.as_array()?;
        let mut pieces = Vec::new();
        for item in items {
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                pieces.push(text.to_string());
                continue;
            }

            let Some(blocks) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for block in blocks {
                let is_text = block
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| t == "output_text" || t == "text")
                    .unwrap_or(true);
                if !is_text {
                    continue;
                }
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    pieces.push(text.to_string());
                }
            }
        }

        if pieces.is_empty() {
            None
        } else {
            Some(pieces.join(""))
        }
    }

    fn input_items(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| {
                // assistant turns replayed from history are outputs, not inputs
                let content_type = match message.role {
                    Role::Assistant => "output_text",
                    Role::System | Role::User => "input_text",
                };
                json!({
                    "role": message.role.as_str(),
                    "content": [{ "type": content_type, "text": message.content }]
                })
            })
            .collect()
    }

    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/v1{}", self.base, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
    }

    async fn send(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let resp = self
            .post_json(path, body)
            .await
            .with_context(|| format!("Network error calling OpenAI {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let err_txt = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI error {}: {}", status, err_txt);
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("Error decoding OpenAI {path} response"))
    }

    /// Single multi-turn completion. No retries: the caller decides what a
    /// failure means.
    pub async fn responses_text(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f32>,
    ) -> anyhow::Result<String> {
        let mut body = json!({
            "model": model,
            "input": Self::input_items(messages),
        });
        if let Some(temperature) = temperature {
            body["temperature"] = json!(temperature);
        }

        let v = self
            .send("/responses", &body)
            .await
            .with_context(|| "Error from OpenAI responses api")?;

        if let Some(status) = v.get("status").and_then(Value::as_str) {
            if status == "failed" || status == "incomplete" {
                let detail = v
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("no detail");
                anyhow::bail!("OpenAI response {} | {}", status, detail);
            }
        }

        Self::extract_output_text(&v)
            .ok_or_else(|| anyhow::anyhow!("Output text not found in response"))
    }

    pub async fn embedding(&self, model: &str, text: &str) -> anyhow::Result<Vec<f32>> {
        let body = json!({
            "model": model,
            "input": text,
        });

        let v = self
            .send("/embeddings", &body)
            .await
            .with_context(|| "Error from OpenAI embeddings api")?;

        Self::extract_embedding(&v).ok_or_else(|| anyhow::anyhow!("Embedding not found in response"))
    }

    fn extract_embedding(root: &Value) -> Option<Vec<f32>> {
        root.get("data")?
            .as_array()?
            .first()?
            .get("embedding")?
            .as_array()?
            .iter()
            .map(|x| x.as_f64().map(|f| f as f32))
            .collect()
    }
}
