//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, and any other
//! endpoint that follows the chat completions contract.  The configured
//! `base_url` is the full chat-completions URL.

use serde_json::Value;

use ps_domain::config::LlmConfig;
use ps_domain::error::{Error, Result};
use ps_domain::stream::FragmentStream;

use crate::prompt;
use crate::sse::SseStep;
use crate::traits::{AnswerProvider, AnswerRequest, DecisionProvider};
use crate::util::{ensure_success, from_reqwest, http_client, resolve_api_key};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build from `[llm]`.  Fails when the API key variable is unset.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;
        Ok(Self {
            id: "openai_compat".into(),
            endpoint: cfg.base_url.clone(),
            api_key,
            model: cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            client: http_client(cfg.timeout())?,
        })
    }

    fn authed_post(&self) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
    }

    fn build_answer_body(&self, req: &AnswerRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": prompt::answer_messages(req),
        });
        if !req.user_id.is_empty() {
            body["user"] = Value::String(req.user_id.clone());
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One streamed `data:` payload → content delta, if any.
fn parse_sse_data(data: &str) -> SseStep {
    if data.trim() == "[DONE]" {
        return SseStep::Done;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return SseStep::Fragments(vec![Err(Error::Json(e))]),
    };

    let delta = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty());

    match delta {
        Some(text) => SseStep::Fragments(vec![Ok(text.to_string())]),
        None => SseStep::Fragments(Vec::new()),
    }
}

/// Non-streaming response → assistant message text.
fn parse_message_content(provider: &str, body: &Value) -> Result<String> {
    body.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::Provider {
            provider: provider.to_owned(),
            message: "response has no choices[0].message.content".into(),
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AnswerProvider for OpenAiCompatProvider {
    async fn stream_answer(&self, req: AnswerRequest) -> Result<FragmentStream> {
        let body = self.build_answer_body(&req);
        tracing::debug!(provider = %self.id, url = %self.endpoint, "openai_compat stream request");

        let resp = self
            .authed_post()
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = ensure_success(&self.id, resp).await?;

        Ok(crate::sse::sse_fragment_stream(resp, parse_sse_data))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[async_trait::async_trait]
impl DecisionProvider for OpenAiCompatProvider {
    async fn decide(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
        });
        tracing::debug!(provider = %self.id, "openai_compat decision request");

        let resp = self
            .authed_post()
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = ensure_success(&self.id, resp).await?;
        let json: Value = resp.json().await.map_err(from_reqwest)?;
        parse_message_content(&self.id, &json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
