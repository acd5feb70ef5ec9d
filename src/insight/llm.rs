use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Insight, InsightRequest, InsightSynthesizer};
use crate::config::InsightConfig;
use crate::error::{SignalError, SignalResult};

const COLLABORATOR: &str = "insight synthesizer";
const MAX_CODE_CHARS: usize = 8_000;
const SYSTEM_PROMPT: &str = "You review how a candidate worked through a timed coding \
assessment. You receive workflow telemetry metrics, and possibly the final code and the \
candidate's reflection. Reply with one short paragraph of observations about their process, \
then a line starting with 'Conclusion:' followed by a hiring-oriented assessment. Do not \
judge code correctness; tests do that.";

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Synthesizer backed by an OpenAI-compatible chat-completions endpoint.
pub struct LlmSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl LlmSynthesizer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> SignalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| failure(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// `None` when the LLM is disabled or its API key variable is unset.
    pub fn from_config(config: &InsightConfig) -> SignalResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };

        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            Duration::from_millis(config.timeout_ms),
        )
        .map(Some)
    }

    fn payload(&self, request: &InsightRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
        for turn in &request.history {
            messages.push(json!({ "role": turn.role, "content": turn.content }));
        }
        messages.push(json!({ "role": "user", "content": user_prompt(request) }));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.3,
        })
    }
}

#[async_trait]
impl InsightSynthesizer for LlmSynthesizer {
    fn name(&self) -> &'static str {
        COLLABORATOR
    }

    async fn synthesize(&self, request: &InsightRequest) -> SignalResult<Insight> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|err| failure(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failure(format!(
                "endpoint returned {status}: {}",
                body.chars().take(320).collect::<String>()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| failure(format!("invalid response: {err}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        split_reply(&text).ok_or_else(|| failure("empty completion".to_string()))
    }
}

fn failure(message: String) -> SignalError {
    SignalError::EvaluatorFailure {
        collaborator: COLLABORATOR,
        message,
    }
}

fn user_prompt(request: &InsightRequest) -> String {
    let metrics = serde_json::to_string_pretty(&request.metrics).unwrap_or_default();
    let mut prompt = format!(
        "Task: {}\n{}\n\nWorkflow metrics:\n{}",
        request.task_title, request.task_description, metrics
    );

    if let Some(code) = request.code.as_deref().filter(|c| !c.trim().is_empty()) {
        let code: String = code.chars().take(MAX_CODE_CHARS).collect();
        prompt.push_str(&format!("\n\nFinal code:\n```\n{code}\n```"));
    }
    if let Some(reflection) = request.reflection.as_deref().filter(|r| !r.trim().is_empty()) {
        prompt.push_str(&format!("\n\nCandidate reflection:\n{reflection}"));
    }
    prompt
}

/// Splits a completion into insight and the text after a `Conclusion:` line.
pub(crate) fn split_reply(text: &str) -> Option<Insight> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut insight = Vec::new();
    let mut conclusion: Option<Vec<&str>> = None;

    for line in text.lines() {
        match conclusion.as_mut() {
            Some(rest) => rest.push(line),
            None => match line.trim_start().strip_prefix("Conclusion:") {
                Some(first) => conclusion = Some(vec![first.trim_start()]),
                None => insight.push(line),
            },
        }
    }

    let conclusion = conclusion
        .map(|lines| lines.join("\n").trim().to_string())
        .filter(|c| !c.is_empty());

    Some(Insight {
        insight: insight.join("\n").trim().to_string(),
        conclusion,
    })
}
