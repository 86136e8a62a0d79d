// SPDX-License-Identifier: MIT

//! OpenAI-backed evaluator - chat completions with a JSON schema response

use super::{Evaluation, Evaluator, EvaluatorError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// JSON schema the model's reply must follow
static EVALUATION_SCHEMA: Lazy<serde_json::Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "feedback": {
                "type": "string",
                "description": "Detailed feedback for the essay."
            },
            "score": {
                "type": "integer",
                "description": "Score out of 10.",
                "minimum": 0,
                "maximum": 10
            }
        },
        "required": ["feedback", "score"],
        "additionalProperties": false
    })
});

/// Evaluator backed by the OpenAI chat completions API.
///
/// The response format is pinned to a JSON schema so the model returns a
/// `{feedback, score}` object; the reply is still run through
/// [Evaluation::from_value] rather than trusted.
pub struct OpenAiEvaluator {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAiEvaluator {
    /// Create a new OpenAiEvaluator.
    ///
    /// Requires `OPENAI_API_KEY` to be set. Optionally uses `OPENAI_BASE_URL`
    /// for custom endpoints and `EVALUATOR_TIMEOUT_SECS` (default 30) for the
    /// per-request timeout.
    pub fn new(model_name: String) -> Result<Self, EvaluatorError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| EvaluatorError::config("OPENAI_API_KEY must be set"))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let timeout = env::var("EVALUATOR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model_name,
            base_url,
        })
    }

    /// Build the chat completions request body
    fn build_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model_name,
            "temperature": 0,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "evaluation",
                    "strict": true,
                    "schema": EVALUATION_SCHEMA.clone()
                }
            }
        })
    }

    /// Pull the assistant message content out of a chat completions response
    /// and validate it against the evaluation contract.
    fn parse_response(response: &serde_json::Value) -> Result<Evaluation, EvaluatorError> {
        let content = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| EvaluatorError::contract("no message content in response"))?;

        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| EvaluatorError::contract(format!("content is not JSON: {}", e)))?;

        Evaluation::from_value(&value)
    }
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    async fn evaluate(&self, prompt: &str) -> Result<Evaluation, EvaluatorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(prompt);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EvaluatorError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
