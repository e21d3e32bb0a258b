//! The external text-completion collaborator.
//!
//! Every pass that needs a model call goes through the [`Completion`]
//! capability: prompt in, text out, transport failures typed. The
//! production implementation speaks the OpenAI-compatible chat-completions
//! protocol; tests substitute a canned fake so classification logic stays
//! deterministic and offline.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty completion in response")]
    EmptyContent,
}

/// Text-completion capability: prompt in, completion text out.
#[async_trait]
pub trait Completion {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError>;
}

/// Bounded retry with a fixed delay between attempts, plus the pause
/// inserted after every collaborator interaction to respect rate limits.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Runs `complete` under the retry policy. Returns the last transport error
/// once the attempt budget is exhausted; the caller treats that as a
/// skip-this-record diagnostic, never a pass-level abort.
pub async fn complete_with_retry<C: Completion + ?Sized>(
    llm: &C,
    policy: &RetryPolicy,
    prompt: &str,
) -> Result<String, TransportError> {
    let mut last_err = TransportError::EmptyContent;
    for attempt in 1..=policy.max_attempts.max(1) {
        match llm.complete(prompt).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(
                    "completion attempt {attempt}/{} failed: {e}",
                    policy.max_attempts.max(1)
                );
                last_err = e;
                if attempt < policy.max_attempts.max(1) {
                    sleep(policy.retry_delay).await;
                }
            }
        }
    }
    Err(last_err)
}

/// OpenAI-compatible chat-completions client: one user message per call,
/// fixed low temperature.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.2,
        })
    }
}

#[async_trait]
impl Completion for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self.client.post(&url).bearer_auth(&self.api_key).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let resp_json: Value = resp.json().await?;
        resp_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(TransportError::EmptyContent)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CannedCompletion;
    use super::*;

    fn fast_policy(max_attempts: u8) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let llm = CannedCompletion::new(vec![
            Err("unavailable".to_string()),
            Err("unavailable".to_string()),
            Ok("- Category: [3]".to_string()),
        ]);
        let out = complete_with_retry(&llm, &fast_policy(3), "prompt").await;
        assert_eq!(out.unwrap(), "- Category: [3]");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let llm = CannedCompletion::new(vec![Err("down".to_string())]);
        let out = complete_with_retry(&llm, &fast_policy(3), "prompt").await;
        match out {
            Err(TransportError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let llm = CannedCompletion::new(vec![Ok("done".to_string())]);
        let out = complete_with_retry(&llm, &fast_policy(5), "prompt").await;
        assert_eq!(out.unwrap(), "done");
        assert_eq!(llm.calls(), 1);
    }
}
