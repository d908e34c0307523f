// Ideaflow - HTTP-based LLM provider (OpenAI-compatible)

use super::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// Option keys consumed by the client itself and never sent to the API.
const CLIENT_OPTIONS: [&str; 2] = ["max_retries", "retry_delay_ms"];

/// HTTPProvider speaks the OpenAI-compatible chat completions API.
/// Works with Ollama, vLLM, llama.cpp server, LM Studio, OpenAI, etc.
pub struct HTTPProvider {
    api_key: String,
    api_base: String,
    client: Client,
    model: String,
}

impl HTTPProvider {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
            model,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl LLMProvider for HTTPProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        options: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<LLMResponse> {
        let use_model = if model.is_empty() { &self.model } else { model };
        let url = format!("{}/chat/completions", self.api_base);

        let max_retries = options
            .get("max_retries")
            .and_then(|v| v.as_u64())
            .unwrap_or(2) as usize;
        let retry_delay_ms = options
            .get("retry_delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000);

        let mut body = json!({
            "model": use_model,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }

        if let Some(obj) = body.as_object_mut() {
            for (k, v) in options {
                if !CLIENT_OPTIONS.contains(&k.as_str()) {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        let mut last_error = None;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                tracing::info!(
                    attempt = attempt,
                    "Retrying LLM request after {}ms delay",
                    retry_delay_ms
                );
                tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
            }

            tracing::debug!(
                url = %url,
                model = %use_model,
                attempt = attempt,
                "Sending LLM request"
            );

            let mut request = self.client.post(&url).json(&body);
            if !self.api_key.is_empty() {
                request = request.bearer_auth(&self.api_key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let response_body = response.text().await?;
                        tracing::debug!(status = %status, body_len = response_body.len(), "LLM response received");
                        return parse_response(&response_body);
                    }

                    let is_transient = status.is_server_error() || status.as_u16() == 429;
                    let response_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "could not read body".to_string());

                    if is_transient && attempt < max_retries {
                        tracing::warn!(status = %status, attempt = attempt, "Transient LLM API error: {}", response_body);
                        last_error = Some(anyhow::anyhow!(
                            "LLM API error ({}): {}",
                            status,
                            response_body
                        ));
                        continue;
                    }
                    anyhow::bail!("LLM API error ({}): {}", status, response_body);
                }
                Err(e) if attempt < max_retries => {
                    tracing::warn!(error = %e, attempt = attempt, "Network error during LLM request");
                    last_error = Some(anyhow::Error::from(e));
                    continue;
                }
                Err(e) => return Err(anyhow::Error::from(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("LLM request failed after {} attempts", max_retries + 1)
        }))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

/// Parse an OpenAI-compatible chat completion response.
fn parse_response(body: &str) -> anyhow::Result<LLMResponse> {
    let v: serde_json::Value = serde_json::from_str(body)?;

    if let Some(err) = v.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| err.as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("LLM API error: {}", msg);
    }

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow::anyhow!("No choices in LLM response"))?;

    let message = choice
        .get("message")
        .ok_or_else(|| anyhow::anyhow!("No message in choice"))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .unwrap_or("stop")
        .to_string();

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    let usage = v.get("usage").map(|u| UsageInfo {
        prompt_tokens: u.get("prompt_tokens").and_then(|n| n.as_u64()).unwrap_or(0) as usize,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|n| n.as_u64())
            .unwrap_or(0) as usize,
        total_tokens: u.get("total_tokens").and_then(|n| n.as_u64()).unwrap_or(0) as usize,
    });

    Ok(LLMResponse {
        content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        finish_reason,
        usage,
    })
}

fn parse_tool_call(tc: &serde_json::Value) -> Option<ToolCall> {
    let func = tc.get("function")?;
    let name = func.get("name").and_then(|n| n.as_str())?.to_string();

    // Some servers send arguments as an object instead of a JSON string.
    let arguments = match func.get("arguments") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    };

    Some(ToolCall {
        id: tc
            .get("id")
            .and_then(|i| i.as_str())
            .unwrap_or("")
            .to_string(),
        call_type: tc.get("type").and_then(|t| t.as_str()).map(String::from),
        function: FunctionCall { name, arguments },
    })
}
