// Scripted provider for unit tests.

use super::*;
use std::sync::Mutex;

/// Replies are produced by `reply(user_prompt, call_number)`; every request
/// is recorded for inspection.
pub struct MockProvider {
    reply: Box<dyn Fn(&str, usize) -> anyhow::Result<LLMResponse> + Send + Sync>,
    pub requests: Mutex<Vec<Vec<Message>>>,
    pub options: Mutex<Vec<HashMap<String, serde_json::Value>>>,
}

impl MockProvider {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&str, usize) -> anyhow::Result<LLMResponse> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// A reply that carries a `final_result` tool call with the given arguments.
pub fn tool_reply(arguments: &str) -> LLMResponse {
    LLMResponse {
        content: String::new(),
        tool_calls: Some(vec![ToolCall {
            id: "call_1".into(),
            call_type: Some("function".into()),
            function: FunctionCall {
                name: "final_result".into(),
                arguments: arguments.into(),
            },
        }]),
        finish_reason: "tool_calls".into(),
        usage: Some(UsageInfo {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// A plain-content reply.
pub fn text_reply(content: &str) -> LLMResponse {
    LLMResponse {
        content: content.into(),
        tool_calls: None,
        finish_reason: "stop".into(),
        usage: None,
    }
}

/// The first user message of a request.
pub fn user_prompt(messages: &[Message]) -> &str {
    messages
        .iter()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[async_trait]
impl LLMProvider for MockProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _model: &str,
        options: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<LLMResponse> {
        let call_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(messages.to_vec());
            requests.len()
        };
        self.options.lock().unwrap().push(options.clone());
        (self.reply)(user_prompt(messages), call_number)
    }

    fn default_model(&self) -> &str {
        "mock"
    }
}
