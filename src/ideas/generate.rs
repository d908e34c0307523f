// Ideaflow - Blog idea generation through the LLM provider

use super::{BlogIdea, IdeaError, Product};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::provider::factory::request_options;
use crate::provider::{LLMProvider, LLMResponse, Message, ToolDefinition};
use crate::workflow::TaskOutcome;
use anyhow::Context;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const TASK_ID: &str = "generate_blog_idea";

/// Name of the tool the model calls to hand back its structured answer.
pub const OUTPUT_TOOL: &str = "final_result";

pub const SYSTEM_PROMPT: &str = "You are an experienced content strategist tasked with generating \
an engaging and informative blog idea based on a given product name. Given the product name \
provided, produce a compelling idea for a blog post.

Return only the name and the idea.

Product Name: [Insert Product Name Here]";

pub const SKIP_REASON: &str = "No product provided";

pub struct IdeaGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: HashMap<String, serde_json::Value>,
    output_retries: usize,
}

impl IdeaGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, cfg: &Config) -> Self {
        let mut options = request_options(cfg);
        options.insert("tool_choice".to_string(), json!("required"));

        Self {
            provider,
            model: cfg.model.name.clone(),
            options,
            output_retries: cfg.model.output_retries,
        }
    }

    /// User prompt for one product.
    pub fn prompt_for(product: &Product) -> String {
        format!("Product Name: {}", product.name())
    }

    /// Generate one idea, recording requests in the run's `metrics`. A
    /// missing product is a skip, not an error, and makes no request.
    pub async fn generate(
        &self,
        product: Option<Product>,
        metrics: &Metrics,
    ) -> anyhow::Result<TaskOutcome<BlogIdea>> {
        let Some(product) = product else {
            return Ok(TaskOutcome::skip(SKIP_REASON));
        };

        let tools = [output_tool()];
        let mut messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::prompt_for(&product)),
        ];

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let response = self
                .provider
                .chat(&messages, &tools, &self.model, &self.options)
                .await
                .with_context(|| format!("LLM request for product '{}' failed", product.name()))?;

            let usage = response.usage.clone().unwrap_or_default();
            metrics
                .record_llm_call(
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    started.elapsed(),
                )
                .await;

            match parse_blog_idea(&response) {
                Ok(idea) => {
                    tracing::debug!(product = %product.name(), attempt = attempt, "Parsed blog idea");
                    return Ok(TaskOutcome::Done(idea));
                }
                Err(e) => {
                    metrics.record_invalid_output().await;
                    if attempt >= self.output_retries {
                        return Err(anyhow::Error::from(e).context(format!(
                            "model reply for product '{}' did not match BlogIdea after {} attempt(s)",
                            product.name(),
                            attempt + 1
                        )));
                    }
                    tracing::warn!(
                        product = %product.name(),
                        attempt = attempt,
                        "Invalid structured output, asking the model to retry: {}",
                        e
                    );
                    messages.extend(retry_messages(&response, &e));
                    attempt += 1;
                }
            }
        }
    }
}

fn output_tool() -> ToolDefinition {
    ToolDefinition::function(
        OUTPUT_TOOL,
        "The final response which ends this conversation",
        BlogIdea::json_schema(),
    )
}

/// Extract a `BlogIdea` from a reply: the output tool call if present,
/// otherwise JSON in the message content.
pub fn parse_blog_idea(response: &LLMResponse) -> Result<BlogIdea, IdeaError> {
    if let Some(call) = response.find_tool_call(OUTPUT_TOOL) {
        return Ok(serde_json::from_str(&call.function.arguments)?);
    }

    if let Some(json_text) = extract_json(&response.content) {
        return Ok(serde_json::from_str(json_text)?);
    }

    match response.tool_calls.as_ref().and_then(|c| c.first()) {
        Some(call) => Err(IdeaError::UnknownTool(call.function_name().to_string())),
        None => Err(IdeaError::NoStructuredOutput(OUTPUT_TOOL)),
    }
}

/// Find a JSON object in free text: a fenced block first, then the outermost
/// braces.
fn extract_json(content: &str) -> Option<&str> {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    let fenced = FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
    });

    if let Some(m) = fenced.captures(content).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Messages that hand a validation error back to the model.
fn retry_messages(response: &LLMResponse, error: &IdeaError) -> Vec<Message> {
    let feedback = format!("Validation error: {}\n\nFix the errors and try again.", error);

    match &response.tool_calls {
        Some(calls) if !calls.is_empty() => {
            let mut out = vec![Message::assistant_with_tool_calls(
                response.content.clone(),
                calls.clone(),
            )];
            // Every tool call id must get an answer.
            for call in calls {
                let content = if call.function_name() == OUTPUT_TOOL {
                    feedback.clone()
                } else {
                    format!(
                        "Unknown tool name: '{}'. The only available tool is '{}'.",
                        call.function_name(),
                        OUTPUT_TOOL
                    )
                };
                out.push(Message::tool_result(call.id.clone(), content));
            }
            out
        }
        _ => vec![
            Message::assistant_with_tool_calls(response.content.clone(), Vec::new()),
            Message::user(feedback),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{text_reply, tool_reply, MockProvider};

    fn generator(provider: Arc<MockProvider>, output_retries: usize) -> IdeaGenerator {
        let mut cfg = Config::default();
        cfg.model.output_retries = output_retries;
        IdeaGenerator::new(provider, &cfg)
    }

    #[tokio::test]
    async fn test_missing_product_is_skipped() {
        let provider = Arc::new(MockProvider::new(|_, _| {
            Err(anyhow::anyhow!("should not be called"))
        }));
        let task = generator(provider.clone(), 1);

        let outcome = task.generate(None, &Metrics::new()).await.unwrap();
        assert!(outcome.is_skipped());
        assert_eq!(outcome, TaskOutcome::skip("No product provided"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generates_from_tool_call() {
        let provider = Arc::new(MockProvider::new(|prompt, _| {
            assert_eq!(prompt, "Product Name: Astronomer");
            Ok(tool_reply(
                r#"{"name": "Astronomer", "idea": "Running Airflow at scale"}"#,
            ))
        }));
        let task = generator(provider.clone(), 1);

        let outcome = task.generate(Product::new("Astronomer"), &Metrics::new()).await.unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::Done(BlogIdea::new("Astronomer", "Running Airflow at scale").unwrap())
        );

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0][0].role, "system");
        assert!(requests[0][0].content.contains("content strategist"));

        let options = provider.options.lock().unwrap();
        assert_eq!(options[0]["tool_choice"], json!("required"));
    }

    #[tokio::test]
    async fn test_retries_malformed_output_once() {
        let provider = Arc::new(MockProvider::new(|_, call| match call {
            1 => Ok(tool_reply(r#"{"name": "Astro CLI"}"#)),
            _ => Ok(tool_reply(r#"{"name": "Astro CLI", "idea": "Testing DAGs locally"}"#)),
        }));
        let task = generator(provider.clone(), 1);

        let metrics = Metrics::new();
        let outcome = task.generate(Product::new("Astro CLI"), &metrics).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Done(ref i) if i.idea == "Testing DAGs locally"));
        assert_eq!(provider.call_count(), 2);

        let requests = provider.requests.lock().unwrap();
        let retry = &requests[1];
        assert_eq!(retry.len(), 4);
        assert_eq!(retry[2].role, "assistant");
        assert_eq!(retry[3].role, "tool");
        assert_eq!(retry[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(retry[3].content.contains("Fix the errors"));

        let report = metrics.report().await;
        assert_eq!(report.llm_requests, 2);
        assert_eq!(report.invalid_outputs, 1);
    }

    #[tokio::test]
    async fn test_malformed_output_fails_after_retries() {
        let provider = Arc::new(MockProvider::new(|_, _| Ok(text_reply("Sure! Here is an idea."))));
        let task = generator(provider.clone(), 1);

        let err = task.generate(Product::new("Apache Airflow"), &Metrics::new()).await.unwrap_err();
        assert!(err.to_string().contains("Apache Airflow"));
        assert!(err.root_cause().to_string().contains("final_result"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_output_retries() {
        let provider = Arc::new(MockProvider::new(|_, _| Ok(tool_reply("{not json"))));
        let task = generator(provider.clone(), 0);

        assert!(task.generate(Product::new("Astronomer"), &Metrics::new()).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(MockProvider::new(|_, _| {
            Err(anyhow::anyhow!("connection refused"))
        }));
        let task = generator(provider.clone(), 3);

        let err = task.generate(Product::new("Astronomer"), &Metrics::new()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_parse_json_content() {
        let idea = parse_blog_idea(&text_reply(
            r#"{"name": "Astronomer", "idea": "Managed Airflow explained"}"#,
        ))
        .unwrap();
        assert_eq!(idea.name, "Astronomer");
    }

    #[test]
    fn test_parse_fenced_json_content() {
        let content = "Here you go:\n```json\n{\"name\": \"Astro CLI\", \"idea\": \"CI for DAGs\"}\n```\nEnjoy!";
        let idea = parse_blog_idea(&text_reply(content)).unwrap();
        assert_eq!(idea.idea, "CI for DAGs");
    }

    #[test]
    fn test_parse_rejects_blank_fields() {
        let err = parse_blog_idea(&tool_reply(r#"{"name": "", "idea": "x"}"#)).unwrap_err();
        assert!(matches!(err, IdeaError::InvalidJson(_)));
        assert!(err.to_string().contains("'name' must not be empty"));
    }

    #[test]
    fn test_parse_unknown_tool() {
        let mut reply = tool_reply("{}");
        if let Some(calls) = reply.tool_calls.as_mut() {
            calls[0].function.name = "search".into();
        }
        let err = parse_blog_idea(&reply).unwrap_err();
        assert!(matches!(err, IdeaError::UnknownTool(ref n) if n == "search"));

        let msgs = retry_messages(&reply, &err);
        assert!(msgs[1].content.contains("Unknown tool name: 'search'"));
    }

    #[test]
    fn test_parse_empty_reply() {
        let err = parse_blog_idea(&text_reply("")).unwrap_err();
        assert!(matches!(err, IdeaError::NoStructuredOutput(_)));
    }
}
