//! Agent module - the web search agent and the runner seam around it.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user message
//! 2. Call LLM with the web search tool
//! 3. If LLM requests tool call, execute it and feed result back
//! 4. Repeat until LLM produces final response or max iterations reached
//!
//! A fresh agent is built for every run by [`AgentFactory`]; callers only see
//! the [`AgentRunner`] trait, which the response cache also implements.

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentOutput, ITERATION_LIMIT_OUTPUT};
pub use prompt::build_system_prompt;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, SearchConfig};
use crate::llm::{LlmClient, OpenAiClient};
use crate::tools::{TavilySearch, ToolRegistry};

/// Something that turns a user message into the agent's final answer.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run the agent for `message` with `model`. An empty message yields an
    /// empty answer.
    async fn run_agent(&self, message: &str, model: &str) -> anyhow::Result<String>;
}

/// Shared reference to a runner.
pub type RunnerRef = Arc<dyn AgentRunner>;

/// Builds a search agent per run.
pub struct AgentFactory {
    llm: Arc<dyn LlmClient>,
    search: SearchConfig,
    max_iterations: usize,
    verbose: bool,
}

impl AgentFactory {
    pub fn new(llm: Arc<dyn LlmClient>, search: SearchConfig, max_iterations: usize) -> Self {
        Self {
            llm,
            search,
            max_iterations,
            verbose: false,
        }
    }

    /// Factory talking to the configured chat completion endpoint.
    pub fn from_config(config: &Config) -> Self {
        let llm = Arc::new(OpenAiClient::new(
            config.api_key.clone(),
            config.api_base_url.clone(),
        ));
        Self {
            verbose: config.verbose,
            ..Self::new(llm, config.search.clone(), config.max_iterations)
        }
    }

    /// Build the tool set for one run. Currently web search only.
    pub fn build_tools(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(TavilySearch::new(self.search.clone())));
        tools
    }

    /// Build a fresh agent bound to `model`.
    pub fn build(&self, model: &str) -> Agent {
        Agent::new(
            Arc::clone(&self.llm),
            self.build_tools(),
            model,
            self.max_iterations,
        )
        .verbose(self.verbose)
    }
}

#[async_trait]
impl AgentRunner for AgentFactory {
    async fn run_agent(&self, message: &str, model: &str) -> anyhow::Result<String> {
        if message.is_empty() {
            return Ok(String::new());
        }

        let agent = self.build(model);
        let result = agent.run(message).await?;
        if result.stopped {
            tracing::warn!(
                "Agent for model {} stopped after {} iterations",
                model,
                result.iterations
            );
        }
        Ok(result.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ChatResponse, LlmError, ToolDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLlm {
        calls: AtomicUsize,
        tool_names: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.tool_names.lock().unwrap() = tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.function.name.clone())
                .collect();
            Ok(ChatResponse {
                content: Some("Paris".into()),
                ..Default::default()
            })
        }
    }

    fn factory() -> (Arc<CountingLlm>, AgentFactory) {
        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            tool_names: std::sync::Mutex::new(Vec::new()),
        });
        let factory = AgentFactory::new(
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            SearchConfig::new("tvly-test".into()),
            30,
        );
        (llm, factory)
    }

    #[tokio::test]
    async fn empty_message_skips_the_model() {
        let (llm, factory) = factory();
        let out = factory.run_agent("", "gpt-4-turbo-preview").await.unwrap();
        assert_eq!(out, "");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_offers_only_web_search() {
        let (llm, factory) = factory();
        let out = factory
            .run_agent("What is the capital of France?", "gpt-4-turbo-preview")
            .await
            .unwrap();
        assert_eq!(out, "Paris");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *llm.tool_names.lock().unwrap(),
            vec!["tavily_search_results_json".to_string()]
        );
    }
}
