//! Core agent loop implementation.

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, Role, ToolCall};
use crate::tools::{ToolError, ToolRegistry};

use super::prompt::build_system_prompt;

/// Output returned when the loop hits its iteration cap.
pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

/// Result of one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    /// Final answer (or the stop notice when `stopped` is set)
    pub output: String,
    /// Number of model calls made
    pub iterations: usize,
    /// Whether the iteration cap ended the run
    pub stopped: bool,
}

/// A tool-calling agent bound to one model.
///
/// # Algorithm
/// 1. Seed the conversation with the system prompt and the user input
/// 2. Call the model with the tool schemas
/// 3. Execute requested tool calls and append their results
/// 4. Repeat until the model answers without tool calls, or the cap is reached
///
/// Malformed tool-call arguments and unknown tool names are reported back to
/// the model as the tool result; failures of the tool itself abort the run.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    max_iterations: usize,
    verbose: bool,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        model: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            max_iterations,
            verbose: false,
        }
    }

    /// Log each step at info level instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the agent on a user input until it produces a final answer.
    pub async fn run(&self, input: &str) -> anyhow::Result<AgentOutput> {
        let mut messages = vec![
            ChatMessage::new(Role::System, build_system_prompt(&self.tools)),
            ChatMessage::new(Role::User, input),
        ];

        let tool_schemas = self.tools.get_tool_schemas();

        for iteration in 0..self.max_iterations {
            self.log_step(format_args!(
                "Agent iteration {} (model={})",
                iteration + 1,
                self.model
            ));

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await?;

            let tool_calls = response.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                if response.finish_reason.as_deref() == Some("length") {
                    tracing::warn!("Final answer was cut off at the model's output limit");
                }
                let output = response.content.unwrap_or_default();
                self.log_step(format_args!(
                    "Agent finished: {}",
                    truncate_for_log(&output, 500)
                ));
                return Ok(AgentOutput {
                    output,
                    iterations: iteration + 1,
                    stopped: false,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                tool_calls.clone(),
            ));

            for tool_call in &tool_calls {
                self.log_step(format_args!(
                    "Calling tool: {} with args: {}",
                    tool_call.function.name, tool_call.function.arguments
                ));

                let observation = match self.execute_tool_call(tool_call).await {
                    Ok(output) => output,
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!("Recovering from tool call error: {}", e);
                        self.recovery_message(&e)
                    }
                    Err(e) => return Err(e.into()),
                };

                self.log_step(format_args!(
                    "Tool result: {}",
                    truncate_for_log(&observation, 1000)
                ));

                messages.push(ChatMessage::tool_result(&tool_call.id, observation));
            }
        }

        tracing::warn!(
            "Max iterations ({}) reached without a final answer",
            self.max_iterations
        );
        Ok(AgentOutput {
            output: ITERATION_LIMIT_OUTPUT.to_string(),
            iterations: self.max_iterations,
            stopped: true,
        })
    }

    /// Execute a single tool call, validating its JSON arguments first.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> Result<String, ToolError> {
        let name = &tool_call.function.name;
        let raw = tool_call.function.arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };

        let args: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool: name.clone(),
                reason: format!("arguments are not valid JSON ({})", e),
            })?;

        if !args.is_object() {
            return Err(ToolError::InvalidArguments {
                tool: name.clone(),
                reason: "arguments must be a JSON object".to_string(),
            });
        }

        self.tools.execute(name, args).await
    }

    /// Text fed back to the model in place of a tool result.
    fn recovery_message(&self, error: &ToolError) -> String {
        match error {
            ToolError::UnknownTool(_) => {
                let names = self
                    .tools
                    .list_tools()
                    .into_iter()
                    .map(|t| t.name)
                    .collect::<Vec<_>>();
                format!("{}, try one of [{}].", error, names.join(", "))
            }
            _ => format!("Invalid or incomplete response: {}", error),
        }
    }

    fn log_step(&self, args: std::fmt::Arguments<'_>) {
        if self.verbose {
            tracing::info!("{}", args);
        } else {
            tracing::debug!("{}", args);
        }
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, LlmError, ToolDefinition};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        repeat_last: bool,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
                repeat_last: false,
            }
        }

        fn forever(response: ChatResponse) -> Self {
            Self {
                repeat_last: true,
                ..Self::new(vec![response])
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatResponse, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            let next = if self.repeat_last && responses.len() == 1 {
                responses.front().cloned()
            } else {
                responses.pop_front()
            };
            next.ok_or_else(|| LlmError::Network("script exhausted".into()))
        }
    }

    struct CountingSearch {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Tool for CountingSearch {
        fn name(&self) -> &str {
            "search"
        }

        fn description(&self) -> &str {
            "test search"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow::anyhow!("search service unavailable").into());
            }
            Ok(format!("results for {}", args["query"]))
        }
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: id.to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }]),
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    fn agent_with(llm: Arc<ScriptedLlm>, search: Arc<CountingSearch>, cap: usize) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(search);
        Agent::new(llm, tools, "gpt-4-turbo-preview", cap)
    }

    fn search(fail: bool) -> Arc<CountingSearch> {
        Arc::new(CountingSearch {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn direct_answer_ends_after_one_iteration() {
        let llm = Arc::new(ScriptedLlm::new(vec![answer("Paris")]));
        let out = agent_with(llm, search(false), 30).run("capital?").await.unwrap();
        assert_eq!(
            out,
            AgentOutput {
                output: "Paris".into(),
                iterations: 1,
                stopped: false
            }
        );
    }

    #[tokio::test]
    async fn truncated_answer_is_still_returned() {
        let llm = Arc::new(ScriptedLlm::new(vec![ChatResponse {
            content: Some("Paris is the capi".into()),
            tool_calls: None,
            finish_reason: Some("length".into()),
        }]));
        let out = agent_with(llm, search(false), 30).run("capital?").await.unwrap();
        assert_eq!(out.output, "Paris is the capi");
        assert!(!out.stopped);
    }

    #[tokio::test]
    async fn tool_result_is_fed_back() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("c1", "search", r#"{"query":"capital of France"}"#),
            answer("Paris"),
        ]));
        let tool = search(false);
        let out = agent_with(Arc::clone(&llm), Arc::clone(&tool), 30)
            .run("What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(out.output, "Paris");
        assert_eq!(out.iterations, 2);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

        let seen = llm.seen.lock().unwrap();
        let last = seen.last().unwrap();
        let tool_msg = last.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert!(tool_msg.content.as_ref().unwrap().contains("capital of France"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_not_fatal() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("c1", "search", "{query: oops"),
            answer("recovered"),
        ]));
        let tool = search(false);
        let out = agent_with(Arc::clone(&llm), Arc::clone(&tool), 30)
            .run("q")
            .await
            .unwrap();

        assert_eq!(out.output, "recovered");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
        let seen = llm.seen.lock().unwrap();
        let feedback = seen[1].last().unwrap().content.clone().unwrap();
        assert!(feedback.starts_with("Invalid or incomplete response"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_with_alternatives() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("c1", "calculator", "{}"),
            answer("done"),
        ]));
        let out = agent_with(Arc::clone(&llm), search(false), 30)
            .run("q")
            .await
            .unwrap();

        assert_eq!(out.output, "done");
        let seen = llm.seen.lock().unwrap();
        let feedback = seen[1].last().unwrap().content.clone().unwrap();
        assert_eq!(feedback, "calculator is not a valid tool, try one of [search].");
    }

    #[tokio::test]
    async fn iteration_cap_stops_without_error() {
        let llm = Arc::new(ScriptedLlm::forever(call(
            "c",
            "search",
            r#"{"query":"again"}"#,
        )));
        let tool = search(false);
        let out = agent_with(Arc::clone(&llm), Arc::clone(&tool), 3)
            .run("loop forever")
            .await
            .unwrap();

        assert!(out.stopped);
        assert_eq!(out.output, ITERATION_LIMIT_OUTPUT);
        assert_eq!(out.iterations, 3);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
        assert_eq!(llm.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn tool_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new(vec![call(
            "c1",
            "search",
            r#"{"query":"x"}"#,
        )]));
        let err = agent_with(llm, search(true), 30).run("q").await.unwrap_err();
        assert!(err.to_string().contains("search service unavailable"));
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        assert!(agent_with(llm, search(false), 30).run("q").await.is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "ééééé";
        let t = truncate_for_log(s, 3);
        assert!(t.starts_with('é'));
        assert!(t.ends_with("[truncated]"));
    }
}
