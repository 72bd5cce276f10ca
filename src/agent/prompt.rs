//! System prompt for the search agent.

use crate::tools::ToolRegistry;

/// Instruction used by the generic OpenAI tools agent template.
const BASE_INSTRUCTION: &str = "You are a helpful assistant";

/// Build the system prompt.
///
/// Tool definitions travel with the request as function schemas, so the prompt
/// only names them; with no tools it is the bare instruction.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let names = tools
        .list_tools()
        .into_iter()
        .map(|t| t.name)
        .collect::<Vec<_>>();

    if names.is_empty() {
        return BASE_INSTRUCTION.to_string();
    }

    format!(
        "{BASE_INSTRUCTION}. You can call these tools when they help: {}.",
        names.join(", ")
    )
}
