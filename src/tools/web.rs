//! Web access tool: Tavily search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Tool, ToolError};
use crate::config::SearchConfig;

const TOOL_NAME: &str = "tavily_search_results_json";

const DESCRIPTION: &str = "A search engine optimized for comprehensive, accurate, and trusted results. \
Useful for when you need to answer questions about current events. \
Input should be a search query. \
If you don't get good search results, please change the keywords and search again.";

/// Search the web through the Tavily API.
pub struct TavilySearch {
    client: reqwest::Client,
    config: SearchConfig,
}

impl TavilySearch {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "search query to look up"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = args["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: TOOL_NAME.to_string(),
                reason: "missing 'query' argument".to_string(),
            })?;

        tracing::debug!("Tavily search: {}", query);

        let request = SearchRequest {
            api_key: &self.config.api_key,
            query,
            max_results: self.config.max_results,
            search_depth: "advanced",
            include_answer: false,
            include_raw_content: false,
            include_images: false,
        };

        let response = self
            .client
            .post(format!("{}/search", self.config.api_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Tavily request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(512).collect();
            return Err(anyhow::anyhow!("Tavily HTTP {}: {}", status, snippet).into());
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Tavily response: {}", e))?;

        let results: Vec<Value> = parsed
            .results
            .into_iter()
            .take(self.config.max_results as usize)
            .map(|hit| json!({ "url": hit.url, "content": hit.content }))
            .collect();

        Ok(Value::Array(results).to_string())
    }
}
