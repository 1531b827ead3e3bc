//! Web search tool backed by the DuckDuckGo Instant Answer API.
//!
//! The API needs no key. It returns an abstract, a direct answer, and a list
//! of related topics; these are flattened into title/url/snippet results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Tool, ToolOutput};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS_CAP: usize = 10;

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point the tool at another Instant Answer compatible endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("toolloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let num_results = (arguments["num_results"].as_u64().unwrap_or(5) as usize)
            .clamp(1, MAX_RESULTS_CAP);

        debug!(query, num_results, "Running web search");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason,
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("search API returned {}", response.status())));
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable search response: {e}")))?;

        let results = answer.into_results(num_results);
        let content = if results.is_empty() {
            format!("No results found for '{query}'.")
        } else {
            serde_json::to_string_pretty(&results).unwrap_or_default()
        };

        Ok(ToolOutput {
            content,
            data: serde_json::to_value(&results).ok(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The subset of the Instant Answer payload we read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Topic {
        #[serde(rename = "Text", default)]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
}

impl InstantAnswer {
    fn into_results(self, limit: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if !self.answer.is_empty() {
            results.push(SearchResult {
                title: if self.heading.is_empty() {
                    "Answer".into()
                } else {
                    self.heading.clone()
                },
                url: self.abstract_url.clone(),
                snippet: self.answer,
            });
        }

        if !self.abstract_text.is_empty() {
            results.push(SearchResult {
                title: self.heading,
                url: self.abstract_url,
                snippet: self.abstract_text,
            });
        }

        let mut stack: Vec<RelatedTopic> = self.related_topics.into_iter().rev().collect();
        while let Some(topic) = stack.pop() {
            match topic {
                RelatedTopic::Group { topics } => stack.extend(topics.into_iter().rev()),
                RelatedTopic::Topic { text, first_url } if !text.is_empty() => {
                    // "Title - rest of the description"
                    let title = text
                        .split_once(" - ")
                        .map_or(text.as_str(), |(t, _)| t)
                        .to_string();
                    results.push(SearchResult {
                        title,
                        url: first_url,
                        snippet: text,
                    });
                }
                RelatedTopic::Topic { .. } => {}
            }
        }

        results.truncate(limit);
        results
    }
}
