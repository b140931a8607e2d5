//! The two-tool surface exposed to the model.
//!
//! `select_relevant_charts` declares which chart types the model wants;
//! `get_charts` actually retrieves them. The argument shapes are part of
//! the wire contract with the prompt and must not drift.

use nakshatra_core::{MessageToolCall, ToolDefinition, ToolError};
use serde::Deserialize;
use serde_json::json;

pub const SELECT_RELEVANT_CHARTS: &str = "select_relevant_charts";
pub const GET_CHARTS: &str = "get_charts";

/// A parsed, validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartToolCall {
    Select {
        chart_types: Vec<String>,
        reasoning: String,
    },
    Get {
        chart_types: Vec<String>,
        search_query: String,
        max_results: Option<usize>,
    },
}

#[derive(Deserialize)]
struct SelectArgs {
    chart_types: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Deserialize)]
struct GetArgs {
    chart_types: Vec<String>,
    search_query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

impl ChartToolCall {
    /// Parse a raw tool call from the model.
    pub fn parse(call: &MessageToolCall) -> Result<Self, ToolError> {
        match call.name.as_str() {
            SELECT_RELEVANT_CHARTS => {
                let args: SelectArgs = serde_json::from_str(&call.arguments)
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                Ok(Self::Select {
                    chart_types: args.chart_types,
                    reasoning: args.reasoning,
                })
            }
            GET_CHARTS => {
                let args: GetArgs = serde_json::from_str(&call.arguments)
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                Ok(Self::Get {
                    chart_types: args.chart_types,
                    search_query: args.search_query,
                    max_results: args.max_results,
                })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// Keep only the requested chart types that actually exist for this user.
/// Unknown types are dropped rather than rejected.
pub fn recognized_types(requested: &[String], available: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|t| available.iter().any(|a| a == *t))
        .cloned()
        .collect()
}

/// Build the tool definitions, enumerating the user's available chart
/// types in the schema so the model picks from real options.
pub fn definitions(available_types: &[String]) -> Vec<ToolDefinition> {
    let type_schema = json!({
        "type": "array",
        "items": { "type": "string", "enum": available_types },
        "description": "Chart types to include, from the available set"
    });

    vec![
        ToolDefinition {
            name: SELECT_RELEVANT_CHARTS.into(),
            description: "Declare which of the user's chart types are relevant \
                          to their question before retrieving them."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "chart_types": type_schema,
                    "reasoning": {
                        "type": "string",
                        "description": "Why these chart types answer the question"
                    }
                },
                "required": ["chart_types", "reasoning"]
            }),
        },
        ToolDefinition {
            name: GET_CHARTS.into(),
            description: "Retrieve the selected chart data for the user, ranked \
                          by relevance to the search query."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "chart_types": type_schema,
                    "search_query": {
                        "type": "string",
                        "description": "What to search the chart content for"
                    },
                    "max_results": {
                        "type": "number",
                        "description": "Maximum number of chart entries to return"
                    }
                },
                "required": ["chart_types", "search_query"]
            }),
        },
    ]
}
