//! Conversation messages, tool calls, and tool declarations.
//!
//! Field names follow the Ollama chat API so messages serialize straight onto
//! the wire.

use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

pub const SEARCH_BOOKS: &str = "search_books";
pub const SEND_REPLY: &str = "send_reply";

/// Books returned per search when the model does not say.
pub const DEFAULT_NUMBER_OF_BOOKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Set on tool-role messages: which function produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(name.into()),
            ..Self::text(Role::Tool, content)
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Accepted as an object (Ollama) or a JSON-encoded string (OpenAI style).
    #[serde(default, deserialize_with = "deserialize_arguments")]
    pub arguments: Map<String, Value>,
}

fn deserialize_arguments<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => serde_json::from_str(&s).map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "tool arguments must be an object, got {}",
            other
        ))),
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

pub fn search_books_tool() -> ToolSpec {
    ToolSpec::function(
        SEARCH_BOOKS,
        "Search the book catalog for titles similar to a description, title, author or theme.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for, e.g. 'space opera with a desert planet'"
                },
                "numberOfBooks": {
                    "type": "integer",
                    "description": "How many books to return",
                    "default": DEFAULT_NUMBER_OF_BOOKS
                }
            },
            "required": ["query"]
        }),
    )
}

pub fn send_reply_tool() -> ToolSpec {
    ToolSpec::function(
        SEND_REPLY,
        "Send the final answer to the user.",
        json!({
            "type": "object",
            "properties": {
                "reply": { "type": "string", "description": "The message shown to the user" }
            },
            "required": ["reply"]
        }),
    )
}

/// Tools offered on the first model call of an exchange.
pub fn default_tools() -> Vec<ToolSpec> {
    vec![search_books_tool(), send_reply_tool()]
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    SearchBooks { query: String, number_of_books: usize },
    SendReply { reply: String },
}

impl ToolRequest {
    /// Validate an untrusted tool call against the tools that were offered.
    ///
    /// `numberOfBooks` defaults to 5 and is capped at `max_books`.
    pub fn parse(call: &ToolCall, offered: &[ToolSpec], max_books: usize) -> Result<Self> {
        let name = call.function.name.as_str();
        if !offered.iter().any(|spec| spec.name() == name) {
            return Err(AppError::ToolArgumentError(format!(
                "function '{}' was not offered",
                name
            )));
        }

        let args = &call.function.arguments;
        match name {
            SEARCH_BOOKS => {
                let query = required_string(args, "query")?;
                let number_of_books = match args.get("numberOfBooks") {
                    None | Some(Value::Null) => DEFAULT_NUMBER_OF_BOOKS,
                    Some(value) => positive_integer(value).ok_or_else(|| {
                        AppError::ToolArgumentError(format!(
                            "numberOfBooks must be a positive integer, got {}",
                            value
                        ))
                    })?,
                };

                Ok(ToolRequest::SearchBooks {
                    query,
                    number_of_books: number_of_books.min(max_books.max(1)),
                })
            }
            SEND_REPLY => Ok(ToolRequest::SendReply {
                reply: required_string(args, "reply")?,
            }),
            other => Err(AppError::ToolArgumentError(format!(
                "unsupported function '{}'",
                other
            ))),
        }
    }
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(AppError::ToolArgumentError(format!(
            "argument '{}' is empty",
            key
        ))),
        Some(other) => Err(AppError::ToolArgumentError(format!(
            "argument '{}' must be a string, got {}",
            key, other
        ))),
        None => Err(AppError::ToolArgumentError(format!(
            "missing required argument '{}'",
            key
        ))),
    }
}

/// Models emit counts as 3, 3.0 or "3".
fn positive_integer(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;

    usize::try_from(n).ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_defaults_number_of_books() {
        let call = ToolCall::new(SEARCH_BOOKS, json!({ "query": "desert planet" }));
        let request = ToolRequest::parse(&call, &default_tools(), 25).unwrap();

        assert_eq!(
            request,
            ToolRequest::SearchBooks {
                query: "desert planet".to_string(),
                number_of_books: 5
            }
        );
    }

    #[test]
    fn test_parse_search_accepts_loose_counts_and_caps() {
        for (raw, expected) in [(json!(3), 3), (json!(3.0), 3), (json!("4"), 4), (json!(99), 10)] {
            let call = ToolCall::new(SEARCH_BOOKS, json!({ "query": "q", "numberOfBooks": raw }));
            match ToolRequest::parse(&call, &default_tools(), 10).unwrap() {
                ToolRequest::SearchBooks { number_of_books, .. } => {
                    assert_eq!(number_of_books, expected)
                }
                other => panic!("unexpected request {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let tools = default_tools();
        let cases = [
            ToolCall::new(SEARCH_BOOKS, json!({})),
            ToolCall::new(SEARCH_BOOKS, json!({ "query": "   " })),
            ToolCall::new(SEARCH_BOOKS, json!({ "query": 7 })),
            ToolCall::new(SEARCH_BOOKS, json!({ "query": "q", "numberOfBooks": 0 })),
            ToolCall::new(SEARCH_BOOKS, json!({ "query": "q", "numberOfBooks": -2 })),
            ToolCall::new(SEND_REPLY, json!({})),
            ToolCall::new("delete_everything", json!({})),
        ];

        for call in cases {
            assert!(
                matches!(
                    ToolRequest::parse(&call, &tools, 25),
                    Err(AppError::ToolArgumentError(_))
                ),
                "expected rejection for {:?}",
                call
            );
        }
    }

    #[test]
    fn test_parse_rejects_function_not_offered() {
        let call = ToolCall::new(SEARCH_BOOKS, json!({ "query": "q" }));
        let result = ToolRequest::parse(&call, &[send_reply_tool()], 25);

        assert!(matches!(result, Err(AppError::ToolArgumentError(_))));
    }

    #[test]
    fn test_arguments_accept_json_string() {
        let call: ToolCall = serde_json::from_value(json!({
            "function": { "name": "search_books", "arguments": "{\"query\": \"dune\"}" }
        }))
        .unwrap();

        assert_eq!(call.function.arguments["query"], "dune");
    }

    #[test]
    fn test_message_serialization_omits_empty_fields() {
        let value = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "hi" }));
    }
}
