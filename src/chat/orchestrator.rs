//! Tool-call resolution loop for one chat exchange.
//!
//! Each exchange alternates between asking the model and running the tools it
//! requests:
//!
//! ```text
//! AWAITING_MODEL --(tool calls)--> TOOL_REQUESTED --(results appended)--> AWAITING_MODEL
//!       |
//!       +--(plain content or send_reply)--> TERMINAL_REPLY
//! ```
//!
//! After a round of retrieval the model is only offered `send_reply`, so a
//! well-behaved model finishes after at most one search. A round counter backs
//! this up for models that ignore the offered tool list.

use crate::chat::client::ModelClient;
use crate::chat::reasoning::strip_reasoning;
use crate::chat::types::{
    default_tools, send_reply_tool, ChatMessage, Role, ToolCall, ToolRequest, ToolSpec,
};
use crate::error::{AppError, Result};
use crate::retrieval::RetrievalEngine;
use serde::Serialize;
use std::sync::Arc;

/// Shown to the user when the model issues a tool call we cannot honor.
pub const TOOL_FAILURE_REPLY: &str =
    "Sorry, I couldn't complete that request. Could you try rephrasing it?";

const NO_RESULTS: &str = "No matching books were found.";

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 3;

/// Final state of a chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub history: Vec<ChatMessage>,
}

enum RoundOutcome {
    /// Results were appended; ask the model again.
    Continue,
    /// A terminal reply was appended.
    Finished,
}

pub struct ConversationOrchestrator {
    client: Arc<dyn ModelClient>,
    retrieval: Arc<RetrievalEngine>,
    max_tool_rounds: usize,
    max_books: usize,
    system_prompt: Option<String>,
}

impl ConversationOrchestrator {
    pub fn new(client: Arc<dyn ModelClient>, retrieval: Arc<RetrievalEngine>) -> Self {
        Self {
            client,
            retrieval,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_books: 25,
            system_prompt: None,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_max_books(mut self, max_books: usize) -> Self {
        self.max_books = max_books.max(1);
        self
    }

    /// Prepended to histories that do not open with a system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Handle one user message on top of optional prior history.
    ///
    /// An empty message is rejected before the model is contacted.
    pub async fn chat(&self, message: &str, mut history: Vec<ChatMessage>) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(AppError::EmptyQuery);
        }

        if let Some(prompt) = &self.system_prompt {
            if history.first().map(|m| m.role) != Some(Role::System) {
                history.insert(0, ChatMessage::system(prompt.clone()));
            }
        }
        history.push(ChatMessage::user(message.trim()));

        let history = self.resolve(history, default_tools()).await?;
        let reply = history
            .last()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        Ok(ChatOutcome { reply, history })
    }

    /// Drive the model until it produces a terminal reply.
    ///
    /// Returns the full history, ending with the assistant's final message.
    pub async fn resolve(
        &self,
        mut history: Vec<ChatMessage>,
        mut tools: Vec<ToolSpec>,
    ) -> Result<Vec<ChatMessage>> {
        let mut rounds = 0usize;

        loop {
            let mut message = self.client.complete(&history, &tools).await?;
            message.role = Role::Assistant;

            if message.tool_calls().is_empty() {
                let reply = message
                    .content
                    .as_deref()
                    .map(strip_reasoning)
                    .filter(|text| !text.trim().is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        AppError::ModelUnavailable(
                            "Model returned neither content nor tool calls".to_string(),
                        )
                    })?;

                message.content = Some(reply);
                history.push(message);
                return Ok(history);
            }

            rounds += 1;
            if rounds > self.max_tool_rounds {
                return Err(AppError::ToolLoopExceeded(self.max_tool_rounds));
            }

            let calls = message.tool_calls().to_vec();
            history.push(message);

            match self.run_tool_calls(&calls, &tools, &mut history).await? {
                RoundOutcome::Finished => return Ok(history),
                RoundOutcome::Continue => {
                    tools = vec![send_reply_tool()];
                }
            }
        }
    }

    /// Execute one assistant message's tool calls in order.
    async fn run_tool_calls(
        &self,
        calls: &[ToolCall],
        offered: &[ToolSpec],
        history: &mut Vec<ChatMessage>,
    ) -> Result<RoundOutcome> {
        for call in calls {
            metrics::counter!("chat_tool_calls_total", "tool" => call.function.name.clone())
                .increment(1);

            let request = match ToolRequest::parse(call, offered, self.max_books) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(
                        function = %call.function.name,
                        error = %e,
                        "Rejecting tool call from model"
                    );
                    history.push(ChatMessage::assistant(TOOL_FAILURE_REPLY));
                    return Ok(RoundOutcome::Finished);
                }
            };

            match request {
                ToolRequest::SearchBooks {
                    query,
                    number_of_books,
                } => {
                    let records = self.retrieval.search(&query, number_of_books).await?;
                    tracing::info!(
                        query = %query,
                        number_of_books,
                        found = records.len(),
                        "search_books tool executed"
                    );

                    let content = if records.is_empty() {
                        NO_RESULTS.to_string()
                    } else {
                        records
                            .iter()
                            .map(|r| r.summary_line())
                            .collect::<Vec<_>>()
                            .join("\n")
                    };
                    history.push(ChatMessage::tool(call.function.name.clone(), content));
                }
                ToolRequest::SendReply { reply } => {
                    let text = strip_reasoning(&reply);
                    let text = if text.is_empty() { TOOL_FAILURE_REPLY } else { text };
                    history.push(ChatMessage::assistant(text));
                    return Ok(RoundOutcome::Finished);
                }
            }
        }

        Ok(RoundOutcome::Continue)
    }
}
