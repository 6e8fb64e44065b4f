//! Conversation handling with the external language model.

pub mod client;
pub mod orchestrator;
pub mod reasoning;
pub mod types;

pub use client::{ModelClient, OllamaClient};
pub use orchestrator::{ChatOutcome, ConversationOrchestrator, TOOL_FAILURE_REPLY};
pub use reasoning::strip_reasoning;
pub use types::{
    default_tools, search_books_tool, send_reply_tool, ChatMessage, FunctionCall, Role, ToolCall,
    ToolRequest, ToolSpec, SEARCH_BOOKS, SEND_REPLY,
};
