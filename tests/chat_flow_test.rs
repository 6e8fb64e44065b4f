//! End-to-end tool-call resolution with a scripted model and a real retrieval engine.

mod common;

use common::{built_engine, sample_corpus, tool_calls, ScriptedModel};
use serde_json::json;
use shelfwise::chat::{
    ChatMessage, ConversationOrchestrator, Role, ToolCall, SEARCH_BOOKS, SEND_REPLY,
    TOOL_FAILURE_REPLY,
};
use shelfwise::AppError;
use std::sync::Arc;

const PROMPT: &str = "You are a test librarian.";

async fn orchestrator(model: Arc<ScriptedModel>) -> ConversationOrchestrator {
    let (engine, _) = built_engine(sample_corpus()).await;
    ConversationOrchestrator::new(model, engine).with_system_prompt(PROMPT)
}

fn offers(tools: &[shelfwise::chat::ToolSpec], name: &str) -> bool {
    tools.iter().any(|t| t.name() == name)
}

/// Searches when allowed, then answers through `send_reply`.
fn search_then_reply(reply: &'static str) -> ScriptedModel {
    ScriptedModel::new(move |_, tools| {
        if offers(tools, SEARCH_BOOKS) {
            Ok(tool_calls(vec![ToolCall::new(
                SEARCH_BOOKS,
                json!({ "query": "dune", "numberOfBooks": 2 }),
            )]))
        } else {
            Ok(tool_calls(vec![ToolCall::new(
                SEND_REPLY,
                json!({ "reply": reply }),
            )]))
        }
    })
}

#[tokio::test]
async fn test_exchange_converges_after_one_search() {
    let model = Arc::new(search_then_reply("<think>they like Herbert</think>\nTry Dune."));
    let orchestrator = orchestrator(model.clone()).await;

    let outcome = orchestrator
        .chat("Recommend a desert planet book", Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Try Dune.");

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tools, vec![SEARCH_BOOKS, SEND_REPLY]);
    assert_eq!(calls[1].tools, vec![SEND_REPLY]);

    // system, user, search call, search results, send_reply call, final reply
    let roles: Vec<Role> = outcome.history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::Assistant
        ]
    );
    assert_eq!(outcome.history[4].tool_calls()[0].function.name, SEND_REPLY);

    let tool_message = &outcome.history[3];
    assert_eq!(tool_message.tool_name.as_deref(), Some(SEARCH_BOOKS));
    let results = tool_message.content.as_deref().unwrap();
    assert_eq!(
        results.lines().collect::<Vec<_>>(),
        vec!["Dune by Frank Herbert", "Dune Messiah by Frank Herbert"]
    );
}

#[tokio::test]
async fn test_plain_reply_has_reasoning_stripped() {
    let model = Arc::new(ScriptedModel::replying(
        "<think>\nno tools needed\n</think>\n\nHello! What do you like to read?",
    ));
    let orchestrator = orchestrator(model.clone()).await;

    let outcome = orchestrator.chat("hi", Vec::new()).await.unwrap();

    assert_eq!(outcome.reply, "Hello! What do you like to read?");
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_message_never_reaches_model() {
    let model = Arc::new(ScriptedModel::replying("unused"));
    let orchestrator = orchestrator(model.clone()).await;

    let result = orchestrator.chat("  \n ", Vec::new()).await;

    assert!(matches!(result, Err(AppError::EmptyQuery)));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_bad_tool_arguments_become_apology() {
    let model = Arc::new(ScriptedModel::new(|_, _| {
        Ok(tool_calls(vec![ToolCall::new(
            SEARCH_BOOKS,
            json!({ "numberOfBooks": 3 }),
        )]))
    }));
    let orchestrator = orchestrator(model.clone()).await;

    let outcome = orchestrator.chat("find me something", Vec::new()).await.unwrap();

    assert_eq!(outcome.reply, TOOL_FAILURE_REPLY);
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_search_after_narrowing_becomes_apology() {
    // Ignores the narrowed tool list and keeps searching
    let model = Arc::new(ScriptedModel::new(|_, _| {
        Ok(tool_calls(vec![ToolCall::new(
            SEARCH_BOOKS,
            json!({ "query": "dune" }),
        )]))
    }));
    let orchestrator = orchestrator(model.clone()).await;

    let outcome = orchestrator.chat("dune please", Vec::new()).await.unwrap();

    assert_eq!(outcome.reply, TOOL_FAILURE_REPLY);
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_round_limit_enforced() {
    let model = Arc::new(search_then_reply("unused"));
    let orchestrator = orchestrator(model.clone()).await.with_max_tool_rounds(0);

    let result = orchestrator.chat("dune", Vec::new()).await;

    assert!(matches!(result, Err(AppError::ToolLoopExceeded(0))));
}

#[tokio::test]
async fn test_model_with_nothing_to_say_is_unavailable() {
    let model = Arc::new(ScriptedModel::replying("<think>hmm</think>"));
    let orchestrator = orchestrator(model).await;

    let result = orchestrator.chat("hello", Vec::new()).await;

    assert!(matches!(result, Err(AppError::ModelUnavailable(_))));
}

#[tokio::test]
async fn test_model_error_propagates() {
    let model = Arc::new(ScriptedModel::new(|_, _| {
        Err(AppError::ModelUnavailable("connection refused".to_string()))
    }));
    let orchestrator = orchestrator(model).await;

    let result = orchestrator.chat("hello", Vec::new()).await;

    assert!(matches!(result, Err(AppError::ModelUnavailable(_))));
}

#[tokio::test]
async fn test_system_prompt_prepended_once() {
    let model = Arc::new(ScriptedModel::replying("Sure."));
    let orchestrator = orchestrator(model.clone()).await;

    let first = orchestrator.chat("hi", Vec::new()).await.unwrap();
    assert_eq!(first.history[0], ChatMessage::system(PROMPT));

    let second = orchestrator.chat("and another", first.history).await.unwrap();
    let system_count = second
        .history
        .iter()
        .filter(|m| m.role == Role::System)
        .count();

    assert_eq!(system_count, 1);
    assert_eq!(second.history.len(), 5);
    assert_eq!(model.calls()[1].history.len(), 4);
}
