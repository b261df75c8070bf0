//! One user turn: rank, call the model, run tools, repeat until a text answer.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::config::LlmConfig;
use crate::context::ConversationStore;
use crate::error::VoxError;
use crate::mcp::ToolRegistry;
use crate::provider::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::ranking::ToolRanker;
use crate::tools::{to_tool_definition, ToolArguments, ToolDefinition};
use crate::types::{Message, ToolCallRequest};

/// Model settings applied to every call in a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub model: String,
    pub temperature: f64,
    /// Upper bound on model calls per turn.
    pub max_iterations: usize,
}

impl From<&LlmConfig> for TurnSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_iterations: config.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub total_turns: u64,
    pub total_tool_calls: u64,
    pub total_errors: u64,
}

#[derive(Debug)]
enum TurnState {
    AwaitingUserInput,
    Ranking,
    ModelCall,
    Decide(CompletionResponse),
    ToolExecution(Vec<ToolCallRequest>),
    Done(String),
}

/// Drives turns against a conversation it owns.
pub struct TurnProcessor {
    completion: Arc<dyn CompletionClient>,
    settings: TurnSettings,
    store: ConversationStore,
    stats: AgentStats,
}

impl TurnProcessor {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        settings: TurnSettings,
        store: ConversationStore,
    ) -> Self {
        Self {
            completion,
            settings,
            store,
            stats: AgentStats::default(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    /// Run one turn and return the assistant's final text.
    ///
    /// Blank input returns an empty string without touching the conversation.
    /// A failed model call or too many iterations fails the turn; everything
    /// appended so far stays in the conversation.
    pub async fn process(
        &mut self,
        input: &str,
        registry: &ToolRegistry,
        ranker: &ToolRanker,
    ) -> Result<String, VoxError> {
        let turn_id = Uuid::new_v4();
        let mut state = TurnState::AwaitingUserInput;
        let mut tools: Vec<ToolDefinition> = Vec::new();
        let mut iteration = 0usize;

        loop {
            state = match state {
                TurnState::AwaitingUserInput => {
                    if input.trim().is_empty() {
                        tracing::debug!(%turn_id, "ignoring blank input");
                        return Ok(String::new());
                    }
                    self.stats.total_turns += 1;
                    tracing::info!(%turn_id, chars = input.chars().count(), "turn started");
                    self.store.append(Message::user(input)).await;
                    TurnState::Ranking
                }
                TurnState::Ranking => {
                    let ranked = ranker.rank(input).await;
                    let selected = if ranked.is_empty() {
                        registry.all_tools().to_vec()
                    } else {
                        ranked
                    };
                    tools = selected.iter().map(to_tool_definition).collect();
                    tracing::debug!(
                        %turn_id,
                        tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                        "tools selected"
                    );
                    TurnState::ModelCall
                }
                TurnState::ModelCall => {
                    if iteration >= self.settings.max_iterations {
                        self.stats.total_errors += 1;
                        tracing::warn!(%turn_id, limit = self.settings.max_iterations, "turn hit iteration cap");
                        return Err(VoxError::MaxIterationsExceeded {
                            limit: self.settings.max_iterations,
                        });
                    }
                    iteration += 1;

                    let request = CompletionRequest::builder()
                        .model(self.settings.model.clone())
                        .messages(self.store.snapshot())
                        .tools(tools.clone())
                        .temperature(self.settings.temperature)
                        .build();
                    let response = match self.completion.complete(&request).await {
                        Ok(response) => response,
                        Err(error) => {
                            self.stats.total_errors += 1;
                            tracing::warn!(%turn_id, iteration, %error, "completion call failed");
                            return Err(match error {
                                VoxError::CompletionCall(message) => VoxError::CompletionCall(message),
                                other => VoxError::CompletionCall(other.to_string()),
                            });
                        }
                    };
                    tracing::debug!(
                        %turn_id,
                        iteration,
                        tool_calls = response.tool_calls.len(),
                        "model responded"
                    );
                    self.store.append(response.clone().into_message()).await;
                    TurnState::Decide(response)
                }
                TurnState::Decide(response) => {
                    if response.has_tool_calls() {
                        TurnState::ToolExecution(response.tool_calls)
                    } else {
                        TurnState::Done(response.content.unwrap_or_default())
                    }
                }
                TurnState::ToolExecution(calls) => {
                    self.stats.total_tool_calls += calls.len() as u64;
                    let replies =
                        join_all(calls.iter().map(|call| execute_tool_call(registry, call))).await;

                    for (call, reply) in calls.iter().zip(replies) {
                        let content = match reply {
                            Ok(content) => content,
                            Err(error) => {
                                self.stats.total_errors += 1;
                                tracing::warn!(%turn_id, tool = %call.name, %error, "tool call failed");
                                tool_error_reply(&error)
                            }
                        };
                        self.store.append(Message::tool(&call.id, content)).await;
                    }
                    TurnState::ModelCall
                }
                TurnState::Done(text) => {
                    tracing::info!(%turn_id, iterations = iteration, "turn complete");
                    return Ok(text);
                }
            };
        }
    }
}

async fn execute_tool_call(registry: &ToolRegistry, call: &ToolCallRequest) -> Result<String, VoxError> {
    let arguments = ToolArguments::parse(&call.name, &call.arguments)?;
    let output = registry.invoke(&call.name, arguments.into_value()).await?;
    Ok(output.render())
}

/// Text fed back to the model in place of a tool result.
pub fn tool_error_reply(error: &VoxError) -> String {
    match error {
        VoxError::ToolArgumentParse { message, .. } => format!("argument parse error: {message}"),
        VoxError::ToolExecution { message, .. } => format!("tool execution error: {message}"),
        other => format!("tool execution error: {other}"),
    }
}
