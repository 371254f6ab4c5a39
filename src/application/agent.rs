use crate::application::search::SearchTool;
use crate::domain::types::{Conversation, ToolCall, ToolResult, Turn};
use crate::infrastructure::model::{ModelError, ModelProvider, ToolSpec};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

pub const DEFAULT_MAX_STEPS: usize = 8;

/// One executed tool call, kept for the caller's trace of the run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AgentStep {
    pub tool: String,
    pub arguments: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: String,
    pub steps: Vec<AgentStep>,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("agent exceeded the maximum of {0} tool interactions")]
    ToolBudgetExhausted(usize),
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(err) => err.user_message(),
            AgentError::ToolBudgetExhausted(_) => {
                "The assistant hit its tool interaction limit before finishing. Try a simpler request."
                    .to_string()
            }
        }
    }
}

/// What the newest turn demands next. The conversation log is the whole
/// state; nothing older than the last turn is consulted.
#[derive(Debug)]
enum Route {
    InvokeModel,
    ExecuteTools(Vec<ToolCall>),
    Finished(String),
}

fn route(conversation: &Conversation) -> Route {
    let Some(turn) = conversation.last_turn() else {
        return Route::InvokeModel;
    };
    if let Some(calls) = turn.pending_tool_calls() {
        return Route::ExecuteTools(calls.to_vec());
    }
    match turn {
        Turn::Assistant(message) => Route::Finished(message.text.clone()),
        _ => Route::InvokeModel,
    }
}

/// Drives one user message to completion: ask the model, execute whatever
/// tool calls it requests, feed the results back, repeat until it answers
/// in plain text.
pub struct Agent<P: ModelProvider> {
    provider: Arc<P>,
    tool: SearchTool,
    specs: Vec<ToolSpec>,
    max_steps: usize,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(provider: Arc<P>, tool: SearchTool) -> Self {
        let specs = vec![tool.spec()];
        Self {
            provider,
            tool,
            specs,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Appends the user turn and loops until the model stops requesting
    /// tools. A provider failure aborts the cycle; the conversation keeps
    /// every turn appended up to that point and stays usable.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        prompt: String,
    ) -> Result<AgentOutcome, AgentError> {
        info!("Agent run started");
        conversation.push(Turn::User(prompt));

        let mut steps = Vec::new();
        let mut remaining_steps = self.max_steps;

        loop {
            match route(conversation) {
                Route::Finished(response) => {
                    info!(steps = steps.len(), "Agent returned final response");
                    return Ok(AgentOutcome { response, steps });
                }
                Route::ExecuteTools(calls) => {
                    if remaining_steps == 0 {
                        warn!("Agent exceeded max tool interactions");
                        return Err(AgentError::ToolBudgetExhausted(self.max_steps));
                    }
                    remaining_steps -= 1;

                    // Results go back in request order, one turn per call.
                    for call in calls {
                        info!(tool = %call.name, "Agent requested tool execution");
                        let output = self.execute(&call);
                        steps.push(AgentStep {
                            tool: call.name,
                            arguments: call.arguments,
                            output: output.clone(),
                        });
                        conversation.push(Turn::Tool(ToolResult::new(call.id, output)));
                    }
                }
                Route::InvokeModel => {
                    debug!(
                        turns = conversation.len(),
                        remaining_steps, "Submitting conversation to model provider"
                    );
                    let message = self
                        .provider
                        .complete(conversation.turns(), &self.specs)
                        .await?;
                    conversation.push(Turn::Assistant(message));
                }
            }
        }
    }

    fn execute(&self, call: &ToolCall) -> String {
        if call.name == self.tool.name() {
            self.tool.invoke(&call.arguments)
        } else {
            warn!(requested_tool = %call.name, "Unknown tool requested by agent");
            format!(
                "{} is not a valid tool, try one of [{}].",
                call.name,
                self.tool.name()
            )
        }
    }
}
