use crate::application::agent::{Agent, AgentError, AgentStep};
use crate::domain::types::Conversation;
use crate::infrastructure::model::ModelProvider;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct ChatRequest {
    pub prompt: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResult {
    pub content: String,
    pub session_id: String,
    pub steps: Vec<AgentStep>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Agent(err) => err.user_message(),
        }
    }
}

/// Front-end entry point. Owns one conversation per session id and runs the
/// agent over it for each incoming message. The registry lock is held only
/// to fetch a session handle; each conversation has its own lock, so a slow
/// turn in one session never stalls the others. Two requests for the same
/// session serialize on that session's lock.
pub struct ChatService<P: ModelProvider> {
    agent: Agent<P>,
    sessions: Mutex<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl<P: ModelProvider> ChatService<P> {
    pub fn new(agent: Agent<P>) -> Self {
        Self {
            agent,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResult, ChatError> {
        let session_id = request.session_id.unwrap_or_else(new_session_id);
        let handle = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .entry(session_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Conversation::new())))
                .clone()
        };

        let mut conversation = handle.lock().await;
        debug!(
            session_id = session_id.as_str(),
            fresh_session = conversation.is_empty(),
            history_turns = conversation.len(),
            "Running agent turn"
        );

        let outcome = self.agent.run(&mut conversation, request.prompt).await?;
        info!(
            session_id = session_id.as_str(),
            total_turns = conversation.len(),
            tool_steps = outcome.steps.len(),
            "Chat turn completed"
        );

        Ok(ChatResult {
            content: outcome.response,
            session_id,
            steps: outcome.steps,
        })
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
