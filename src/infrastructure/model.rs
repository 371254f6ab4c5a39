use crate::domain::types::{AssistantMessage, ToolCall, ToolResult, Turn};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Description of one callable tool, advertised to the model on every
/// request. `parameters` is a JSON Schema object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned invalid response: {0}")]
    InvalidResponse(String),
}

/// One reasoning step: the full conversation so far plus the available tools
/// go in, the next assistant message comes out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, ModelError>;
}

/// Client for OpenAI-compatible chat-completions endpoints. The configured
/// system prompt exists only on the wire; it is injected ahead of the
/// conversation on every request and never stored in it.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, api_key, model, Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_key_from_env() -> Result<String, ModelError> {
        std::env::var(OPENAI_API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{trimmed}/{path}")
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, ModelError> {
        let url = self.endpoint("/v1/chat/completions");
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_wire_messages(self.system_prompt.as_deref(), turns),
            tools: tools.iter().map(WireTool::from).collect(),
        };
        info!(
            model = self.model.as_str(),
            url = %url,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "Sending request to model provider"
        );
        let response: ChatCompletionResponse = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Received response from model provider");

        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| ModelError::InvalidResponse("missing assistant message".into()))?;

        parse_assistant_message(message)
    }
}

impl ModelError {
    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey => {
                "No API key is configured. Set OPENAI_API_KEY and try again.".to_string()
            }
            ModelError::Network(err) => {
                if err.is_connect() {
                    "Could not reach the model service. Check that the endpoint is up and reachable."
                        .to_string()
                } else if err.is_timeout() {
                    "The model service took too long to answer. Try again in a moment.".to_string()
                } else if let Some(status) = err.status() {
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            "The model service rejected the API key. Check OPENAI_API_KEY."
                                .to_string()
                        }
                        StatusCode::NOT_FOUND => {
                            "The model endpoint was not found (404). Check that the service exposes /v1/chat/completions."
                                .to_string()
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            "The model service is currently unavailable. Try again later."
                                .to_string()
                        }
                        _ => format!(
                            "The model request failed with status {}. Try again later.",
                            status.as_u16()
                        ),
                    }
                } else {
                    "A network error occurred while contacting the model service. Try again later."
                        .to_string()
                }
            }
            ModelError::InvalidResponse(_) => {
                "The model service returned a response that could not be processed. Try again."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<WireMessage>,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function".to_string(),
            function: WireFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function".to_string(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl From<&Turn> for WireMessage {
    fn from(turn: &Turn) -> Self {
        match turn {
            Turn::User(text) => WireMessage {
                role: "user".to_string(),
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            Turn::Assistant(message) => WireMessage {
                role: "assistant".to_string(),
                content: (!message.text.is_empty()).then(|| message.text.clone()),
                tool_calls: message
                    .requests_tools()
                    .then(|| message.tool_calls.iter().map(WireToolCall::from).collect()),
                tool_call_id: None,
            },
            Turn::Tool(ToolResult { call_id, content }) => WireMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

fn build_wire_messages(system_prompt: Option<&str>, turns: &[Turn]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(WireMessage {
            role: "system".to_string(),
            content: Some(prompt.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(turns.iter().map(WireMessage::from));
    messages
}

fn parse_assistant_message(message: WireMessage) -> Result<AssistantMessage, ModelError> {
    if message.role != "assistant" {
        return Err(ModelError::InvalidResponse(format!(
            "unexpected role '{}' in response",
            message.role
        )));
    }
    let text = message.content.unwrap_or_default();
    let Some(calls) = message.tool_calls else {
        return Ok(AssistantMessage::text(text));
    };
    let tool_calls = calls
        .into_iter()
        .map(|call| {
            if call.kind != "function" {
                return Err(ModelError::InvalidResponse(format!(
                    "unsupported tool call type '{}'",
                    call.kind
                )));
            }
            Ok(ToolCall::new(call.id, call.function.name, call.function.arguments))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AssistantMessage::with_tool_calls(text, tool_calls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_paths_correctly() {
        let client = OpenAiClient::new("https://api.openai.com/", "sk-test", "gpt-4o");
        assert_eq!(
            client.endpoint("/v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn wire_messages_inject_system_prompt_first() {
        let turns = vec![
            Turn::User("list PROJ issues".into()),
            Turn::Assistant(AssistantMessage::with_tool_calls(
                "",
                vec![ToolCall::new("call-1", "search_issues", r#"{"query":"project = PROJ"}"#)],
            )),
            Turn::Tool(ToolResult::new("call-1", "- PROJ-1: ...")),
        ];

        let messages = build_wire_messages(Some("You are a helpful assistant."), &turns);
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);

        let assistant = &messages[2];
        assert_eq!(assistant.content, None);
        let calls = assistant.tool_calls.as_ref().expect("calls serialized");
        assert_eq!(calls[0].function.name, "search_issues");

        let tool = &messages[3];
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn request_serializes_function_tools() {
        let request = ChatCompletionRequest {
            model: "gpt-4o".into(),
            messages: build_wire_messages(None, &[Turn::User("hi".into())]),
            tools: vec![WireTool::from(&ToolSpec {
                name: "search_issues".into(),
                description: "Search the tracker".into(),
                parameters: serde_json::json!({"type": "object"}),
            })],
        };

        let value = serde_json::to_value(&request).expect("request serializes");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "search_issues");
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["messages"][0].get("tool_call_id").is_none());
    }

    #[test]
    fn parses_tool_call_response() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": {
                            "name": "search_issues",
                            "arguments": "{\"query\":\"project = WEB\"}"
                        }
                    }]
                }
            }]
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(body).expect("parses");
        let message = response.choices.into_iter().next().unwrap().message.unwrap();
        let assistant = parse_assistant_message(message).expect("valid assistant message");

        assert_eq!(assistant.text, "");
        assert_eq!(assistant.tool_calls.len(), 1);
        assert_eq!(assistant.tool_calls[0].id, "call-1");
        assert_eq!(
            assistant.tool_calls[0].arguments,
            r#"{"query":"project = WEB"}"#
        );
    }

    #[test]
    fn rejects_non_assistant_response_role() {
        let message = WireMessage {
            role: "user".into(),
            content: Some("echo".into()),
            tool_calls: None,
            tool_call_id: None,
        };
        assert!(matches!(
            parse_assistant_message(message),
            Err(ModelError::InvalidResponse(_))
        ));
    }
}
