use crate::application::agent::AgentStep;
use crate::application::chat::{ChatRequest, ChatService};
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::store::IssueStore;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub(crate) struct ServerState<P: ModelProvider> {
    service: Arc<ChatService<P>>,
    store: Arc<IssueStore>,
}

impl<P: ModelProvider> ServerState<P> {
    pub(crate) fn new(service: Arc<ChatService<P>>, store: Arc<IssueStore>) -> Self {
        Self { service, store }
    }

    pub(crate) fn service(&self) -> Arc<ChatService<P>> {
        Arc::clone(&self.service)
    }

    pub(crate) fn store(&self) -> Arc<IssueStore> {
        Arc::clone(&self.store)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(chat_handler, projects_handler),
    components(
        schemas(
            RestChatRequest,
            RestChatResponse,
            ErrorResponse,
            ProjectsResponse,
            ProjectDto,
            IssueDto,
            AgentStep
        )
    ),
    tags(
        (name = "chat", description = "Conversational access to the issue tracker"),
        (name = "projects", description = "Read-only view of the tracked projects")
    )
)]
struct ApiDoc;

pub async fn serve<P>(
    service: Arc<ChatService<P>>,
    store: Arc<IssueStore>,
    addr: SocketAddr,
) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(ServerState::new(service, store));
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/chat", post(chat_handler::<P>))
        .route("/projects", get(projects_handler::<P>))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

#[derive(Debug, Deserialize, ToSchema)]
struct RestChatRequest {
    prompt: String,
    session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct RestChatResponse {
    session_id: String,
    content: String,
    tool_steps: Vec<AgentStep>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = RestChatRequest,
    responses(
        (status = 200, description = "Chat turn processed", body = RestChatResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Model provider could not be reached", body = ErrorResponse)
    )
)]
async fn chat_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<RestChatRequest>,
) -> Result<Json<RestChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        session = payload.session_id.as_deref(),
        "Received /chat request"
    );

    if payload.prompt.trim().is_empty() {
        error!("Rejecting /chat request due to empty prompt");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt cannot be empty".to_string(),
            }),
        ));
    }

    let service = state.service();
    match service
        .chat(ChatRequest {
            prompt: payload.prompt,
            session_id: payload.session_id,
        })
        .await
    {
        Ok(result) => {
            info!(
                session_id = result.session_id.as_str(),
                "Chat request completed successfully"
            );
            Ok(Json(RestChatResponse {
                session_id: result.session_id,
                content: result.content,
                tool_steps: result.steps,
            }))
        }
        Err(error) => {
            error!(%error, "Chat request failed");
            let message = error.user_message();
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse { error: message }),
            ))
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct IssueDto {
    key: String,
    summary: String,
    status: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProjectDto {
    key: String,
    issues: Vec<IssueDto>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProjectsResponse {
    projects: Vec<ProjectDto>,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "projects",
    responses(
        (status = 200, description = "Tracked projects and their issues", body = ProjectsResponse)
    )
)]
async fn projects_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<ProjectsResponse> {
    let store = state.store();
    debug!(
        project_count = store.projects().len(),
        "Serving /projects request"
    );
    let projects = store
        .projects()
        .iter()
        .map(|project| ProjectDto {
            key: project.key.clone(),
            issues: project
                .issues
                .iter()
                .map(|issue| IssueDto {
                    key: issue.key.clone(),
                    summary: issue.summary.clone(),
                    status: issue.status.clone(),
                })
                .collect(),
        })
        .collect();
    Json(ProjectsResponse { projects })
}
