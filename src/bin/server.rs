//! chronicled: HTTP surface over a corpus (spec §6).
//!
//! Two `Storage` handles: a read-only one serves every query/export
//! endpoint, a read-write one backs the Job Coordinator. Neither blocks the
//! other (spec §9, "Dual role of the database").

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures::stream::Stream;
use futures::StreamExt as _;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chronicle::config::{init_tracing, ServerArgs};
use chronicle::error::ChronicleError;
use chronicle::export;
use chronicle::jobs::{Coordinator, SubmitRequest};
use chronicle::search::Searcher;
use chronicle::store::queries::{
    get_conversation, get_messages, get_stats, list_conversations, list_projects,
};
use chronicle::store::Storage;
use chronicle::types::{ConversationListOptions, JobType, Project};

#[derive(Clone)]
struct AppState {
    read: Storage,
    coordinator: Arc<Coordinator>,
}

struct ApiError(ChronicleError);

impl From<ChronicleError> for ApiError {
    fn from(e: ChronicleError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> chronicle::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(&args.log_format);

    let read = Storage::open_read_only(args.store.db_path())?;
    let write = Storage::open_read_write(args.store.db_path())?;
    let coordinator = Coordinator::new(
        write,
        args.store.cache_dir(),
        args.worker_bin.as_str(),
        args.pattern_bin.as_str(),
    );
    coordinator.reap_abandoned(Duration::from_secs(15 * 60))?;

    let state = AppState {
        read,
        coordinator: Arc::new(coordinator),
    };

    let app = Router::new()
        .route("/api/conversations", get(list_conversations_handler))
        .route("/api/conversations/:id", get(get_conversation_handler))
        .route("/api/conversations/:id/messages", get(get_messages_handler))
        .route("/api/search", get(search_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/projects", get(projects_handler))
        .route("/api/export/markdown", get(export_markdown_handler))
        .route("/api/export/jsonl", post(export_jsonl_handler))
        .route("/api/export/pairs", post(export_pairs_handler))
        .route("/api/export/obsidian", post(export_obsidian_handler))
        .route("/api/jobs", post(submit_job_handler))
        .route("/api/jobs/check", get(check_job_handler))
        .route("/api/jobs/:id", get(get_job_handler).delete(delete_job_handler))
        .route("/api/jobs/:id/stream", get(stream_job_handler))
        .route("/api/jobs/:id/download", get(download_job_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.http_addr.as_str()).await?;
    tracing::info!(addr = %args.http_addr, "chronicled listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ConversationsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    search: Option<String>,
    gizmo_id: Option<String>,
}

async fn list_conversations_handler(
    State(state): State<AppState>,
    Query(q): Query<ConversationsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let options = ConversationListOptions {
        limit: q.limit.unwrap_or(50),
        offset: q.offset.unwrap_or(0),
        title_contains: q.search,
        gizmo_id: q.gizmo_id,
    };
    let conversations = state
        .read
        .with_connection(|conn| list_conversations(conn, &options))?;
    Ok(Json(serde_json::json!(conversations)))
}

#[derive(Debug, Serialize)]
struct ConversationDetail {
    #[serde(flatten)]
    conversation: chronicle::types::Conversation,
    project: Option<Project>,
}

async fn get_conversation_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ConversationDetail>> {
    let (conversation, projects) = state.read.with_connection(|conn| {
        let conversation = get_conversation(conn, &id)?;
        let projects = list_projects(conn)?;
        Ok((conversation, projects))
    })?;
    let project = conversation
        .gizmo_id
        .as_ref()
        .and_then(|gid| projects.into_iter().find(|p| &p.gizmo_id == gid));
    Ok(Json(ConversationDetail { conversation, project }))
}

async fn get_messages_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let messages = state.read.with_connection(|conn| get_messages(conn, &id))?;
    Ok(Json(serde_json::json!(messages)))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<i64>,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let hits = Searcher::search(&state.read, &q.q, q.limit.unwrap_or(20))?;
    Ok(Json(serde_json::json!(hits)))
}

async fn stats_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.read.with_connection(get_stats)?;
    Ok(Json(serde_json::json!(stats)))
}

async fn projects_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let projects = state.read.with_connection(list_projects)?;
    Ok(Json(serde_json::json!(projects)))
}

#[derive(Debug, Deserialize)]
struct ExportMarkdownQuery {
    id: String,
    #[serde(default)]
    redact: bool,
}

async fn export_markdown_handler(
    State(state): State<AppState>,
    Query(q): Query<ExportMarkdownQuery>,
) -> ApiResult<String> {
    Ok(export::markdown(&state.read, &q.id, q.redact)?)
}

#[derive(Debug, Deserialize)]
struct RedactBody {
    #[serde(default)]
    redact: bool,
}

async fn export_jsonl_handler(
    State(state): State<AppState>,
    Json(body): Json<RedactBody>,
) -> ApiResult<String> {
    Ok(export::jsonl::export(&state.read, body.redact)?)
}

#[derive(Debug, Deserialize)]
struct ExportPairsBody {
    conversation_id: String,
    #[serde(default)]
    redact: bool,
}

async fn export_pairs_handler(
    State(state): State<AppState>,
    Json(body): Json<ExportPairsBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let pairs = export::training_pairs(&state.read, &body.conversation_id, body.redact)?;
    Ok(Json(serde_json::json!(pairs)))
}

#[derive(Debug, Deserialize)]
struct ExportObsidianBody {
    out_dir: PathBuf,
    #[serde(default)]
    redact: bool,
}

async fn export_obsidian_handler(
    State(state): State<AppState>,
    Json(body): Json<ExportObsidianBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let paths = export::vault::export(&state.read, &body.out_dir, body.redact)?;
    Ok(Json(serde_json::json!({ "written": paths })))
}

#[derive(Debug, Deserialize)]
struct SubmitJobBody {
    job_type: String,
    target_id: String,
    target_name: String,
    pattern: String,
}

async fn submit_job_handler(
    State(state): State<AppState>,
    Json(body): Json<SubmitJobBody>,
) -> ApiResult<Json<chronicle::types::Job>> {
    let job_type: JobType = body.job_type.parse()?;
    let job = state.coordinator.submit(SubmitRequest {
        job_type,
        target_id: body.target_id,
        target_name: body.target_name,
        pattern: body.pattern,
    })?;
    Ok(Json(job))
}

async fn get_job_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<chronicle::types::Job>> {
    Ok(Json(state.coordinator.get(&id)?))
}

async fn delete_job_handler(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> ApiResult<StatusCode> {
    state.coordinator.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CheckJobQuery {
    target_id: String,
    pattern: String,
}

async fn check_job_handler(
    State(state): State<AppState>,
    Query(q): Query<CheckJobQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let job = state.coordinator.check(&q.target_id, &q.pattern)?;
    Ok(Json(serde_json::json!(job)))
}

async fn stream_job_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let stream = state.coordinator.stream(id).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        let name = match &event {
            chronicle::jobs::JobEvent::Progress { .. } => "progress",
            chronicle::jobs::JobEvent::Done { .. } => "done",
            chronicle::jobs::JobEvent::Failed { .. } => "failed",
        };
        Ok(Event::default().event(name).data(data))
    });
    Sse::new(stream)
}

async fn download_job_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Response> {
    let job = state.coordinator.get(&id)?;
    let path = job
        .result_path
        .ok_or_else(|| ChronicleError::NotFound(format!("job {id} has no result artifact")))?;
    let contents = std::fs::read(&path).map_err(ChronicleError::from)?;
    Ok((StatusCode::OK, contents).into_response())
}
