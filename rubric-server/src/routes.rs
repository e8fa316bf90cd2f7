//! HTTP API routes.

use crate::documents::DocumentKind;
use crate::error::ServiceError;
use crate::extract::extract_text;
use crate::form::FormFields;
use crate::summarize::summarize;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rubric_common::config::Config;
use rubric_session::SessionStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(session: SessionStore, config: Config) -> Self {
        Self {
            session: Arc::new(session),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.limits.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Session
        .route("/reset", post(reset_session))
        .route("/upload-philosophy", post(upload_philosophy))
        .route("/chat", post(chat))
        // Documents
        .route("/generate-plan", post(generate_plan))
        .route("/generate-assessment", post(generate_assessment))
        .route("/generate-rubric", post(generate_rubric))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ============ Health Check ============

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "rubric-server",
        "version": env!("CARGO_PKG_VERSION"),
        "remote_store": state.session.backend(),
        "remote_failures": state.session.remote_failures(),
    }))
}

// ============ Session ============

async fn reset_session(State(state): State<AppState>) -> impl IntoResponse {
    state.session.reset().await;
    Json(serde_json::json!({ "status": "reset" }))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    uploaded: Vec<String>,
    summary: String,
}

/// Strip directory components from a client-supplied file name.
///
/// Returns `None` when nothing usable is left.
fn base_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

async fn upload_philosophy(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let upload_dir = state.config.storage.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir).await?;

    let mut notes = String::new();
    let mut word_limit = state.config.summary.word_limit;
    let mut uploaded = Vec::new();
    let mut texts = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("files") => {
                let raw_name = field.file_name().unwrap_or_default().to_string();
                let name = base_name(&raw_name).ok_or_else(|| {
                    ServiceError::InvalidRequest(format!("unusable file name: {raw_name:?}"))
                })?;
                let data = field.bytes().await?;

                let path = upload_dir.join(&name);
                tokio::fs::write(&path, &data).await?;
                tracing::debug!(file = %name, bytes = data.len(), "Stored upload");

                texts.push(extract_blocking(path).await?);
                uploaded.push(name);
            }
            Some("notes") => notes = field.text().await?,
            Some("word_limit") => {
                let raw = field.text().await?;
                word_limit = raw.trim().parse().map_err(|_| {
                    ServiceError::InvalidRequest(format!("word_limit must be a non-negative integer, got {raw:?}"))
                })?;
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    if uploaded.is_empty() {
        return Err(ServiceError::InvalidRequest("no files uploaded".to_string()));
    }

    let mut combined = notes;
    for text in &texts {
        combined.push('\n');
        combined.push_str(text);
    }

    let summary = summarize(&combined, word_limit);
    state.session.set_summary(summary.clone()).await;

    tracing::info!(
        files = uploaded.len(),
        summary_words = summary.split_whitespace().count(),
        "Background summary updated"
    );

    Ok(Json(UploadResponse { uploaded, summary }))
}

async fn extract_blocking(path: PathBuf) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || extract_text(&path))
        .await
        .map_err(|e| ServiceError::Internal(format!("extraction task failed: {e}")))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    message: String,
    response: String,
}

async fn chat(
    State(state): State<AppState>,
    FormFields(request): FormFields<ChatRequest>,
) -> Json<ChatResponse> {
    state.session.append_message(request.message.clone()).await;

    let summary = state.session.get_summary().await;
    let response = if summary.is_empty() {
        "Response placeholder".to_string()
    } else {
        let preview: String = summary
            .chars()
            .take(state.config.summary.chat_preview_chars)
            .collect();
        format!("Response placeholder using background: {preview}...")
    };

    Json(ChatResponse {
        message: request.message,
        response,
    })
}

// ============ Documents ============

const DEFAULT_FILETYPE: &str = "txt";

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    filetype: Option<String>,
}

impl GenerateRequest {
    /// Requested extension, defaulting to `txt`.
    fn filetype(&self) -> Result<&str, ServiceError> {
        let filetype = match self.filetype.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_FILETYPE,
            Some(ext) => ext,
        };

        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
        if !filetype.chars().all(allowed) || filetype.contains("..") {
            return Err(ServiceError::InvalidRequest(format!(
                "invalid filetype: {filetype:?}"
            )));
        }
        Ok(filetype)
    }
}

async fn generate_plan(
    State(state): State<AppState>,
    FormFields(request): FormFields<GenerateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    generate(&state, DocumentKind::LessonPlan, request).await
}

async fn generate_assessment(
    State(state): State<AppState>,
    FormFields(request): FormFields<GenerateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    generate(&state, DocumentKind::Assessment, request).await
}

async fn generate_rubric(
    State(state): State<AppState>,
    FormFields(request): FormFields<GenerateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    generate(&state, DocumentKind::Rubric, request).await
}

async fn generate(
    state: &AppState,
    kind: DocumentKind,
    request: GenerateRequest,
) -> Result<impl IntoResponse, ServiceError> {
    let file_name = kind.file_name(request.filetype()?);

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|_| ServiceError::InvalidRequest(format!("invalid filetype for {kind}")))?;

    let summary = state.session.get_summary().await;
    let conversation = match kind {
        DocumentKind::LessonPlan => state.session.read_messages().await,
        DocumentKind::Assessment | DocumentKind::Rubric => Vec::new(),
    };
    let body = kind.render(&summary, &conversation);

    let output_dir = &state.config.storage.output_dir;
    tokio::fs::create_dir_all(output_dir).await?;
    tokio::fs::write(output_dir.join(&file_name), body.as_bytes()).await?;

    tracing::info!(document = %kind, file = %file_name, "Generated document");

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
