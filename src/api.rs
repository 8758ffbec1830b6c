//! REST surface over [`TemplateService`].

use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::filler::FillValues;
use crate::service::{QuestionSpec, TemplateService};

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<TemplateService>,
}

impl ApiState {
    pub fn new(service: TemplateService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Every failure becomes a 500 with the full error chain in `detail`.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!("{:#}", self.0);
        error!(%detail, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": detail })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct TemplateList {
    #[serde(rename = "unique_HrDocuments")]
    pub unique_hr_documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub template: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionsRequest {
    #[serde(default)]
    pub placeholders: Option<Vec<String>>,
    #[serde(default)]
    pub user_query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FillResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(rename = "Request_id")]
    pub request_id: String,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/forms", get(list_forms))
        .route("/forms/search", get(search_forms))
        .route("/forms/match", get(match_form))
        .route("/forms/{template_name}/questions", post(build_questions))
        .route("/forms/{template_name}/fill", post(fill_form))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn start_server(addr: &str, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub fn new_request_id() -> String {
    format!("HR{}", rand::thread_rng().gen_range(1000..=9999))
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn list_forms(State(state): State<ApiState>) -> ApiResult<TemplateList> {
    let names = state.service.list_display_names().await?;
    Ok(Json(TemplateList {
        unique_hr_documents: names,
    }))
}

pub async fn search_forms(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<TemplateList> {
    let names = state.service.search_templates(params.query.as_deref()).await?;
    Ok(Json(TemplateList {
        unique_hr_documents: names,
    }))
}

pub async fn match_form(
    State(state): State<ApiState>,
    Query(params): Query<MatchParams>,
) -> ApiResult<MatchResponse> {
    let template = state.service.match_template(&params.query).await?;
    Ok(Json(MatchResponse { template }))
}

/// The body is optional; an empty one means "use the placeholders found in the template".
pub async fn build_questions(
    State(state): State<ApiState>,
    Path(template_name): Path<String>,
    body: Bytes,
) -> ApiResult<Vec<QuestionSpec>> {
    let request: QuestionsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        QuestionsRequest::default()
    } else {
        serde_json::from_slice(&body).context("decode questions request")?
    };
    if let Some(q) = request.user_query.as_deref() {
        debug!(template = %template_name, user_query = q, "questions requested");
    }
    let questions = state
        .service
        .build_questions(&template_name, request.placeholders)
        .await?;
    Ok(Json(questions))
}

/// The body is decoded here rather than by the `Json` extractor so that a malformed body
/// fails with the same `{detail}` response as everything else.
pub async fn fill_form(
    State(state): State<ApiState>,
    Path(template_name): Path<String>,
    body: Bytes,
) -> ApiResult<FillResponse> {
    let values: FillValues = serde_json::from_slice(&body).context("decode fill request")?;
    let path = state.service.fill_template(&template_name, &values).await?;
    let request_id = new_request_id();
    info!(%request_id, output = %path.display(), "fill request completed");
    Ok(Json(FillResponse {
        status: "success",
        message: "Request submitted successfully",
        request_id,
    }))
}
