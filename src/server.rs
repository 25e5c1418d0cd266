//! HTTP surface of the relay.
//!
//! One generate endpoint (mounted at `/` and `/api/generate-image`) plus a
//! health probe. Every outcome, including panics, is rendered as the same
//! `{ "base64Data" }` / `{ "error", "details"? }` JSON contract.

use crate::ai::{GeminiImageClient, ImageEditService};
use crate::models::{Config, OutboundResult};
use crate::{request, Error, Result};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the upstream credential is missing.
    service: Option<Arc<dyn ImageEditService>>,
}

impl AppState {
    pub fn new(service: Arc<dyn ImageEditService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    /// State for a process started without credentials; every generate
    /// request is answered with a misconfiguration error.
    pub fn unconfigured() -> Self {
        Self { service: None }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; generate requests will fail until it is configured");
            return Ok(Self::unconfigured());
        }

        // Reuse one HTTP connection pool across requests.
        let http_client = reqwest::Client::builder().build()?;
        let client = GeminiImageClient::from_config(config, http_client)?;

        info!(
            base_url = %config.gemini_base_url,
            max_attempts = config.max_attempts,
            "Gemini image client ready"
        );
        Ok(Self::new(Arc::new(client)))
    }
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", any(generate_image))
        .route("/api/generate-image", any(generate_image))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// The body is taken as a `Result` so an over-limit body is reported after the
// credential and method checks, in the same JSON shape as every other error.
async fn generate_image(
    State(state): State<AppState>,
    method: Method,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("generate_image", %request_id, %method);

    async move {
        match handle_generate(&state, &method, body).await {
            Ok(base64_data) => {
                info!("Image generated ({} base64 chars)", base64_data.len());
                (
                    StatusCode::OK,
                    Json(OutboundResult::success(base64_data)),
                )
                    .into_response()
            }
            Err(err) => error_response(&err),
        }
    }
    .instrument(span)
    .await
}

async fn handle_generate(
    state: &AppState,
    method: &Method,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<String> {
    let service = state
        .service
        .as_ref()
        .ok_or_else(|| Error::ServerMisconfigured("GEMINI_API_KEY is not set".to_string()))?;

    let request = request::parse_inbound(method, body)?;

    info!(
        model = %request.model,
        mime_type = %request.image.mime_type,
        prompt_chars = request.prompt_text.len(),
        "Forwarding image edit request"
    );

    service.edit_image(&request).await
}

fn error_response(err: &Error) -> Response {
    let status = err.status_code();

    if status.is_server_error() {
        error!(status = status.as_u16(), "Request failed: {}", err);
    } else {
        warn!(status = status.as_u16(), "Request rejected: {}", err);
    }

    (status, Json(OutboundResult::from(err))).into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    error_response(&Error::Internal(detail))
}
