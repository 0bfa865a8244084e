//! HTTP front end: `POST /ask` and `GET /health`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    compose::Citation,
    engine::AnswerEngine,
    error::{Error, Result},
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub response: String,
    pub status: &'static str,
    pub citations: Vec<Citation>,
}

pub fn router(engine: Arc<AnswerEngine>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/health", get(health))
        .with_state(engine)
}

async fn ask(
    State(engine): State<Arc<AnswerEngine>>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    let answer =
        match tokio::task::spawn_blocking(move || engine.answer(&request.text))
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "answer task failed");
                crate::compose::Answer::apology()
            }
        };

    Json(AskResponse {
        status: answer.status.as_str(),
        response: answer.text,
        citations: answer.citations,
    })
}

async fn health(State(engine): State<Arc<AnswerEngine>>) -> impl IntoResponse {
    if engine.ready() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "healthy" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable" })),
        )
    }
}

/// Serve until the process is interrupted.
pub fn run_server(engine: AnswerEngine, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid address {addr:?}: {e}")))?;
    let app = router(Arc::new(engine));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Config(format!("failed to start tokio runtime: {e}")))?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, app).await?;
        Ok(())
    })
}
