//! PdfNote annotation backend
//!
//! A small REST service that stores annotations in memory.
//!
//! ## Endpoints
//!
//! ```text
//! GET    /api/annotations/       list every annotation
//! POST   /api/annotations/       create, responds with the stored record
//! PUT    /api/annotations/{id}/  replace, 404 when unknown
//! DELETE /api/annotations/{id}/  remove, 404 when unknown
//! GET    /health
//! ```

mod repo;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use repo::{AnnotationRecord, AnnotationRepo};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

/// Shared application state
struct AppState {
    repo: AnnotationRepo,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfnote_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState {
        repo: AnnotationRepo::new(),
    });

    let app = router(state);
    let addr = listen_addr();
    info!("PdfNote server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/annotations/", get(list_annotations).post(create_annotation))
        .route(
            "/api/annotations/{id}/",
            put(update_annotation).delete(delete_annotation),
        )
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `PDFNOTE_ADDR`, falling back to [`DEFAULT_ADDR`].
fn listen_addr() -> SocketAddr {
    let fallback = || DEFAULT_ADDR.parse().unwrap_or(SocketAddr::from(([0, 0, 0, 0], 3030)));
    match std::env::var("PDFNOTE_ADDR") {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring PDFNOTE_ADDR {:?}: {}", raw, e);
            fallback()
        }),
        Err(_) => fallback(),
    }
}

async fn list_annotations(State(state): State<Arc<AppState>>) -> Json<Vec<AnnotationRecord>> {
    Json(state.repo.list())
}

async fn create_annotation(
    State(state): State<Arc<AppState>>,
    Json(record): Json<AnnotationRecord>,
) -> impl IntoResponse {
    let created = state.repo.create(record);
    info!(
        "Created annotation {} on page {} for {}",
        created.id.as_deref().unwrap_or_default(),
        created.page,
        created.user
    );
    (StatusCode::CREATED, Json(created))
}

async fn update_annotation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(record): Json<AnnotationRecord>,
) -> Result<Json<AnnotationRecord>, StatusCode> {
    match state.repo.update(&id, record) {
        Some(updated) => Ok(Json(updated)),
        None => {
            warn!("Update for unknown annotation {}", id);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

async fn delete_annotation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.repo.delete(&id) {
        info!("Deleted annotation {} ({} left)", id, state.repo.len());
        StatusCode::NO_CONTENT
    } else {
        warn!("Delete for unknown annotation {}", id);
        StatusCode::NOT_FOUND
    }
}

async fn health() -> &'static str {
    "OK"
}
