//! HTTP server for the Waterlily client.
//!
//! Exposes the artist catalog, the status store and job submission to a
//! browser or any other HTTP client. Signing still happens in the wallet
//! behind `WATERLILY_WALLET_URL`.
//!
//! # API Endpoints
//!
//! | Method | Path                    | Description                           |
//! |--------|-------------------------|---------------------------------------|
//! | GET    | `/health`               | Health check                          |
//! | GET    | `/api/artists`          | Artist catalog                        |
//! | GET    | `/api/status`           | Status, snackbar, wallet, submit state|
//! | GET    | `/api/status/stream`    | SSE stream of status changes          |
//! | POST   | `/api/wallet/connect`   | Connect the wallet                    |
//! | POST   | `/api/jobs`             | Submit a job (runs in the background) |
//! | GET    | `/api/images`           | Images of the connected account       |
//! | GET    | `/api/images/{job_id}`  | Generated image URLs of one job       |

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::types::{ImagesResponse, JobAccepted, JobRequest, StatusResponse};
use crate::config::IMAGE_WATCH_TIMEOUT;
use crate::error::{ServerError, ServerResult};
use crate::models::{Artist, ArtistCatalog, ImageRecord};
use crate::orchestrator::JobOrchestrator;
use crate::view::SubmitControl;
use crate::wallet::{WalletProvider, WalletState};

/// Shared handler state.
pub struct AppState<P> {
    pub orchestrator: Arc<JobOrchestrator<P>>,
    pub catalog: Arc<ArtistCatalog>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<P: WalletProvider> AppState<P> {
    pub fn new(orchestrator: JobOrchestrator<P>, catalog: ArtistCatalog) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            catalog: Arc::new(catalog),
        }
    }
}

/// Build the API router.
pub fn router<P: WalletProvider>(state: AppState<P>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/artists", get(list_artists::<P>))
        .route("/api/status", get(status::<P>))
        .route("/api/status/stream", get(sse_status::<P>))
        .route("/api/wallet/connect", post(connect_wallet::<P>))
        .route("/api/jobs", post(submit_job::<P>))
        .route("/api/images", get(customer_images::<P>))
        .route("/api/images/{job_id}", get(job_images::<P>))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server<P: WalletProvider>(port: u16, state: AppState<P>) -> ServerResult<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Waterlily server running on http://localhost:{}", port);
    println!("   GET  /api/artists         - Artist catalog");
    println!("   GET  /api/status          - Current status");
    println!("   GET  /api/status/stream   - SSE status stream");
    println!("   POST /api/wallet/connect  - Connect wallet");
    println!("   POST /api/jobs            - Submit a job");
    println!("   GET  /api/images/{{id}}     - Images of a job");
    println!("   GET  /health              - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "waterlily",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_artists<P: WalletProvider>(State(state): State<AppState<P>>) -> Json<Vec<Artist>> {
    Json(state.catalog.all().to_vec())
}

async fn status<P: WalletProvider>(State(state): State<AppState<P>>) -> Json<StatusResponse> {
    let orch = &state.orchestrator;
    let status = orch.status().snapshot();
    let wallet = orch.wallet().state();
    Json(StatusResponse {
        submit: SubmitControl::from_state(&status, &wallet),
        snackbar: orch.status().snackbar(),
        phase: orch.phase(),
        submission: orch.current_submission(),
        status,
        wallet,
    })
}

/// SSE endpoint for status and snackbar changes
async fn sse_status<P: WalletProvider>(
    State(state): State<AppState<P>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.status().subscribe();

    // Lagged receivers skip ahead
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let event = result.ok()?;
        let json = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn connect_wallet<P: WalletProvider>(
    State(state): State<AppState<P>>,
) -> ServerResult<Json<WalletState>> {
    let orch = &state.orchestrator;
    let wallet = orch.wallet().connect().await?;

    if let Err(e) = orch.load_customer_images().await {
        log::warn!("Could not load customer images: {}", e);
    }
    Ok(Json(wallet))
}

/// Validates and reserves the job slot before answering, so of two
/// concurrent submissions exactly one is accepted.
async fn submit_job<P: WalletProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<JobRequest>,
) -> ServerResult<(StatusCode, Json<JobAccepted>)> {
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(ServerError::BadRequest("Prompt is empty".into()));
    }
    let artist = state
        .catalog
        .find(&request.artist_id)
        .cloned()
        .ok_or_else(|| ServerError::BadRequest(format!("Unknown artist: {}", request.artist_id)))?;

    let orch = state.orchestrator.clone();
    let ticket = orch.reserve()?;

    orch.images().set_prompt(prompt.clone());
    orch.images().set_artist(artist);

    let accepted = JobAccepted {
        status: "submitted",
        artist_id: request.artist_id.clone(),
        prompt: prompt.clone(),
    };

    tokio::spawn(async move {
        match orch.run_reserved(ticket, &prompt, &request.artist_id).await {
            Ok(submission) => {
                log::info!("Job {:?} paid, watching for images", submission.predicted_job_id);
                if !orch.watch_images(IMAGE_WATCH_TIMEOUT).await {
                    if let Err(e) = orch.abandon() {
                        log::warn!("{}", e);
                    }
                }
            }
            Err(e) => log::warn!("Job failed: {}", e),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn customer_images<P: WalletProvider>(
    State(state): State<AppState<P>>,
) -> ServerResult<Json<Vec<ImageRecord>>> {
    Ok(Json(state.orchestrator.load_customer_images().await?))
}

async fn job_images<P: WalletProvider>(
    State(state): State<AppState<P>>,
    Path(job_id): Path<u64>,
) -> ServerResult<Json<ImagesResponse>> {
    let images = state.orchestrator.images().available_images(job_id).await?;
    Ok(Json(ImagesResponse { job_id, images }))
}
