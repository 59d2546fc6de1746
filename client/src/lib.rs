//! # Waterlily - paid Stable Diffusion jobs on the FVM
//!
//! Waterlily lets a user pick an artist style, pay for an image-generation
//! job with a `StableDiffusion(artistId, prompt)` transaction, and collect
//! the images the worker network produces for it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Wallet    │────▶│ Orchestrator │────▶│  Contract   │────▶│  FVM node   │
//! │ (JSON-RPC)  │     │ (job phases) │     │ (sol! ABI)  │     │  (external) │
//! └─────────────┘     └──────┬───────┘     └─────────────┘     └─────────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!       ┌─────────────┐             ┌─────────────┐
//!       │ StatusStore │──▶ CLI/SSE  │ ImageStore  │──▶ image host (HEAD/GET)
//!       └─────────────┘             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waterlily::{AppConfig, ImageStore, JobOrchestrator, RpcClient, StatusStore, WalletConnector};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::from_env().unwrap();
//!     let signer = config.wallet_url.as_deref().map(RpcClient::new).transpose().unwrap();
//!     let reader = RpcClient::new(config.rpc_url()).unwrap();
//!     let wallet = Arc::new(WalletConnector::new(signer));
//!     wallet.connect().await.unwrap();
//!     let images = ImageStore::from_config(&config);
//!     let orchestrator = JobOrchestrator::new(config, wallet, StatusStore::new(), images)
//!         .with_reader(reader);
//!     let submission = orchestrator.run_stable_diffusion_job("a cat", "3").await.unwrap();
//!     println!("Job {:?} paid", submission.predicted_job_id);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Constants, networks and environment settings
//! - [`models`] - Artists, contract records and submissions
//! - [`rpc`] - JSON-RPC provider for wallets and nodes
//! - [`wallet`] - Wallet provider seam and connection state
//! - [`contract`] - Contract bindings
//! - [`status`] - Status record and snackbar with change notifications
//! - [`images`] - Generated image discovery and downloads
//! - [`orchestrator`] - The paid job flow
//! - [`view`] - Terminal text views
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Chain access
pub mod contract;
pub mod rpc;
pub mod wallet;

// Client state
pub mod images;
pub mod status;

// Job flow
pub mod orchestrator;

// Presentation
pub mod api;
pub mod view;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ContractError, ImageError, JobError, RpcError, ServerError, WalletError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{AppConfig, Network, NetworkEndpoints, IMAGE_COST, IMAGE_COUNT};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Artist, ArtistCatalog, ImageRecord, JobSubmission, Thumbnail};

// =============================================================================
// Re-exports - Chain access
// =============================================================================

pub use contract::{revert_reason, PendingTransaction, WaterlilyContract};
pub use rpc::{HttpProvider, RpcClient};
pub use wallet::{WalletConnector, WalletProvider, WalletState};

// =============================================================================
// Re-exports - Stores
// =============================================================================

pub use images::{download_file_name, quick_image_url, ImageState, ImageStore};
pub use status::{ErrorFlag, Snackbar, SnackbarKind, StatusEvent, StatusMessage, StatusState, StatusStore};

// =============================================================================
// Re-exports - Orchestration
// =============================================================================

pub use orchestrator::{truncate_message, CompletionPolicy, JobOrchestrator, JobPhase, JobTicket};

// =============================================================================
// Re-exports - Presentation
// =============================================================================

pub use view::{
    render_artist_card, render_image_card, render_image_record, render_prompt, render_snackbar,
    render_status, wallet_button_label, SubmitControl,
};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
