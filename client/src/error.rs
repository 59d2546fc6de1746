//! Error types for the Waterlily client.
//!
//! - [`ConfigError`] - Environment and network configuration errors
//! - [`RpcError`] - JSON-RPC transport and node errors
//! - [`WalletError`] - Wallet connection errors
//! - [`ContractError`] - ABI and transaction errors
//! - [`ImageError`] - Image lookup and download errors
//! - [`JobError`] - Top-level job orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use alloy_transport::TransportError;
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown network name.
    #[error("Unknown network '{0}' (expected 'testnet' or 'mainnet')")]
    UnknownNetwork(String),

    /// Invalid address literal.
    #[error("Invalid contract address for {name}: {value}")]
    InvalidAddress { name: &'static str, value: String },

    /// Invalid numeric setting.
    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },

    /// A required setting is not set.
    #[error("{0} is not set")]
    MissingSetting(&'static str),
}

// =============================================================================
// JSON-RPC Errors
// =============================================================================

/// Errors from the JSON-RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Endpoint URL could not be parsed.
    #[error("Invalid RPC endpoint: {0}")]
    InvalidUrl(String),

    /// Transport failure below the JSON-RPC layer.
    #[error("RPC transport failed: {0}")]
    Transport(TransportError),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Response did not have the expected shape.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match err {
            alloy_json_rpc::RpcError::ErrorResp(payload) => RpcError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
                data: payload
                    .data
                    .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            },
            other => RpcError::Transport(other),
        }
    }
}

impl RpcError {
    /// Human readable text carried in the error's `data` payload, if any.
    ///
    /// Nodes put revert details either in `data.message` or directly in
    /// `data` as a string.
    pub fn data_message(&self) -> Option<&str> {
        match self {
            RpcError::Rpc { data: Some(data), .. } => data
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| data.as_str()),
            _ => None,
        }
    }
}

// =============================================================================
// Wallet Errors
// =============================================================================

/// Errors from the wallet connector.
#[derive(Debug, Error)]
pub enum WalletError {
    /// No wallet endpoint configured.
    #[error("Web3 not available")]
    Unavailable,

    /// The wallet returned no accounts.
    #[error("Wallet returned no accounts")]
    NoAccounts,

    /// Wallet is not connected.
    #[error("Wallet is not connected")]
    NotConnected,

    /// Transport error.
    #[error("Wallet request failed: {0}")]
    Rpc(#[from] RpcError),
}

// =============================================================================
// Contract Errors
// =============================================================================

/// Errors from contract calls and transactions.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Transport error.
    #[error("{0}")]
    Rpc(#[from] RpcError),

    /// Contract addresses are not configured.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// No endpoint to read the contract from.
    #[error("No RPC endpoint available for contract reads")]
    Unavailable,

    /// A write was attempted on a read-only handle.
    #[error("No signing account bound to the contract")]
    NoSigner,

    /// ABI decoding failed.
    #[error("Failed to decode contract response: {0}")]
    Decode(#[from] alloy_sol_types::Error),

    /// Hex payload could not be parsed.
    #[error("Invalid hex in RPC response: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Value does not fit the target type.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Receipt reports a failed execution.
    #[error("Transaction {0} reverted")]
    Reverted(String),

    /// Receipt did not arrive in time.
    #[error("Timed out waiting for transaction {0}")]
    ConfirmationTimeout(String),

    /// Account string is not an address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Price literal could not be parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

// =============================================================================
// Image Errors
// =============================================================================

/// Errors while checking for or downloading generated images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Writing the file failed.
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Job Errors (top-level)
// =============================================================================

/// Top-level job orchestration errors.
///
/// Returned by [`crate::orchestrator::JobOrchestrator::run_stable_diffusion_job`].
/// Every variant has already been written to the status store by the time
/// the caller sees it.
#[derive(Debug, Error)]
pub enum JobError {
    /// No wallet endpoint.
    #[error("Web3 not available")]
    EnvironmentUnavailable,

    /// Cannot reach the provider or derive a contract handle.
    #[error("Something went wrong connecting to contract")]
    ConnectionFailure,

    /// Revert or rejection, reason already truncated.
    #[error("{reason}")]
    TransactionFailure { reason: String },

    /// Any other failure, string form already truncated.
    #[error("{message}")]
    UnknownFailure { message: String },

    /// A job is already in flight.
    #[error("A job is already in progress")]
    JobInFlight,

    /// The worker network cancelled the job.
    #[error("Error Running Bacalhau Job")]
    Cancelled,

    /// Completion polling gave up.
    #[error("Timed out waiting for job {0} to complete")]
    Timeout(u64),

    /// Illegal phase transition.
    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
///
/// Handlers return these directly; the status code mapping lives next to
/// the response bodies in `api::types`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Job could not be started.
    #[error("{0}")]
    Job(#[from] JobError),

    /// Invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Wallet request failed.
    #[error("{0}")]
    Wallet(#[from] WalletError),

    /// Contract read failed.
    #[error("{0}")]
    Contract(#[from] ContractError),

    /// Image host lookup failed.
    #[error("{0}")]
    Image(#[from] ImageError),

    /// Binding or serving failed.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for JSON-RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Result type for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;

/// Result type for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// Result type for job orchestration.
pub type JobResult<T> = Result<T, JobError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
