//! Wallet connection.
//!
//! [`WalletProvider`] is the seam to whatever signs transactions: a
//! JSON-RPC endpoint exposed by a wallet such as Frame, or a node with
//! unlocked accounts. [`WalletConnector`] keeps the connection state the
//! rest of the client reads.

use alloy_primitives::{Address, Bytes, TxHash};
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{RpcResult, WalletError, WalletResult};

/// Requests the client needs from a wallet or node.
///
/// [`crate::rpc::RpcClient`] implements it over HTTP.
pub trait WalletProvider: Send + Sync + 'static {
    /// Ask the wallet to expose its accounts (may prompt the user).
    fn request_accounts(&self) -> impl Future<Output = RpcResult<Vec<Address>>> + Send;

    /// Accounts already exposed, without prompting.
    fn accounts(&self) -> impl Future<Output = RpcResult<Vec<Address>>> + Send;

    /// Chain the wallet is currently on.
    fn chain_id(&self) -> impl Future<Output = RpcResult<u64>> + Send;

    /// Read-only contract call.
    fn call(&self, tx: TransactionRequest) -> impl Future<Output = RpcResult<Bytes>> + Send;

    /// Submit a transaction for signing; returns its hash.
    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = RpcResult<TxHash>> + Send;

    /// Receipt of a mined transaction, `None` while pending.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = RpcResult<Option<TransactionReceipt>>> + Send;
}

/// Connection state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub is_connected: bool,
    pub accounts: Vec<String>,
}

impl WalletState {
    /// Connected as soon as there is an account; addresses are kept as
    /// lowercase hex.
    fn from_accounts(accounts: Vec<Address>) -> Self {
        Self {
            is_connected: !accounts.is_empty(),
            accounts: accounts.iter().map(|a| format!("{:#x}", a)).collect(),
        }
    }
}

/// Owns the provider and the connection state.
pub struct WalletConnector<P> {
    provider: Option<Arc<P>>,
    state: RwLock<WalletState>,
}

impl<P: WalletProvider> WalletConnector<P> {
    /// Wrap a provider. `None` models an environment without a wallet.
    pub fn new(provider: Option<P>) -> Self {
        Self {
            provider: provider.map(Arc::new),
            state: RwLock::new(WalletState::default()),
        }
    }

    /// Whether a wallet is present at all.
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Shared handle to the provider.
    pub fn provider(&self) -> Option<Arc<P>> {
        self.provider.clone()
    }

    /// Connect and load the account list.
    pub async fn connect(&self) -> WalletResult<WalletState> {
        let provider = self.provider.as_ref().ok_or(WalletError::Unavailable)?;

        log::info!("Connecting to wallet...");
        let state = WalletState::from_accounts(provider.request_accounts().await?);
        self.replace(state.clone());

        if state.is_connected {
            log::info!("Connected to wallet: {}", state.accounts[0]);
            Ok(state)
        } else {
            log::warn!("Wallet returned no accounts");
            Err(WalletError::NoAccounts)
        }
    }

    /// Pick up a connection the wallet already granted, without prompting.
    ///
    /// An empty account list simply leaves the connector disconnected.
    pub async fn restore(&self) -> WalletResult<WalletState> {
        let provider = self.provider.as_ref().ok_or(WalletError::Unavailable)?;
        let state = WalletState::from_accounts(provider.accounts().await?);
        self.replace(state.clone());
        Ok(state)
    }

    /// Chain id reported by the wallet.
    pub async fn chain_id(&self) -> WalletResult<u64> {
        let provider = self.provider.as_ref().ok_or(WalletError::Unavailable)?;
        Ok(provider.chain_id().await?)
    }

    /// Forget the accounts.
    pub fn disconnect(&self) {
        self.replace(WalletState::default());
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> WalletState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected
    }

    pub fn accounts(&self) -> Vec<String> {
        self.state().accounts
    }

    /// First account, the one that signs.
    pub fn primary_account(&self) -> WalletResult<String> {
        let state = self.state();
        match state.accounts.into_iter().next() {
            Some(account) if state.is_connected => Ok(account),
            _ => Err(WalletError::NotConnected),
        }
    }

    fn replace(&self, state: WalletState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
