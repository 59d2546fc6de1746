//! JSON-RPC access through an alloy HTTP provider.
//!
//! Speaks to an EIP-1193 style wallet endpoint or a plain node: the
//! process never holds keys, `eth_sendTransaction` is signed by whatever
//! sits behind the URL.

use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{BlockId, TransactionReceipt, TransactionRequest};
use alloy_transport_http::Http;

use crate::error::{RpcError, RpcResult};
use crate::wallet::WalletProvider;

/// Provider over plain HTTP, without fillers.
pub type HttpProvider = RootProvider<Http<reqwest::Client>>;

/// Client for one JSON-RPC endpoint.
pub struct RpcClient {
    provider: HttpProvider,
    url: reqwest::Url,
}

impl RpcClient {
    /// Create a client for the given endpoint.
    pub fn new(url: &str) -> RpcResult<Self> {
        let url: reqwest::Url = url
            .trim()
            .parse()
            .map_err(|_| RpcError::InvalidUrl(url.to_string()))?;
        Ok(Self {
            provider: RootProvider::new_http(url.clone()),
            url,
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }
}

impl WalletProvider for RpcClient {
    async fn request_accounts(&self) -> RpcResult<Vec<Address>> {
        log::debug!("rpc -> eth_requestAccounts ({})", self.url);
        Ok(self
            .provider
            .raw_request("eth_requestAccounts".into(), ())
            .await?)
    }

    async fn accounts(&self) -> RpcResult<Vec<Address>> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn call(&self, tx: TransactionRequest) -> RpcResult<Bytes> {
        Ok(self.provider.call(&tx).block(BlockId::latest()).await?)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> RpcResult<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> RpcResult<Option<TransactionReceipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        if let Some(receipt) = &receipt {
            log::debug!(
                "receipt for {}: block {:?}, status {}",
                hash,
                receipt.block_number(),
                receipt.status()
            );
        }
        Ok(receipt)
    }
}
