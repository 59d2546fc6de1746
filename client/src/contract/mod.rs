//! Waterlily contract bindings.
//!
//! ABI encoding comes from `sol!`. Reads go to a network RPC endpoint,
//! writes go through the [`WalletProvider`] of the signing account.
//!
//! ```rust,ignore
//! let contract = WaterlilyContract::read_only(node, &config)?.with_signer(wallet, &account)?;
//! let next_id = contract.current_job_id().await? + 1;
//! let pending = contract.stable_diffusion("3", "a cat", price).await?;
//! let receipt = contract.wait_for_receipt(&pending, interval, timeout).await?;
//! ```

use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, TxHash, TxKind, U256};
use alloy_rpc_types_eth::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_sol_types::{sol, Revert, SolCall, SolError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{ContractError, ContractResult};
use crate::models::ImageRecord;
use crate::wallet::WalletProvider;

sol! {
    interface ArtistAttribution {
        struct Image {
            uint256 id;
            address customer;
            string artist;
            string prompt;
            bool isComplete;
            bool isCancelled;
        }

        function StableDiffusion(string calldata artistId, string calldata prompt) external payable;
        function getImage(uint256 id) external view returns (Image memory);
        function getCustomerImages(address customer) external view returns (uint256[] memory);
    }

    interface LilypadEvents {
        function currentJobID() external view returns (uint256);
    }
}

static REVERT_REASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"revert reason: Error\((.*?)\)").expect("valid revert regex"));

/// Transaction accepted by the wallet, not yet mined.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub hash: TxHash,
}

/// Handle on the deployed contracts.
///
/// Built read-only over a node; [`WaterlilyContract::with_signer`] adds the
/// wallet that pays for jobs.
pub struct WaterlilyContract<P> {
    reader: Arc<P>,
    wallet: Option<Arc<P>>,
    address: Address,
    events_address: Address,
    signer: Option<Address>,
}

impl<P: WalletProvider> WaterlilyContract<P> {
    /// Bind the configured contracts for reads through `reader`.
    pub fn read_only(reader: Arc<P>, config: &AppConfig) -> ContractResult<Self> {
        let (address, events_address) = config.contract_addresses()?;
        Ok(Self {
            reader,
            wallet: None,
            address,
            events_address,
            signer: None,
        })
    }

    /// Send writes from `signer` through `wallet`.
    pub fn with_signer(mut self, wallet: Arc<P>, signer: &str) -> ContractResult<Self> {
        let signer: Address = signer
            .parse()
            .map_err(|_| ContractError::InvalidAddress(signer.to_string()))?;
        self.wallet = Some(wallet);
        self.signer = Some(signer);
        Ok(self)
    }

    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    /// `LilypadEvents.currentJobID()`.
    pub async fn current_job_id(&self) -> ContractResult<u64> {
        let call = LilypadEvents::currentJobIDCall {};
        let raw = self.eth_call(self.events_address, call.abi_encode()).await?;
        let ret = LilypadEvents::currentJobIDCall::abi_decode_returns(&raw, true)?;
        to_u64(ret._0)
    }

    /// `ArtistAttribution.StableDiffusion(artistId, prompt)` paying `value` wei.
    ///
    /// Gas is left to the wallet's estimate.
    pub async fn stable_diffusion(
        &self,
        artist_id: &str,
        prompt: &str,
        value: U256,
    ) -> ContractResult<PendingTransaction> {
        let (wallet, from) = self.writer()?;
        let call = ArtistAttribution::StableDiffusionCall {
            artistId: artist_id.to_string(),
            prompt: prompt.to_string(),
        };
        let tx = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(self.address)),
            value: Some(value),
            input: TransactionInput::both(call.abi_encode().into()),
            ..Default::default()
        };

        let hash = wallet.send_transaction(tx).await?;
        log::info!("StableDiffusion tx submitted: {}", hash);
        Ok(PendingTransaction { hash })
    }

    /// Poll the wallet for the receipt until it arrives or `timeout`
    /// elapses.
    pub async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        interval: Duration,
        timeout: Duration,
    ) -> ContractResult<TransactionReceipt> {
        let (wallet, _) = self.writer()?;
        let poll = async {
            loop {
                if let Some(receipt) = wallet.transaction_receipt(pending.hash).await? {
                    return Ok::<_, ContractError>(receipt);
                }
                tokio::time::sleep(interval).await;
            }
        };

        let receipt = tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ContractError::ConfirmationTimeout(pending.hash.to_string()))??;

        if !receipt.status() {
            return Err(ContractError::Reverted(pending.hash.to_string()));
        }
        log::debug!("{} mined in block {:?}", pending.hash, receipt.block_number());
        Ok(receipt)
    }

    /// `ArtistAttribution.getImage(id)`.
    pub async fn get_image(&self, id: u64) -> ContractResult<ImageRecord> {
        let call = ArtistAttribution::getImageCall { id: U256::from(id) };
        let raw = self.eth_call(self.address, call.abi_encode()).await?;
        let image = ArtistAttribution::getImageCall::abi_decode_returns(&raw, true)?._0;

        Ok(ImageRecord {
            id: to_u64(image.id)?,
            customer: image.customer.to_string(),
            artist: image.artist,
            prompt: image.prompt,
            is_complete: image.isComplete,
            is_cancelled: image.isCancelled,
        })
    }

    /// `ArtistAttribution.getCustomerImages(customer)`.
    pub async fn get_customer_images(&self, customer: &str) -> ContractResult<Vec<u64>> {
        let customer: Address = customer
            .parse()
            .map_err(|_| ContractError::InvalidAddress(customer.to_string()))?;
        let call = ArtistAttribution::getCustomerImagesCall { customer };
        let raw = self.eth_call(self.address, call.abi_encode()).await?;
        let ids = ArtistAttribution::getCustomerImagesCall::abi_decode_returns(&raw, true)?._0;
        ids.into_iter().map(to_u64).collect()
    }

    fn writer(&self) -> ContractResult<(&Arc<P>, Address)> {
        match (&self.wallet, self.signer) {
            (Some(wallet), Some(signer)) => Ok((wallet, signer)),
            _ => Err(ContractError::NoSigner),
        }
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> ContractResult<Vec<u8>> {
        let tx = TransactionRequest {
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(data.into()),
            ..Default::default()
        };
        Ok(self.reader.call(tx).await?.to_vec())
    }
}

/// Extract the human readable reason of a reverted transaction.
///
/// Recognises `revert reason: Error(<reason>)` in the node's message (or
/// its `data.message`) and ABI encoded `Error(string)` revert data.
pub fn revert_reason(err: &ContractError) -> Option<String> {
    let ContractError::Rpc(rpc) = err else {
        return None;
    };

    let display = rpc.to_string();
    for text in rpc.data_message().into_iter().chain([display.as_str()]) {
        if let Some(captures) = REVERT_REASON.captures(text) {
            return captures.get(1).map(|m| m.as_str().to_string());
        }
    }

    let data = rpc.data_message()?;
    let bytes = decode_hex(data).ok()?;
    Revert::abi_decode(&bytes, true).ok().map(|revert| revert.reason)
}

fn to_u64(value: U256) -> ContractResult<u64> {
    u64::try_from(value).map_err(|_| ContractError::OutOfRange(value.to_string()))
}

fn decode_hex(value: &str) -> ContractResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    Ok(hex::decode(digits)?)
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::testing::{self, receipt, FakeWallet, ACCOUNT, CONTRACT, TX_HASH};
    use super::*;
    use crate::error::RpcError;
    use serde_json::json;

    fn contract(wallet: FakeWallet) -> (Arc<FakeWallet>, WaterlilyContract<FakeWallet>) {
        let wallet = Arc::new(wallet);
        let contract = WaterlilyContract::read_only(wallet.clone(), &testing::config())
            .and_then(|c| c.with_signer(wallet.clone(), ACCOUNT))
            .unwrap();
        (wallet, contract)
    }

    fn pending() -> PendingTransaction {
        PendingTransaction {
            hash: TX_HASH.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_current_job_id() {
        let (_, contract) = contract(FakeWallet::new());
        assert_eq!(contract.current_job_id().await.unwrap(), 41);
    }

    #[tokio::test]
    async fn test_stable_diffusion_encodes_call_and_value() {
        let (wallet, contract) = contract(FakeWallet::new());
        let price = alloy_primitives::utils::parse_ether("0.1").unwrap();

        let pending = contract.stable_diffusion("3", "a cat", price).await.unwrap();
        assert_eq!(pending.hash.to_string(), TX_HASH);

        let sent = wallet.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, Some(ACCOUNT.parse::<Address>().unwrap()));
        assert_eq!(sent[0].to, Some(TxKind::Call(CONTRACT)));
        assert_eq!(sent[0].value, Some(price));
        assert_eq!(sent[0].gas, None);

        let body = serde_json::to_value(&sent[0]).unwrap();
        assert_eq!(body["value"], "0x16345785d8a0000");
        assert!(body.get("gas").is_none());

        let data = sent[0].input.input().unwrap();
        let call = ArtistAttribution::StableDiffusionCall::abi_decode(data, true).unwrap();
        assert_eq!(call.artistId, "3");
        assert_eq!(call.prompt, "a cat");
    }

    #[tokio::test]
    async fn test_read_only_handle_cannot_pay() {
        let wallet = Arc::new(FakeWallet::new());
        let contract = WaterlilyContract::read_only(wallet.clone(), &testing::config()).unwrap();
        assert!(contract.signer().is_none());
        assert_eq!(contract.current_job_id().await.unwrap(), 41);

        let err = contract
            .stable_diffusion("3", "a cat", U256::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::NoSigner));
        assert!(wallet.sent().is_empty());
    }

    #[test]
    fn test_unconfigured_contracts() {
        let wallet = Arc::new(FakeWallet::new());
        let err = WaterlilyContract::read_only(wallet, &AppConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "WATERLILY_CONTRACT_ADDRESS is not set");
    }

    #[tokio::test]
    async fn test_wait_for_receipt_polls_until_mined() {
        let (wallet, contract) = contract(FakeWallet::new().with_receipts(vec![None, None]));

        let receipt = contract
            .wait_for_receipt(&pending(), Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(receipt.block_number, Some(42));
        assert_eq!(wallet.calls(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_receipt_reverted() {
        let (_, contract) = contract(FakeWallet::new().with_receipts(vec![Some(receipt(false))]));

        let err = contract
            .wait_for_receipt(&pending(), Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_wait_for_receipt_times_out() {
        let (_, contract) = contract(FakeWallet::new().pending_forever());

        let err = contract
            .wait_for_receipt(&pending(), Duration::from_millis(1), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::ConfirmationTimeout(_)));
    }

    #[tokio::test]
    async fn test_get_image_decodes_struct() {
        let (_, contract) = contract(FakeWallet::new().with_images(vec![testing::image(42, true, false)]));
        let image = contract.get_image(42).await.unwrap();
        assert_eq!(image.id, 42);
        assert_eq!(image.prompt, "a cat");
        assert!(image.is_complete);
        assert!(!image.is_cancelled);
        assert_eq!(image.customer.to_lowercase(), ACCOUNT);
    }

    #[tokio::test]
    async fn test_get_customer_images() {
        let mut wallet = FakeWallet::new();
        wallet.customer_images = vec![4, 9];
        let (_, contract) = contract(wallet);

        let ids = contract.get_customer_images(ACCOUNT).await.unwrap();
        assert_eq!(ids, vec![4, 9]);

        assert!(matches!(
            contract.get_customer_images("not-an-address").await,
            Err(ContractError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_revert_reason_from_data_message() {
        let err = ContractError::Rpc(RpcError::Rpc {
            code: 1,
            message: "message execution failed".into(),
            data: Some(json!({
                "message": "message execution failed: exit 33, revert reason: Error(Not enough FIL sent), vm error: ..."
            })),
        });
        assert_eq!(revert_reason(&err).as_deref(), Some("Not enough FIL sent"));
    }

    #[test]
    fn test_revert_reason_from_abi_data() {
        let revert = Revert {
            reason: "artist does not exist".to_string(),
        };
        let err = ContractError::Rpc(RpcError::Rpc {
            code: 3,
            message: "execution reverted".into(),
            data: Some(json!(format!("0x{}", hex::encode(revert.abi_encode())))),
        });
        assert_eq!(revert_reason(&err).as_deref(), Some("artist does not exist"));
    }

    #[test]
    fn test_no_revert_reason() {
        let err = ContractError::Rpc(RpcError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        });
        assert!(revert_reason(&err).is_none());
        assert!(revert_reason(&ContractError::Reverted("0x1".into())).is_none());
    }
}
