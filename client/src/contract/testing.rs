//! Scripted wallet used by the test suites.

use alloy_primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use alloy_sol_types::SolCall;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ArtistAttribution, LilypadEvents};
use crate::config::AppConfig;
use crate::error::{RpcError, RpcResult};
use crate::models::ImageRecord;
use crate::wallet::WalletProvider;

pub(crate) const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";
pub(crate) const TX_HASH: &str = "0x000000000000000000000000000000000000000000000000000000000000feed";
pub(crate) const CONTRACT: Address = Address::with_last_byte(0xc0);
pub(crate) const EVENTS_CONTRACT: Address = Address::with_last_byte(0xe0);

/// Default settings with both contracts deployed.
pub(crate) fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.contract_address = Some(CONTRACT);
    config.events_contract_address = Some(EVENTS_CONTRACT);
    config
}

/// Answers from canned values and records what it was asked.
pub(crate) struct FakeWallet {
    pub accounts: Vec<Address>,
    pub job_counter: u64,
    pub customer_images: Vec<u64>,
    send_error: Mutex<Option<RpcError>>,
    receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    final_receipt: Option<TransactionReceipt>,
    images: Mutex<VecDeque<ImageRecord>>,
    sent: Mutex<Vec<TransactionRequest>>,
    calls: AtomicUsize,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            accounts: vec![ACCOUNT.parse().unwrap()],
            job_counter: 41,
            customer_images: vec![],
            send_error: Mutex::new(None),
            receipts: Mutex::new(VecDeque::new()),
            final_receipt: Some(receipt(true)),
            images: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// `eth_sendTransaction` fails once with `err`.
    pub fn with_send_error(self, err: RpcError) -> Self {
        *self.send_error.lock().unwrap() = Some(err);
        self
    }

    /// Receipts returned before `final_receipt`, in order.
    pub fn with_receipts(self, receipts: Vec<Option<TransactionReceipt>>) -> Self {
        *self.receipts.lock().unwrap() = receipts.into();
        self
    }

    /// Never mine the transaction.
    pub fn pending_forever(mut self) -> Self {
        self.final_receipt = None;
        self
    }

    /// `getImage` answers, in order; the last one repeats.
    pub fn with_images(self, images: Vec<ImageRecord>) -> Self {
        *self.images.lock().unwrap() = images.into();
        self
    }

    /// Requests seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn next_image(&self) -> Option<ImageRecord> {
        let mut images = self.images.lock().unwrap();
        if images.len() > 1 {
            images.pop_front()
        } else {
            images.front().cloned()
        }
    }
}

/// Receipt of `TX_HASH` mined in block 42, in the node's wire format.
pub(crate) fn receipt(succeeded: bool) -> TransactionReceipt {
    serde_json::from_value(json!({
        "type": "0x0",
        "status": if succeeded { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "11".repeat(32)),
        "blockNumber": "0x2a",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x1",
        "from": ACCOUNT,
        "to": CONTRACT,
        "contractAddress": null
    }))
    .unwrap()
}

pub(crate) fn image(id: u64, is_complete: bool, is_cancelled: bool) -> ImageRecord {
    ImageRecord {
        id,
        customer: ACCOUNT.into(),
        artist: "3".into(),
        prompt: "a cat".into(),
        is_complete,
        is_cancelled,
    }
}

impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> RpcResult<Vec<Address>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.clone())
    }

    async fn accounts(&self) -> RpcResult<Vec<Address>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(3141)
    }

    async fn call(&self, tx: TransactionRequest) -> RpcResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let to = match tx.to {
            Some(TxKind::Call(to)) => to,
            _ => return Err(RpcError::InvalidResponse("call without target".into())),
        };
        let data = tx.input.input().cloned().unwrap_or_default();
        let selector = data.get(..4).unwrap_or_default();

        if to == EVENTS_CONTRACT && selector == LilypadEvents::currentJobIDCall::SELECTOR.as_slice() {
            let ret = LilypadEvents::currentJobIDCall::abi_encode_returns(&(U256::from(
                self.job_counter,
            ),));
            return Ok(ret.into());
        }
        if to != CONTRACT {
            return Err(RpcError::InvalidResponse(format!("no contract at {}", to)));
        }
        if selector == ArtistAttribution::getCustomerImagesCall::SELECTOR.as_slice() {
            let ids: Vec<U256> = self.customer_images.iter().map(|id| U256::from(*id)).collect();
            let ret = ArtistAttribution::getCustomerImagesCall::abi_encode_returns(&(ids,));
            return Ok(ret.into());
        }
        if selector == ArtistAttribution::getImageCall::SELECTOR.as_slice() {
            let record = self
                .next_image()
                .ok_or_else(|| RpcError::InvalidResponse("no image scripted".into()))?;
            let image = ArtistAttribution::Image {
                id: U256::from(record.id),
                customer: record.customer.parse::<Address>().unwrap_or(Address::ZERO),
                artist: record.artist,
                prompt: record.prompt,
                isComplete: record.is_complete,
                isCancelled: record.is_cancelled,
            };
            let ret = ArtistAttribution::getImageCall::abi_encode_returns(&(image,));
            return Ok(ret.into());
        }
        Err(RpcError::InvalidResponse("unexpected call".into()))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> RpcResult<TxHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_error.lock().unwrap().take() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(tx);
        Ok(TX_HASH.parse().unwrap())
    }

    async fn transaction_receipt(&self, _hash: TxHash) -> RpcResult<Option<TransactionReceipt>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut receipts = self.receipts.lock().unwrap();
        Ok(match receipts.pop_front() {
            Some(scripted) => scripted,
            None => self.final_receipt.clone(),
        })
    }
}
