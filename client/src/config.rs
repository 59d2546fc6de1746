//! Application configuration.
//!
//! Constants for the job economics plus the network table. Deployment
//! settings come from the environment (a `.env` file is honoured by the
//! binary) and can be overridden from the command line.

use alloy_primitives::Address;
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Price of one job, in FIL.
pub const IMAGE_COST: &str = "0.1";

/// Images produced per job.
pub const IMAGE_COUNT: usize = 4;

/// Error messages shown to the user are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 64;

/// Default location of the generated images.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://ai-art-files.cluster.world/outputs";

/// Variable holding the Waterlily (ArtistAttribution) contract address.
pub const CONTRACT_ADDRESS_VAR: &str = "WATERLILY_CONTRACT_ADDRESS";

/// Variable holding the LilypadEvents contract address.
pub const EVENTS_CONTRACT_ADDRESS_VAR: &str = "WATERLILY_EVENTS_CONTRACT_ADDRESS";

/// How long to watch the image host for a job's images.
pub const IMAGE_WATCH_TIMEOUT: Duration = Duration::from_secs(600);

const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Which network set is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    /// Endpoint set for this network.
    pub fn endpoints(self) -> &'static NetworkEndpoints {
        match self {
            Network::Testnet => &FILECOIN_HYPERSPACE,
            Network::Mainnet => &FILECOIN_MAINNET,
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "testnet" | "hyperspace" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Testnet => write!(f, "testnet"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// RPC endpoints and block explorer roots of one network.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEndpoints {
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc: &'static [&'static str],
    pub block_explorer: &'static [&'static str],
}

impl NetworkEndpoints {
    /// Primary RPC endpoint.
    pub fn rpc_url(&self) -> &'static str {
        self.rpc[0]
    }

    /// Explorer URL prefix; a transaction hash is appended directly.
    pub fn explorer_root(&self) -> &'static str {
        self.block_explorer[0]
    }
}

pub static FILECOIN_HYPERSPACE: NetworkEndpoints = NetworkEndpoints {
    name: "Filecoin Hyperspace",
    chain_id: 3141,
    rpc: &[
        "https://api.hyperspace.node.glif.io/rpc/v1",
        "https://hyperspace.filfox.info/rpc/v1",
    ],
    block_explorer: &[
        "https://hyperspace.filfox.info/en/message/",
        "https://explorer.glif.io/tx/",
    ],
};

pub static FILECOIN_MAINNET: NetworkEndpoints = NetworkEndpoints {
    name: "Filecoin Mainnet",
    chain_id: 314,
    rpc: &["https://api.node.glif.io", "https://rpc.ankr.com/filecoin"],
    block_explorer: &["https://filfox.info/en/message/", "https://explorer.glif.io/tx/"],
};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: Network,
    /// Wallet JSON-RPC endpoint. `None` means no wallet is available.
    pub wallet_url: Option<String>,
    /// Read endpoint override; the network's primary RPC otherwise.
    pub rpc_url: Option<String>,
    /// Deployed contracts. There is no built-in deployment, so both must
    /// come from the environment before the chain can be used.
    pub contract_address: Option<Address>,
    pub events_contract_address: Option<Address>,
    pub image_base_url: String,
    pub download_dir: PathBuf,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Defaults for a network, without a wallet or contracts.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            wallet_url: None,
            rpc_url: None,
            contract_address: None,
            events_contract_address: None,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            download_dir: PathBuf::from("downloads"),
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Load from `WATERLILY_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        let network = match env::var("WATERLILY_NETWORK") {
            Ok(value) => value.parse()?,
            Err(_) => Network::Testnet,
        };
        let mut config = Self::for_network(network);

        if let Ok(url) = env::var("WATERLILY_WALLET_URL") {
            if !url.trim().is_empty() {
                config.wallet_url = Some(url);
            }
        }
        if let Ok(url) = env::var("WATERLILY_RPC_URL") {
            if !url.trim().is_empty() {
                config.rpc_url = Some(url);
            }
        }
        if let Ok(value) = env::var(CONTRACT_ADDRESS_VAR) {
            config.contract_address = Some(parse_address(CONTRACT_ADDRESS_VAR, &value)?);
        }
        if let Ok(value) = env::var(EVENTS_CONTRACT_ADDRESS_VAR) {
            config.events_contract_address =
                Some(parse_address(EVENTS_CONTRACT_ADDRESS_VAR, &value)?);
        }
        if let Ok(url) = env::var("WATERLILY_IMAGE_BASE_URL") {
            config.image_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = env::var("WATERLILY_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Ok(value) = env::var("WATERLILY_CONFIRMATION_TIMEOUT_SECS") {
            let secs = parse_u64("WATERLILY_CONFIRMATION_TIMEOUT_SECS", &value)?;
            config.confirmation_timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = env::var("WATERLILY_POLL_INTERVAL_MS") {
            let ms = parse_u64("WATERLILY_POLL_INTERVAL_MS", &value)?;
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Endpoint set of the selected network.
    pub fn endpoints(&self) -> &'static NetworkEndpoints {
        self.network.endpoints()
    }

    /// Endpoint for contract reads.
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.endpoints().rpc_url())
    }

    /// `(ArtistAttribution, LilypadEvents)` addresses.
    pub fn contract_addresses(&self) -> ConfigResult<(Address, Address)> {
        let contract = self
            .contract_address
            .ok_or(ConfigError::MissingSetting(CONTRACT_ADDRESS_VAR))?;
        let events = self
            .events_contract_address
            .ok_or(ConfigError::MissingSetting(EVENTS_CONTRACT_ADDRESS_VAR))?;
        Ok((contract, events))
    }

    /// Explorer link for a transaction hash.
    pub fn explorer_link(&self, tx_hash: &str) -> String {
        format!("{}{}", self.endpoints().explorer_root(), tx_hash)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_network(Network::Testnet)
    }
}

fn parse_address(name: &'static str, value: &str) -> ConfigResult<Address> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        name,
        value: value.to_string(),
    })
}

fn parse_u64(name: &'static str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}
