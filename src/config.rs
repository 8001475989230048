use serde::Deserialize;
use std::time::Duration;

use crate::tokens::registry::{contract_principal, is_contract_principal};

/// Environment variable that overrides `replay.api_key`.
pub const API_KEY_ENV: &str = "HIRO_API_KEY";
/// Environment variable that overrides `replay.stream_id`.
pub const STREAM_ID_ENV: &str = "CHAINHOOK_UUID";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet.hiro.so",
            Self::Testnet => "https://api.testnet.hiro.so",
        }
    }
}

// ============================================================
// Replay Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    #[serde(default)]
    pub network: Network,
    /// Overrides the network's default base URL.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Default stream (chainhook UUID) for CLI replays.
    pub stream_id: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            base_url: None,
            api_key: None,
            stream_id: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    4
}

impl ReplayConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================
// Asset Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact contract principals from `[[assets]]`.
    #[default]
    AllowList,
    /// Substring match against `marker`.
    Contains,
    Any,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MatchingConfig {
    #[serde(default)]
    pub mode: MatchMode,
    pub marker: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Contract principal (`ADDR.contract`) or full asset identifier (`ADDR.contract::name`).
    pub identifier: String,
    pub symbol: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_decimals() -> u32 {
    6
}

/// Largest supported number of fractional digits.
const MAX_DECIMALS: u32 = 38;

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.replay.api_key = Some(key);
            }
        }
        if let Ok(stream) = std::env::var(STREAM_ID_ENV) {
            if !stream.is_empty() {
                self.replay.stream_id = Some(stream);
            }
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        match self.matching.mode {
            MatchMode::AllowList if self.assets.is_empty() => {
                return Err(eyre::eyre!(
                    "At least one asset must be configured for allow_list matching"
                ));
            }
            MatchMode::Contains
                if self.matching.marker.as_deref().unwrap_or_default().is_empty() =>
            {
                return Err(eyre::eyre!("Contains matching requires a non-empty marker"));
            }
            _ => {}
        }

        for asset in &self.assets {
            if !is_contract_principal(contract_principal(&asset.identifier)) {
                return Err(eyre::eyre!(
                    "Invalid contract principal '{}' in assets",
                    asset.identifier
                ));
            }
            if asset.decimals > MAX_DECIMALS {
                return Err(eyre::eyre!(
                    "Asset '{}' has {} decimals, at most {} are supported",
                    asset.identifier,
                    asset.decimals,
                    MAX_DECIMALS
                ));
            }
        }

        if self.replay.timeout_ms == 0 {
            return Err(eyre::eyre!("replay.timeout_ms must be greater than zero"));
        }
        if self.replay.concurrency == 0 {
            return Err(eyre::eyre!("replay.concurrency must be greater than zero"));
        }
        if self.replay.initial_backoff_ms > self.replay.max_backoff_ms {
            return Err(eyre::eyre!(
                "replay.initial_backoff_ms ({}) exceeds replay.max_backoff_ms ({})",
                self.replay.initial_backoff_ms,
                self.replay.max_backoff_ms
            ));
        }
        Ok(())
    }
}
