use std::collections::{HashMap, HashSet};

use crate::config::{Config, MatchMode};

/// Decimals assumed for assets that have no registry entry.
pub const DEFAULT_DECIMALS: u32 = 6;

/// Separator between a contract principal and the asset name in an asset identifier.
const ASSET_SEPARATOR: &str = "::";

/// Decides which contracts the classifier extracts events for.
pub trait AssetPredicate {
    fn matches(&self, identifier: &str) -> bool;
}

impl<F> AssetPredicate for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, identifier: &str) -> bool {
        self(identifier)
    }
}

/// Configured asset selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetMatcher {
    /// Exact contract principals. `SP000.token::tok` matches an entry `SP000.token`.
    AllowList(HashSet<String>),
    /// Substring match on the whole identifier.
    Contains(String),
    Any,
}

impl AssetMatcher {
    pub fn allow_list<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(identifiers.into_iter().map(Into::into).collect())
    }
}

impl AssetPredicate for AssetMatcher {
    fn matches(&self, identifier: &str) -> bool {
        match self {
            Self::AllowList(set) => {
                set.contains(identifier) || set.contains(contract_principal(identifier))
            }
            Self::Contains(marker) => identifier.contains(marker.as_str()),
            Self::Any => true,
        }
    }
}

/// The contract principal part of an asset identifier (`ADDR.contract::asset` → `ADDR.contract`).
/// Identifiers without a separator are returned unchanged.
pub fn contract_principal(identifier: &str) -> &str {
    identifier
        .split_once(ASSET_SEPARATOR)
        .map(|(principal, _)| principal)
        .unwrap_or(identifier)
}

/// Loose structural check for a Stacks contract principal: `S<address>.<contract-name>`.
pub fn is_contract_principal(identifier: &str) -> bool {
    let Some((address, name)) = identifier.split_once('.') else {
        return false;
    };

    let address_ok = address.len() >= 28
        && address.starts_with('S')
        && address.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    let name_ok = !name.is_empty()
        && name.len() <= 128
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    address_ok && name_ok
}

/// Metadata for a watched token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u32,
}

/// Display metadata for configured assets, keyed by contract principal.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenMeta>,
}

impl TokenRegistry {
    pub fn from_config(config: &Config) -> Self {
        let tokens = config
            .assets
            .iter()
            .map(|asset| {
                let principal = contract_principal(&asset.identifier).to_string();
                let symbol = asset.symbol.clone().unwrap_or_else(|| {
                    principal
                        .rsplit('.')
                        .next()
                        .unwrap_or(principal.as_str())
                        .to_string()
                });
                (
                    principal,
                    TokenMeta {
                        symbol,
                        decimals: asset.decimals,
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn get(&self, identifier: &str) -> Option<&TokenMeta> {
        self.tokens.get(contract_principal(identifier))
    }

    pub fn decimals_for(&self, identifier: &str) -> u32 {
        self.get(identifier)
            .map(|t| t.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Build the classifier's matcher from config.
pub fn build_asset_matcher(config: &Config) -> AssetMatcher {
    match config.matching.mode {
        MatchMode::Any => AssetMatcher::Any,
        MatchMode::Contains => {
            AssetMatcher::Contains(config.matching.marker.clone().unwrap_or_default())
        }
        MatchMode::AllowList => {
            let mut set = HashSet::new();
            for asset in &config.assets {
                let principal = contract_principal(&asset.identifier);
                if !is_contract_principal(principal) {
                    tracing::error!(
                        identifier = %asset.identifier,
                        "Invalid contract principal in config, skipping"
                    );
                    continue;
                }
                set.insert(principal.to_string());
            }
            AssetMatcher::AllowList(set)
        }
    }
}
