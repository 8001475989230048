use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::amount::TokenAmount;
use super::payload::BlockIdentifier;

/// Kind of balance change carried by an `ft_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Mint,
    Burn,
    Transfer,
}

impl TransferKind {
    /// Map an `ft_event` action. Unknown actions are treated as plain transfers.
    pub fn from_action(action: &str) -> Self {
        match action {
            "mint" => Self::Mint,
            "burn" => Self::Burn,
            _ => Self::Transfer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
            Self::Transfer => "transfer",
        }
    }
}

/// A fungible-token transfer, mint or burn extracted from an applied block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferEvent {
    pub tx_id: String,
    pub block_height: u64,
    pub timestamp: i64,
    /// Empty for mints.
    pub sender: String,
    /// Empty for burns.
    pub recipient: String,
    pub amount: TokenAmount,
    pub event_type: TransferKind,
    /// Contract principal, i.e. the asset identifier without its `::name` suffix.
    pub contract_address: String,
    pub event_index: u32,
}

/// An allowance grant announced through a `print` event with `type: "approval"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenApprovalEvent {
    pub tx_id: String,
    pub block_height: u64,
    pub timestamp: i64,
    pub owner: String,
    pub spender: String,
    pub amount: TokenAmount,
    pub contract_address: String,
    pub event_index: u32,
}

/// A matched contract log, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub tx_id: String,
    pub block_height: u64,
    pub timestamp: i64,
    pub contract_address: String,
    pub topic: String,
    pub value: JsonValue,
    pub event_index: u32,
}

/// A raw record that was dropped because its shape did not match its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEvent {
    pub tx_id: String,
    pub block_height: u64,
    pub event_index: u32,
    pub reason: String,
}

/// Everything extracted from one payload, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEvents {
    pub transfers: Vec<TokenTransferEvent>,
    pub approvals: Vec<TokenApprovalEvent>,
    pub contract_events: Vec<ContractEvent>,
    pub skipped: Vec<SkippedEvent>,
    /// Blocks the payload retracts. Events previously derived from them are stale.
    pub retracted_blocks: Vec<BlockIdentifier>,
}

impl ClassifiedEvents {
    /// True when nothing was extracted and nothing was retracted.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
            && self.approvals.is_empty()
            && self.contract_events.is_empty()
            && self.retracted_blocks.is_empty()
    }
}
