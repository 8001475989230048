use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::amount::TokenAmount;

/// A batch of blocks delivered by a chainhook subscription (or returned by a replay).
///
/// `apply` holds blocks newly confirmed on the canonical chain in ascending height
/// order; `rollback` holds blocks retracted by a reorganization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainhookPayload {
    #[serde(default)]
    pub apply: Vec<Block>,
    #[serde(default)]
    pub rollback: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chainhook: Option<ChainhookDescriptor>,
}

/// Identifies the subscription that produced a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainhookDescriptor {
    pub uuid: String,
    #[serde(default)]
    pub is_streaming_blocks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockIdentifier {
    pub index: u64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_identifier: BlockIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_block_identifier: Option<BlockIdentifier>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_identifier: TransactionIdentifier,
    pub metadata: TransactionMetadata,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

/// One raw event record as it appears on the wire.
///
/// The kind is implied by which sub-object is populated (`ft_event`, `contract_event`,
/// `nft_event`, ...). The record is held as untyped JSON so that a single malformed
/// record, even one that is not an object, cannot fail the deserialization of the
/// whole payload; [`EventRecord::decode`] turns it into a typed [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord(JsonValue);

/// A fungible-token balance change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FtEvent {
    pub asset_identifier: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    pub amount: TokenAmount,
    pub action: String,
}

/// An arbitrary structured log emitted by contract code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContractLog {
    pub contract_identifier: String,
    pub topic: String,
    #[serde(default)]
    pub value: JsonValue,
}

/// Typed view of an [`EventRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    FungibleToken(FtEvent),
    Contract(ContractLog),
    /// A populated kind the classifier does not handle (`nft_event`, `stx_event`, ...).
    Other { kind: String },
}

/// Why an [`EventRecord`] could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEvent {
    #[error("event record carries no recognised event body")]
    MissingBody,
    #[error("malformed ft_event: {0}")]
    FtEvent(String),
    #[error("malformed contract_event: {0}")]
    ContractEvent(String),
    #[error("malformed approval value: {0}")]
    Approval(String),
}

const FT_EVENT: &str = "ft_event";
const CONTRACT_EVENT: &str = "contract_event";

impl EventRecord {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Decode the record into its typed variant.
    ///
    /// `ft_event` takes precedence over `contract_event` if a record somehow carries both.
    /// A record tagged `ft_event`/`contract_event` whose body is absent or null is
    /// malformed, not an ignored kind.
    pub fn decode(&self) -> Result<RawEvent, MalformedEvent> {
        let fields = self.0.as_object().ok_or(MalformedEvent::MissingBody)?;

        match fields.get(FT_EVENT) {
            Some(JsonValue::Null) => return Err(missing_body(FT_EVENT)),
            Some(body) => {
                return FtEvent::deserialize(body)
                    .map(RawEvent::FungibleToken)
                    .map_err(|e| MalformedEvent::FtEvent(e.to_string()));
            }
            None => {}
        }

        match fields.get(CONTRACT_EVENT) {
            Some(JsonValue::Null) => return Err(missing_body(CONTRACT_EVENT)),
            Some(body) => {
                return ContractLog::deserialize(body)
                    .map(RawEvent::Contract)
                    .map_err(|e| MalformedEvent::ContractEvent(e.to_string()));
            }
            None => {}
        }

        let kind = fields
            .iter()
            .find(|(key, value)| key.ends_with("_event") && value.is_object())
            .map(|(key, _)| key.clone())
            .or_else(|| {
                fields
                    .get("event_type")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
            });

        match kind {
            Some(kind) if kind == FT_EVENT || kind == CONTRACT_EVENT => Err(missing_body(&kind)),
            Some(kind) => Ok(RawEvent::Other { kind }),
            None => Err(MalformedEvent::MissingBody),
        }
    }
}

fn missing_body(kind: &str) -> MalformedEvent {
    let reason = format!("record tagged {} has no {} body", kind, kind);
    if kind == FT_EVENT {
        MalformedEvent::FtEvent(reason)
    } else {
        MalformedEvent::ContractEvent(reason)
    }
}

impl ChainhookPayload {
    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.rollback.is_empty()
    }

    /// Heights of the applied blocks, in delivery order.
    pub fn apply_heights(&self) -> Vec<u64> {
        self.apply.iter().map(|b| b.block_identifier.index).collect()
    }

    /// Identifiers of the blocks retracted by this delivery.
    pub fn rollback_identifiers(&self) -> Vec<BlockIdentifier> {
        self.rollback
            .iter()
            .map(|b| b.block_identifier.clone())
            .collect()
    }
}
