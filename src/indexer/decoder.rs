use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::amount::TokenAmount;
use super::payload::{ContractLog, FtEvent, MalformedEvent};
use super::types::{ContractEvent, TokenApprovalEvent, TokenTransferEvent, TransferKind};
use crate::tokens::registry::contract_principal;

/// Topic used by `(print ...)` in Clarity contracts.
pub const PRINT_TOPIC: &str = "print";
/// Discriminant value marking a print payload as an allowance grant.
pub const APPROVAL_TYPE: &str = "approval";

/// Where a raw record sits in the payload.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub tx_id: &'a str,
    pub block_height: u64,
    pub timestamp: i64,
    pub event_index: u32,
}

#[derive(Debug, Deserialize)]
struct ApprovalBody {
    owner: String,
    spender: String,
    amount: TokenAmount,
}

/// Build a transfer/mint/burn record from an `ft_event`.
pub fn decode_transfer(ft: &FtEvent, ctx: EventContext<'_>) -> TokenTransferEvent {
    TokenTransferEvent {
        tx_id: ctx.tx_id.to_string(),
        block_height: ctx.block_height,
        timestamp: ctx.timestamp,
        sender: ft.sender.clone().unwrap_or_default(),
        recipient: ft.recipient.clone().unwrap_or_default(),
        amount: ft.amount.clone(),
        event_type: TransferKind::from_action(&ft.action),
        contract_address: contract_principal(&ft.asset_identifier).to_string(),
        event_index: ctx.event_index,
    }
}

/// Wrap a contract log as a generic contract event.
pub fn decode_contract_event(log: &ContractLog, ctx: EventContext<'_>) -> ContractEvent {
    ContractEvent {
        tx_id: ctx.tx_id.to_string(),
        block_height: ctx.block_height,
        timestamp: ctx.timestamp,
        contract_address: log.contract_identifier.clone(),
        topic: log.topic.clone(),
        value: log.value.clone(),
        event_index: ctx.event_index,
    }
}

/// True if the log is a `print` whose value announces an approval.
pub fn is_approval(log: &ContractLog) -> bool {
    log.topic == PRINT_TOPIC
        && log.value.get("type").and_then(JsonValue::as_str) == Some(APPROVAL_TYPE)
}

/// Attempt to read an approval out of a contract log.
///
/// Returns `Ok(None)` if the log is not an approval print, and an error if it is one
/// but `owner`, `spender` or `amount` are missing or ill-typed.
pub fn decode_approval(
    log: &ContractLog,
    ctx: EventContext<'_>,
) -> Result<Option<TokenApprovalEvent>, MalformedEvent> {
    if !is_approval(log) {
        return Ok(None);
    }

    let body = ApprovalBody::deserialize(&log.value)
        .map_err(|e| MalformedEvent::Approval(e.to_string()))?;

    Ok(Some(TokenApprovalEvent {
        tx_id: ctx.tx_id.to_string(),
        block_height: ctx.block_height,
        timestamp: ctx.timestamp,
        owner: body.owner,
        spender: body.spender,
        amount: body.amount,
        contract_address: log.contract_identifier.clone(),
        event_index: ctx.event_index,
    }))
}
