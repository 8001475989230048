//! Payload classification.
//!
//! Walks the applied blocks of a [`ChainhookPayload`] and extracts token transfers,
//! approvals and matched contract events. Classification is pure: no I/O, no mutation
//! of the payload, and the same input always yields the same output.

use super::decoder::{self, EventContext};
use super::payload::{ChainhookPayload, MalformedEvent, RawEvent};
use super::types::{ClassifiedEvents, SkippedEvent};
use crate::tokens::registry::AssetPredicate;

/// Classify every successful transaction in `payload.apply`.
///
/// Failed transactions are ignored even when they carry well-formed events. Blocks in
/// `payload.rollback` produce no derived events; their identifiers are reported in
/// [`ClassifiedEvents::retracted_blocks`]. Malformed records are skipped individually
/// and listed in [`ClassifiedEvents::skipped`].
pub fn classify<M>(payload: &ChainhookPayload, matcher: &M) -> ClassifiedEvents
where
    M: AssetPredicate + ?Sized,
{
    let mut out = ClassifiedEvents {
        retracted_blocks: payload.rollback_identifiers(),
        ..ClassifiedEvents::default()
    };

    for block in &payload.apply {
        let block_height = block.block_identifier.index;

        for tx in block.transactions.iter().filter(|tx| tx.metadata.success) {
            let tx_id = tx.transaction_identifier.hash.as_str();

            for (index, record) in tx.events.iter().enumerate() {
                let Some(event_index) = event_position(index) else {
                    tracing::warn!(
                        tx = %tx_id,
                        block = block_height,
                        events = tx.events.len(),
                        "Event index exceeds u32, ignoring remaining events"
                    );
                    break;
                };
                let ctx = EventContext {
                    tx_id,
                    block_height,
                    timestamp: block.timestamp,
                    event_index,
                };

                let event = match record.decode() {
                    Ok(event) => event,
                    Err(reason) => {
                        skip(&mut out, ctx, &reason);
                        continue;
                    }
                };

                match event {
                    RawEvent::FungibleToken(ft) => {
                        if matcher.matches(&ft.asset_identifier) {
                            out.transfers.push(decoder::decode_transfer(&ft, ctx));
                        }
                    }
                    RawEvent::Contract(log) => {
                        if !matcher.matches(&log.contract_identifier) {
                            continue;
                        }
                        out.contract_events
                            .push(decoder::decode_contract_event(&log, ctx));

                        match decoder::decode_approval(&log, ctx) {
                            Ok(Some(approval)) => out.approvals.push(approval),
                            Ok(None) => {}
                            Err(reason) => skip(&mut out, ctx, &reason),
                        }
                    }
                    RawEvent::Other { .. } => {}
                }
            }
        }
    }

    out
}

fn event_position(index: usize) -> Option<u32> {
    u32::try_from(index).ok()
}

fn skip(out: &mut ClassifiedEvents, ctx: EventContext<'_>, reason: &MalformedEvent) {
    tracing::debug!(
        tx = %ctx.tx_id,
        block = ctx.block_height,
        event_index = ctx.event_index,
        reason = %reason,
        "Skipping malformed event"
    );
    out.skipped.push(SkippedEvent {
        tx_id: ctx.tx_id.to_string(),
        block_height: ctx.block_height,
        event_index: ctx.event_index,
        reason: reason.to_string(),
    });
}
