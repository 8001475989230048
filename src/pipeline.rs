use serde::Serialize;
use std::io::Write;

use crate::config::Config;
use crate::format::{format_address, format_timestamp};
use crate::indexer::classifier::classify;
use crate::indexer::payload::{BlockIdentifier, ChainhookPayload};
use crate::indexer::types::{
    ClassifiedEvents, ContractEvent, TokenApprovalEvent, TokenTransferEvent,
};
use crate::tokens::registry::{build_asset_matcher, AssetMatcher, TokenRegistry};

/// Receives classified events from the pipeline.
///
/// Implementations persist, forward or display events. Writes should be idempotent on
/// `(tx_id, event_index)`: the same payload may be delivered more than once.
pub trait EventSink {
    fn on_transfer(&mut self, event: &TokenTransferEvent) -> eyre::Result<()>;

    fn on_approval(&mut self, event: &TokenApprovalEvent) -> eyre::Result<()>;

    fn on_contract_event(&mut self, event: &ContractEvent) -> eyre::Result<()>;

    /// Called for every retracted block before any newly applied event.
    fn on_rollback(&mut self, _block: &BlockIdentifier) -> eyre::Result<()> {
        Ok(())
    }
}

/// Counts from processing one payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub transfers: u64,
    pub approvals: u64,
    pub contract_events: u64,
    pub skipped: u64,
    pub retracted_blocks: u64,
}

impl IngestSummary {
    pub fn of(events: &ClassifiedEvents) -> Self {
        Self {
            transfers: events.transfers.len() as u64,
            approvals: events.approvals.len() as u64,
            contract_events: events.contract_events.len() as u64,
            skipped: events.skipped.len() as u64,
            retracted_blocks: events.retracted_blocks.len() as u64,
        }
    }
}

/// Classifies payloads and hands the results to a sink.
///
/// Holds only immutable configuration, so one pipeline can serve live deliveries and
/// replays alike.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    matcher: AssetMatcher,
    registry: TokenRegistry,
}

impl IngestPipeline {
    pub fn new(matcher: AssetMatcher, registry: TokenRegistry) -> Self {
        Self { matcher, registry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(build_asset_matcher(config), TokenRegistry::from_config(config))
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn classify(&self, payload: &ChainhookPayload) -> ClassifiedEvents {
        classify(payload, &self.matcher)
    }

    /// Classify `payload` and dispatch: rollbacks first, then transfers, approvals and
    /// contract events, each in encounter order.
    pub fn process<S>(&self, payload: &ChainhookPayload, sink: &mut S) -> eyre::Result<IngestSummary>
    where
        S: EventSink + ?Sized,
    {
        let events = self.classify(payload);
        self.dispatch(&events, sink)?;

        let summary = IngestSummary::of(&events);
        if summary.skipped > 0 {
            tracing::warn!(skipped = summary.skipped, "Malformed events skipped");
        }
        tracing::info!(
            blocks = payload.apply.len(),
            transfers = summary.transfers,
            approvals = summary.approvals,
            contract_events = summary.contract_events,
            retracted = summary.retracted_blocks,
            "Payload processed"
        );
        Ok(summary)
    }

    pub fn dispatch<S>(&self, events: &ClassifiedEvents, sink: &mut S) -> eyre::Result<()>
    where
        S: EventSink + ?Sized,
    {
        for block in &events.retracted_blocks {
            tracing::warn!(block = block.index, hash = %block.hash, "Block retracted by reorg");
            sink.on_rollback(block)?;
        }
        for transfer in &events.transfers {
            sink.on_transfer(transfer)?;
        }
        for approval in &events.approvals {
            sink.on_approval(approval)?;
        }
        for event in &events.contract_events {
            sink.on_contract_event(event)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum TaggedEvent<'a> {
    Transfer(&'a TokenTransferEvent),
    Approval(&'a TokenApprovalEvent),
    Contract(&'a ContractEvent),
    Rollback(&'a BlockIdentifier),
}

/// Writes each event as one JSON object per line: `{"type":"transfer","data":{...}}`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, event: TaggedEvent<'_>) -> eyre::Result<()> {
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn on_transfer(&mut self, event: &TokenTransferEvent) -> eyre::Result<()> {
        self.write(TaggedEvent::Transfer(event))
    }

    fn on_approval(&mut self, event: &TokenApprovalEvent) -> eyre::Result<()> {
        self.write(TaggedEvent::Approval(event))
    }

    fn on_contract_event(&mut self, event: &ContractEvent) -> eyre::Result<()> {
        self.write(TaggedEvent::Contract(event))
    }

    fn on_rollback(&mut self, block: &BlockIdentifier) -> eyre::Result<()> {
        self.write(TaggedEvent::Rollback(block))
    }
}

/// Human-readable one-line-per-event output with amounts scaled by asset decimals.
pub struct TextSink<W: Write> {
    writer: W,
    registry: TokenRegistry,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W, registry: TokenRegistry) -> Self {
        Self { writer, registry }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn symbol(&self, contract: &str) -> String {
        self.registry
            .get(contract)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| format_address(contract))
    }
}

impl<W: Write> EventSink for TextSink<W> {
    fn on_transfer(&mut self, event: &TokenTransferEvent) -> eyre::Result<()> {
        let decimals = self.registry.decimals_for(&event.contract_address);
        let symbol = self.symbol(&event.contract_address);
        writeln!(
            self.writer,
            "[{}] #{} {} {} {} {} -> {} ({})",
            event.event_type.as_str(),
            event.block_height,
            format_timestamp(event.timestamp),
            event.amount.format(decimals),
            symbol,
            format_address(&event.sender),
            format_address(&event.recipient),
            format_address(&event.tx_id),
        )?;
        Ok(())
    }

    fn on_approval(&mut self, event: &TokenApprovalEvent) -> eyre::Result<()> {
        let decimals = self.registry.decimals_for(&event.contract_address);
        let symbol = self.symbol(&event.contract_address);
        writeln!(
            self.writer,
            "[approval] #{} {} {} {} owner {} spender {} ({})",
            event.block_height,
            format_timestamp(event.timestamp),
            event.amount.format(decimals),
            symbol,
            format_address(&event.owner),
            format_address(&event.spender),
            format_address(&event.tx_id),
        )?;
        Ok(())
    }

    fn on_contract_event(&mut self, event: &ContractEvent) -> eyre::Result<()> {
        writeln!(
            self.writer,
            "[{}] #{} {} {} {}",
            event.topic,
            event.block_height,
            format_address(&event.contract_address),
            event.value,
            format_address(&event.tx_id),
        )?;
        Ok(())
    }

    fn on_rollback(&mut self, block: &BlockIdentifier) -> eyre::Result<()> {
        writeln!(self.writer, "[rollback] #{} {}", block.index, format_address(&block.hash))?;
        Ok(())
    }
}
