use chainhook_ingest::config::{AssetConfig, Config};
use chainhook_ingest::indexer::types::TransferKind;
use chainhook_ingest::pipeline::JsonLinesSink;
use chainhook_ingest::tokens::AssetMatcher;
use chainhook_ingest::{classify, ChainhookPayload, IngestPipeline, IngestSummary};
use serde_json::Value as JsonValue;

const TOKEN: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.fungible-token";

fn fixture() -> ChainhookPayload {
    serde_json::from_str(include_str!("fixtures/fungible_token_payload.json"))
        .expect("fixture parses")
}

fn token_matcher() -> AssetMatcher {
    AssetMatcher::allow_list([TOKEN])
}

#[test]
fn classifies_fixture_payload() {
    let events = classify(&fixture(), &token_matcher());

    let kinds: Vec<_> = events
        .transfers
        .iter()
        .map(|t| (t.tx_id.as_str(), t.event_type, t.amount.to_string()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("0xmint", TransferKind::Mint, "500".to_string()),
            ("0xtransfer", TransferKind::Transfer, "1000000".to_string()),
            ("0xtransfer", TransferKind::Burn, "250000".to_string()),
        ]
    );

    let mint = &events.transfers[0];
    assert_eq!(mint.sender, "");
    assert_eq!(mint.recipient, "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG");
    assert_eq!(mint.block_height, 1000);
    assert_eq!(mint.timestamp, 1_700_000_000);
    assert_eq!(mint.contract_address, TOKEN);

    let burn = &events.transfers[2];
    assert_eq!(burn.recipient, "");
    assert_eq!(burn.event_index, 4);

    assert_eq!(events.approvals.len(), 1);
    let approval = &events.approvals[0];
    assert_eq!(approval.tx_id, "0xapprove");
    assert_eq!(approval.owner, "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
    assert_eq!(approval.spender, "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG");
    assert_eq!(approval.amount.to_string(), "100000000000000000000000000");

    // Every matched contract log is kept, approval or not
    let topics: Vec<_> = events
        .contract_events
        .iter()
        .map(|e| (e.tx_id.as_str(), e.event_index))
        .collect();
    assert_eq!(topics, vec![("0xapprove", 0), ("0xapprove", 1)]);

    assert_eq!(events.skipped.len(), 1);
    assert_eq!(events.skipped[0].tx_id, "0xtransfer");
    assert_eq!(events.skipped[0].event_index, 3);
}

#[test]
fn failed_transactions_contribute_nothing() {
    let events = classify(&fixture(), &AssetMatcher::Any);
    let all_tx_ids = events
        .transfers
        .iter()
        .map(|t| t.tx_id.as_str())
        .chain(events.approvals.iter().map(|a| a.tx_id.as_str()))
        .chain(events.contract_events.iter().map(|c| c.tx_id.as_str()))
        .chain(events.skipped.iter().map(|s| s.tx_id.as_str()));

    for tx_id in all_tx_ids {
        assert_ne!(tx_id, "0xfailed");
    }
}

#[test]
fn rollback_blocks_are_reported_not_classified() {
    let events = classify(&fixture(), &AssetMatcher::Any);

    assert_eq!(events.retracted_blocks.len(), 1);
    assert_eq!(events.retracted_blocks[0].index, 998);
    assert_eq!(events.retracted_blocks[0].hash, "0xdeadbeef");
    assert!(events.transfers.iter().all(|t| t.tx_id != "0xorphaned"));
}

#[test]
fn any_matcher_includes_unlisted_assets() {
    let narrow = classify(&fixture(), &token_matcher());
    let wide = classify(&fixture(), &AssetMatcher::Any);

    assert_eq!(wide.transfers.len(), narrow.transfers.len() + 1);
    assert!(wide
        .transfers
        .iter()
        .any(|t| t.contract_address.ends_with(".other-fungible-token")));
}

#[test]
fn nothing_matches_without_allowed_assets() {
    let events = classify(&fixture(), &|_: &str| false);

    assert!(events.transfers.is_empty());
    assert!(events.approvals.is_empty());
    assert!(events.contract_events.is_empty());
    // Malformed records are reported before asset filtering
    assert_eq!(events.skipped.len(), 1);
}

#[test]
fn classification_is_deterministic() {
    let payload = fixture();
    let first = serde_json::to_value(classify(&payload, &token_matcher())).unwrap();
    let second = serde_json::to_value(classify(&payload, &token_matcher())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn pipeline_writes_json_lines_in_dispatch_order() {
    let config = Config {
        assets: vec![AssetConfig {
            identifier: TOKEN.to_string(),
            symbol: Some("FT".to_string()),
            decimals: 6,
        }],
        ..Config::default()
    };
    let pipeline = IngestPipeline::from_config(&config);

    let mut sink = JsonLinesSink::new(Vec::new());
    let summary = pipeline.process(&fixture(), &mut sink).unwrap();
    assert_eq!(
        summary,
        IngestSummary {
            transfers: 3,
            approvals: 1,
            contract_events: 2,
            skipped: 1,
            retracted_blocks: 1,
        }
    );

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<JsonValue> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let types: Vec<_> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["rollback", "transfer", "transfer", "transfer", "approval", "contract", "contract"]
    );

    // Amounts travel as decimal strings so precision survives JSON
    assert_eq!(lines[4]["data"]["amount"], "100000000000000000000000000");
    assert_eq!(lines[1]["data"]["txId"], "0xmint");
}

#[test]
fn empty_payload_yields_empty_result() {
    let payload: ChainhookPayload = serde_json::from_str(r#"{"apply":[],"rollback":[]}"#).unwrap();
    assert!(payload.is_empty());
    assert!(classify(&payload, &AssetMatcher::Any).is_empty());
}
