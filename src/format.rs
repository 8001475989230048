//! Display helpers for classified events.

use chrono::{DateTime, Local, TimeZone};

use crate::indexer::amount::TokenAmount;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Format a raw on-chain amount with `decimals` fractional digits.
///
/// `format_amount("1500000", 6)` is `"1.5"`. Fails if `raw` is not a non-negative
/// base-10 integer.
pub fn format_amount(raw: &str, decimals: u32) -> eyre::Result<String> {
    let amount: TokenAmount = raw.parse()?;
    Ok(amount.format(decimals))
}

/// Shorten an address to `first6...last4`. Addresses of at most 10 characters are
/// returned unchanged.
pub fn format_address(address: &str) -> String {
    let len = address.chars().count();
    if len <= 10 {
        return address.to_string();
    }
    let head: String = address.chars().take(6).collect();
    let tail: String = address.chars().skip(len - 4).collect();
    format!("{}...{}", head, tail)
}

/// Render Unix seconds in the local time zone.
pub fn format_timestamp(seconds: i64) -> String {
    format_timestamp_in(seconds, &Local)
}

pub fn format_timestamp_in<Tz>(seconds: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp(seconds, 0) {
        Some(utc) => utc
            .with_timezone(tz)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        None => seconds.to_string(),
    }
}
