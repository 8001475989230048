use bigdecimal::num_bigint::{BigInt, Sign};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A token amount in the smallest on-chain unit.
///
/// Backed by an arbitrary-precision integer; always non-negative. Serialized as a
/// decimal string so that values beyond 2^53 survive JSON consumers intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(BigInt);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid token amount '{0}': expected a non-negative base-10 integer")]
pub struct ParseAmountError(pub String);

impl TokenAmount {
    pub fn is_zero(&self) -> bool {
        self.0.sign() == Sign::NoSign
    }

    /// Render the amount with `decimals` fractional digits, trimming trailing zeros.
    ///
    /// Uses exact integer division; `format(6)` of `1500000` is `"1.5"`.
    pub fn format(&self, decimals: u32) -> String {
        let divisor = BigInt::from(10u8).pow(decimals);
        let whole = &self.0 / &divisor;
        let remainder = &self.0 % &divisor;

        if remainder.sign() == Sign::NoSign {
            return whole.to_string();
        }

        let padded = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
        let trimmed = padded.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

impl FromStr for TokenAmount {
    type Err = ParseAmountError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // BigInt accepts signs and digit separators; on-chain amounts never carry them.
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError(raw.to_string()));
        }
        BigInt::from_str(raw)
            .map(TokenAmount)
            .map_err(|_| ParseAmountError(raw.to_string()))
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(BigInt::from(value))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct TokenAmountVisitor;

impl<'de> Visitor<'de> for TokenAmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal integer string or a non-negative integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TokenAmount, E> {
        TokenAmount::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TokenAmount, E> {
        Ok(TokenAmount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TokenAmount, E> {
        u64::try_from(v)
            .map(TokenAmount::from)
            .map_err(|_| E::custom(ParseAmountError(v.to_string())))
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TokenAmountVisitor)
    }
}
