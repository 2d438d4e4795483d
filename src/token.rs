use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Decimals of the WAK reward token.
pub const WAK_DECIMALS: u32 = 18;
/// Base units per whole WAK token (10^18).
pub const BASE_PER_WAK: u128 = 1_000_000_000_000_000_000;
/// Token symbol as emitted in receipts.
pub const WAK_SYMBOL: &str = "WAK";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token amount: {0}")]
    Invalid(String),
    #[error("token amount overflow")]
    Overflow,
}

/// A WAK amount carried in base units (1 WAK = 10^18 base units).
///
/// Serialized as a decimal string so no client ever sees a float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub fn from_base(base: u128) -> Self {
        TokenAmount(base)
    }

    pub fn from_whole(whole: u128) -> Result<Self, TokenError> {
        whole
            .checked_mul(BASE_PER_WAK)
            .map(TokenAmount)
            .ok_or(TokenError::Overflow)
    }

    pub fn base(&self) -> u128 {
        self.0
    }

    /// Whole-token rendering for receipts and UI payloads.
    pub fn whole(&self) -> f64 {
        self.0 as f64 / BASE_PER_WAK as f64
    }

    /// Decimal whole-token string without trailing fraction when the amount
    /// is an exact multiple of one WAK ("5", "2.5", "0.000000000000000001").
    pub fn whole_string(&self) -> String {
        let int = self.0 / BASE_PER_WAK;
        let frac = self.0 % BASE_PER_WAK;
        if frac == 0 {
            return int.to_string();
        }
        let frac = format!("{frac:018}");
        format!("{int}.{}", frac.trim_end_matches('0'))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenAmount {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u128>()
            .map(TokenAmount)
            .map_err(|_| TokenError::Invalid(trimmed.to_string()))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<'s> utoipa::ToSchema<'s> for TokenAmount {
    fn schema() -> (
        &'s str,
        utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
    ) {
        (
            "TokenAmount",
            utoipa::openapi::ObjectBuilder::new()
                .schema_type(utoipa::openapi::SchemaType::String)
                .description(Some("WAK amount in base units, decimal string"))
                .into(),
        )
    }
}

/// Unit tag carried by every client-supplied amount. Storage is always base
/// units; the tag exists so nothing is ever inferred from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RewardUnit {
    Base,
    Whole,
}

/// Amount as it arrives from a client: decimal string plus explicit unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaggedAmount {
    pub amount: String,
    pub unit: RewardUnit,
}

impl TaggedAmount {
    pub fn normalize(&self) -> Result<TokenAmount, TokenError> {
        let value = self
            .amount
            .trim()
            .parse::<u128>()
            .map_err(|_| TokenError::Invalid(self.amount.clone()))?;
        match self.unit {
            RewardUnit::Base => Ok(TokenAmount::from_base(value)),
            RewardUnit::Whole => TokenAmount::from_whole(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tagged_amount_normalizes_to_whole_tokens() {
        let tagged = TaggedAmount {
            amount: "5000000000000000000".into(),
            unit: RewardUnit::Base,
        };
        let amount = tagged.normalize().unwrap();
        assert_eq!(amount.whole_string(), "5");
        assert_eq!(amount.base(), 5 * BASE_PER_WAK);
    }

    #[test]
    fn whole_tagged_amount_stays_put() {
        let tagged = TaggedAmount {
            amount: "5".into(),
            unit: RewardUnit::Whole,
        };
        let amount = tagged.normalize().unwrap();
        assert_eq!(amount.whole_string(), "5");
        assert_eq!(amount.base(), 5 * BASE_PER_WAK);
    }

    #[test]
    fn fractional_rendering_trims_zeros() {
        let amount = TokenAmount::from_base(2_500_000_000_000_000_000);
        assert_eq!(amount.whole_string(), "2.5");
        assert_eq!(amount.whole(), 2.5);
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        let bad = TaggedAmount { amount: "5.0".into(), unit: RewardUnit::Whole };
        assert!(matches!(bad.normalize(), Err(TokenError::Invalid(_))));
        let huge = TaggedAmount { amount: u128::MAX.to_string(), unit: RewardUnit::Whole };
        assert_eq!(huge.normalize(), Err(TokenError::Overflow));
    }

    #[test]
    fn serde_round_trips_as_string() {
        let amount = TokenAmount::from_base(42);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"42\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
