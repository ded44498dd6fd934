use rust_decimal::Decimal;
use thiserror::Error;

/// Native ledger value in its smallest indivisible denomination.
///
/// All core arithmetic happens on integer wei. Decimal "units" only
/// appear at the edges (genesis files, HTTP requests and responses).
pub type Wei = u128;

/// Number of decimal places between a unit and a wei.
pub const UNIT_DECIMALS: u32 = 18;

/// Wei contained in one whole unit.
pub const WEI_PER_UNIT: Wei = 1_000_000_000_000_000_000;

/// Errors converting between human units and wei.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),

    #[error("amount has more than {UNIT_DECIMALS} decimal places: {0}")]
    SubWei(Decimal),

    #[error("amount is too large: {0}")]
    Overflow(String),

    #[error("invalid wei amount: {0}")]
    Invalid(String),
}

/// Whole units expressed in wei.
pub const fn units(n: u64) -> Wei {
    n as Wei * WEI_PER_UNIT
}

/// Convert a decimal unit amount (e.g. `1.5`) into wei.
pub fn from_units(value: Decimal) -> Result<Wei, AmountError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative(value));
    }

    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > UNIT_DECIMALS {
        return Err(AmountError::SubWei(value));
    }

    let mantissa = normalized.mantissa().unsigned_abs();
    let factor = 10u128.pow(UNIT_DECIMALS - scale);

    mantissa
        .checked_mul(factor)
        .ok_or_else(|| AmountError::Overflow(value.to_string()))
}

/// Convert wei into decimal units, if representable.
pub fn to_units(wei: Wei) -> Option<Decimal> {
    let signed = i128::try_from(wei).ok()?;
    Decimal::try_from_i128_with_scale(signed, UNIT_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

/// Human form of an amount for messages: "1 unit", "1.5 units", or wei
/// when it has no unit representation.
pub fn describe(wei: Wei) -> String {
    match to_units(wei) {
        Some(units) if units == Decimal::ONE => "1 unit".to_string(),
        Some(units) => format!("{units} units"),
        None => format!("{wei} wei"),
    }
}

/// Parse a wei amount from its base-10 string form.
pub fn parse_wei(s: &str) -> Result<Wei, AmountError> {
    s.trim()
        .parse::<Wei>()
        .map_err(|_| AmountError::Invalid(s.to_string()))
}

/// Serde adapter writing wei as a base-10 string (JSON numbers lose precision above 2^53).
pub mod as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Wei;

    pub fn serialize<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_wei(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter reading and writing wei as decimal units.
pub mod as_units {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Wei;

    pub fn serialize<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        match super::to_units(*value) {
            Some(units) => Serialize::serialize(&units, serializer),
            None => serializer.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        super::from_units(value).map_err(serde::de::Error::custom)
    }
}
