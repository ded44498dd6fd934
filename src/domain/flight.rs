use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::address::Address;

/// Domain separator mixed into every flight key.
const FLIGHT_KEY_DOMAIN: &[u8] = b"surety.flight.v1";

/// Deterministic identifier of a flight.
///
/// Derived from (airline, flight designator, scheduled timestamp) with
/// SHA-256 over a length-prefixed encoding, so distinct triples never
/// share an encoding and collide only if the hash does.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlightKey([u8; 32]);

impl FlightKey {
    /// Derive the key for a flight.
    pub fn derive(airline: &Address, flight: &str, timestamp: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(FLIGHT_KEY_DOMAIN);
        hasher.update((airline.as_str().len() as u64).to_be_bytes());
        hasher.update(airline.as_str().as_bytes());
        hasher.update((flight.len() as u64).to_be_bytes());
        hasher.update(flight.as_bytes());
        hasher.update(timestamp.to_be_bytes());

        FlightKey(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex form with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlightKey({})", self.to_hex())
    }
}

impl FromStr for FlightKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("0x");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(FlightKey(bytes))
    }
}

impl Serialize for FlightKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FlightKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Flight outcome reported by oracles.
///
/// Wire values follow the status codes the oracle workers emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum StatusCode {
    #[default]
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Only a delay attributed to the airline pays out.
    #[inline]
    pub fn triggers_payout(&self) -> bool {
        *self == StatusCode::LateAirline
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Unknown => "Unknown",
            StatusCode::OnTime => "On Time",
            StatusCode::LateAirline => "Late Airline",
            StatusCode::LateWeather => "Late Weather",
            StatusCode::LateTechnical => "Late Technical",
            StatusCode::LateOther => "Late (Other)",
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        StatusCode::ALL
            .into_iter()
            .find(|s| s.code() == value)
            .ok_or_else(|| format!("unknown status code {value}"))
    }
}

impl From<StatusCode> for u8 {
    fn from(value: StatusCode) -> Self {
        value.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A flight known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub registered: bool,
    pub status_code: StatusCode,
    pub is_finalized: bool,
}

impl Flight {
    /// A freshly registered flight with unknown status.
    pub fn new(airline: Address, flight: impl Into<String>, timestamp: u64) -> Self {
        let flight = flight.into();
        Flight {
            key: FlightKey::derive(&airline, &flight, timestamp),
            airline,
            flight,
            timestamp,
            registered: true,
            status_code: StatusCode::Unknown,
            is_finalized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_key_is_deterministic() {
        let airline = Address::new("0xA1");
        let a = FlightKey::derive(&airline, "AC110", 1591878209161);
        let b = FlightKey::derive(&Address::new("0xa1"), "AC110", 1591878209161);
        assert_eq!(a, b);
    }

    #[test]
    fn test_flight_key_distinguishes_triples() {
        let airline = Address::new("0xa1");
        let base = FlightKey::derive(&airline, "AC110", 1591878209161);

        assert_ne!(base, FlightKey::derive(&airline, "AC111", 1591878209161));
        assert_ne!(base, FlightKey::derive(&airline, "AC110", 1591878209162));
        assert_ne!(base, FlightKey::derive(&Address::new("0xa2"), "AC110", 1591878209161));
    }

    #[test]
    fn test_flight_key_length_prefix_prevents_shifting() {
        // "0xa1" + "1AC" must not collide with "0xa11" + "AC".
        let a = FlightKey::derive(&Address::new("0xa1"), "1AC", 7);
        let b = FlightKey::derive(&Address::new("0xa11"), "AC", 7);
        assert_ne!(a, b);
    }

    #[test]
    fn test_flight_key_hex_round_trip() {
        let key = FlightKey::derive(&Address::new("0xa1"), "AC110", 1);
        let parsed: FlightKey = key.to_hex().parse().unwrap();
        assert_eq!(parsed, key);
        assert!("0x1234".parse::<FlightKey>().is_err());
    }

    #[test]
    fn test_status_code_wire_values() {
        assert_eq!(StatusCode::LateAirline.code(), 20);
        assert_eq!(StatusCode::try_from(50).unwrap(), StatusCode::LateOther);
        assert!(StatusCode::try_from(25).is_err());

        let json = serde_json::to_string(&StatusCode::OnTime).unwrap();
        assert_eq!(json, "10");
        let parsed: StatusCode = serde_json::from_str("20").unwrap();
        assert_eq!(parsed, StatusCode::LateAirline);
        assert!(serde_json::from_str::<StatusCode>("99").is_err());
    }

    #[test]
    fn test_only_late_airline_pays() {
        for status in StatusCode::ALL {
            assert_eq!(status.triggers_payout(), status == StatusCode::LateAirline);
        }
    }
}
