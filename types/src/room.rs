//! Room and claim records.
//!
//! Amounts on a [Room] are expressed in thousands of minor currency units,
//! amounts on a [Claim] in minor units.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Smallest `amount_min` accepted when a room is opened.
pub const AMOUNT_MIN_FLOOR: i64 = 10;

/// Largest `amount_max` accepted when a room is opened.
pub const AMOUNT_MAX_CEILING: i64 = 500;

/// Minor units per room amount unit. Rewards are always a multiple of this.
pub const AMOUNT_UNIT: i64 = 1_000;

/// Length of a room identifier in hex characters.
pub const ROOM_ID_LEN: usize = 24;

/// Number of leading hex characters carrying the creation second.
const ROOM_ID_TIMESTAMP_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("room id must be 24 characters, got {0}")]
    Length(usize),
    #[error("room id must be hexadecimal")]
    NotHex,
}

/// Opaque room identifier: 24 hex characters.
///
/// Generated ids are a low-resolution timestamp prefix followed by random
/// digits. Nothing relies on the prefix; only uniqueness and the lexical
/// pattern matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Build a fresh id from the current unix second and `rng`.
    pub fn generate<R: Rng + ?Sized>(unix_secs: u64, rng: &mut R) -> Self {
        let mut id = String::with_capacity(ROOM_ID_LEN);
        id.push_str(&format!("{:08x}", unix_secs & 0xffff_ffff));
        for _ in ROOM_ID_TIMESTAMP_LEN..ROOM_ID_LEN {
            let digit = rng.gen_range(0..16u32);
            // 0..16 is always a valid radix-16 digit.
            id.push(char::from_digit(digit, 16).unwrap_or('0'));
        }
        Self(id)
    }

    /// Accept any 24-character hex string, in either case.
    pub fn parse(raw: &str) -> Result<Self, RoomIdError> {
        if raw.len() != ROOM_ID_LEN {
            return Err(RoomIdError::Length(raw.len()));
        }
        if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RoomIdError::NotHex);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

/// A reward pool with a closed amount range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub amount_min: i64,
    pub amount_max: i64,
    pub created_at: u64,
}

impl Room {
    /// Reward bounds in minor units, or `None` when the range is inverted.
    pub fn reward_bounds(&self) -> Option<(i64, i64)> {
        let low = self.amount_min.checked_mul(AMOUNT_UNIT)?;
        let high = self.amount_max.checked_mul(AMOUNT_UNIT)?;
        (low <= high).then_some((low, high))
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at)
    }
}

/// A participant's one-time draw against a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub room_id: RoomId,
    pub account_id: String,
    pub amount: i64,
    pub claimed_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generated_ids_parse() {
        let mut rng = StdRng::seed_from_u64(7);
        for secs in [0u64, 1_700_000_000, u64::MAX] {
            let id = RoomId::generate(secs, &mut rng);
            assert_eq!(id.as_str().len(), ROOM_ID_LEN);
            assert_eq!(RoomId::parse(id.as_str()), Ok(id));
        }
    }

    #[test]
    fn generated_ids_carry_timestamp_prefix() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = RoomId::generate(0x6543_21ab, &mut rng);
        assert!(id.as_str().starts_with("654321ab"));
    }

    #[test]
    fn parse_rejects_bad_ids() {
        assert_eq!(RoomId::parse("not-hex"), Err(RoomIdError::Length(7)));
        assert_eq!(
            RoomId::parse("zzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(RoomIdError::NotHex)
        );
        assert_eq!(
            RoomId::parse("0123456789abcdef012345678"),
            Err(RoomIdError::Length(25))
        );
        assert!(RoomId::parse("0123456789ABCDEF01234567").is_ok());
    }

    #[test]
    fn serde_validates_ids() {
        let ok: RoomId = serde_json::from_str("\"0123456789abcdef01234567\"").unwrap();
        assert_eq!(ok.as_str(), "0123456789abcdef01234567");
        assert!(serde_json::from_str::<RoomId>("\"abc\"").is_err());
    }

    #[test]
    fn reward_bounds() {
        let mut room = Room {
            id: RoomId::parse("0123456789abcdef01234567").unwrap(),
            amount_min: 10,
            amount_max: 500,
            created_at: 0,
        };
        assert_eq!(room.reward_bounds(), Some((10_000, 500_000)));
        room.amount_min = 501;
        assert_eq!(room.reward_bounds(), None);
        room.amount_min = i64::MAX;
        assert_eq!(room.reward_bounds(), None);
    }
}
