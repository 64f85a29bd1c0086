use lixi_types::room::AMOUNT_UNIT;
use lixi_types::{Claim, Room, RoomId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Rooms older than this are dropped by [Store::cleanup] unless told otherwise.
pub const DEFAULT_ROOM_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {room_id} has an inverted range [{amount_min}, {amount_max}]")]
    InvalidRange {
        room_id: RoomId,
        amount_min: i64,
        amount_max: i64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub amount: i64,
    /// True when the amount was issued by an earlier call.
    pub repeated: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub rooms: usize,
    pub claims: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub rooms: usize,
    pub claims: usize,
}

type ClaimKey = (RoomId, String);

struct Tables {
    rooms: HashMap<RoomId, Room>,
    claims: HashMap<ClaimKey, Claim>,
    rng: StdRng,
}

/// Process-wide room and claim tables.
///
/// Every operation holds one mutex for its whole duration, so the
/// check-existing/draw/insert sequence of a claim is atomic and a participant
/// can never be issued two amounts for the same room.
pub struct Store {
    tables: Mutex<Tables>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded store; identifiers and rewards are reproducible across runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tables: Mutex::new(Tables {
                rooms: HashMap::new(),
                claims: HashMap::new(),
                rng,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(tables) => tables,
            Err(poisoned) => {
                tracing::warn!("Store lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn create_room(&self, amount_min: i64, amount_max: i64) -> RoomId {
        self.create_room_at(amount_min, amount_max, now_ms())
    }

    /// Open a room at `now_ms`. The range is stored as given.
    pub fn create_room_at(&self, amount_min: i64, amount_max: i64, now_ms: u64) -> RoomId {
        let mut tables = self.lock();
        let Tables { rooms, rng, .. } = &mut *tables;
        let id = loop {
            let candidate = RoomId::generate(now_ms / 1000, rng);
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        rooms.insert(
            id.clone(),
            Room {
                id: id.clone(),
                amount_min,
                amount_max,
                created_at: now_ms,
            },
        );
        id
    }

    pub fn get_room(&self, room_id: &RoomId) -> Option<Room> {
        self.lock().rooms.get(room_id).cloned()
    }

    pub fn claim(&self, room_id: &RoomId, account_id: &str) -> Result<ClaimOutcome, StoreError> {
        self.claim_at(room_id, account_id, now_ms())
    }

    /// Issue (or re-read) the reward of `account_id` in `room_id`.
    pub fn claim_at(
        &self,
        room_id: &RoomId,
        account_id: &str,
        now_ms: u64,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut tables = self.lock();
        let Tables { rooms, claims, rng } = &mut *tables;

        let room = rooms
            .get(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.clone()))?;

        let key = (room_id.clone(), account_id.to_string());
        if let Some(existing) = claims.get(&key) {
            return Ok(ClaimOutcome {
                amount: existing.amount,
                repeated: true,
            });
        }

        let (low, high) = room.reward_bounds().ok_or_else(|| StoreError::InvalidRange {
            room_id: room_id.clone(),
            amount_min: room.amount_min,
            amount_max: room.amount_max,
        })?;
        let amount = draw_reward(rng, low, high);
        claims.insert(
            key,
            Claim {
                room_id: room_id.clone(),
                account_id: account_id.to_string(),
                amount,
                claimed_at: now_ms,
            },
        );

        Ok(ClaimOutcome {
            amount,
            repeated: false,
        })
    }

    pub fn cleanup(&self, max_age: Duration) -> CleanupReport {
        self.cleanup_at(now_ms(), max_age)
    }

    /// Drop rooms older than `max_age` together with their claims.
    pub fn cleanup_at(&self, now_ms: u64, max_age: Duration) -> CleanupReport {
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        let mut tables = self.lock();
        let Tables { rooms, claims, .. } = &mut *tables;

        let rooms_before = rooms.len();
        rooms.retain(|_, room| room.age_ms(now_ms) <= max_age_ms);
        let rooms_removed = rooms_before - rooms.len();
        if rooms_removed == 0 {
            return CleanupReport::default();
        }

        let claims_before = claims.len();
        claims.retain(|(room_id, _), _| rooms.contains_key(room_id));

        CleanupReport {
            rooms: rooms_removed,
            claims: claims_before - claims.len(),
        }
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.lock().rooms.values().cloned().collect()
    }

    pub fn claims(&self) -> Vec<Claim> {
        self.lock().claims.values().cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let tables = self.lock();
        StoreStats {
            rooms: tables.rooms.len(),
            claims: tables.claims.len(),
        }
    }
}

/// Draw uniformly over the integers in `[low, high]`, then round down to a
/// multiple of [AMOUNT_UNIT]. The top of the range is only reachable by
/// drawing it exactly, so it is slightly less likely than the other steps.
fn draw_reward<R: Rng + ?Sized>(rng: &mut R, low: i64, high: i64) -> i64 {
    let raw = rng.gen_range(low..=high);
    raw.div_euclid(AMOUNT_UNIT) * AMOUNT_UNIT
}
