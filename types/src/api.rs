//! JSON bodies exchanged over HTTP.
//!
//! Both business endpoints answer with HTTP 200. Success and failure are told
//! apart by the body shape: `id`/`money` on success, `message` on failure.

use crate::RoomId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every user-facing failure of the create and claim endpoints.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("amount required")]
    AmountRequired,
    #[error("amount must be a two-element array")]
    AmountNotPair,
    #[error("amount range must be between 10 and 500")]
    AmountOutOfRange,
    #[error("invalid id")]
    InvalidId,
    #[error("invalid account")]
    InvalidAccount,
    #[error("room not found")]
    RoomNotFound,
    #[error("claim failed")]
    ClaimFailed,
}

impl Rejection {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::AmountRequired => "amount_required",
            Rejection::AmountNotPair => "amount_not_pair",
            Rejection::AmountOutOfRange => "amount_out_of_range",
            Rejection::InvalidId => "invalid_id",
            Rejection::InvalidAccount => "invalid_account",
            Rejection::RoomNotFound => "room_not_found",
            Rejection::ClaimFailed => "claim_failed",
        }
    }
}

/// Body of `POST /api/room` once validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub amount: [i64; 2],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub id: RoomId,
}

/// Body of `POST /api/get-lixi` once validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub id: RoomId,
    pub account_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub money: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl From<Rejection> for MessageResponse {
    fn from(rejection: Rejection) -> Self {
        Self {
            message: rejection.to_string(),
        }
    }
}
