pub mod api;
pub use api::Rejection;
pub mod room;
pub use room::{Claim, Room, RoomId};
