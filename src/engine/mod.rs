//! 방 단위 샷클락 엔진

mod room;
mod task;
mod timer;

pub use room::{MemberId, MemberSender, RoomEngine};
pub use task::{spawn_room, RoomEvent};
