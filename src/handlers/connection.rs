//! 연결 핸들러

use crate::engine::MemberId;
use crate::protocol::ServerMessage;
use crate::state::{Admission, AppState, JoinError, RoomHandle};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 입장에 성공한 연결
pub struct Session {
    pub member_id: MemberId,
    pub room: RoomHandle,
    pub authenticated: bool,
}

/// 새 연결 처리
///
/// PIN 검증을 통과하면 방 멤버로 등록한다. 인증된 연결에는 먼저 `AUTHENTICATED`를 보낸다.
pub fn handle_connection(
    state: &AppState,
    room_id: &str,
    pin: Option<&str>,
    sender: UnboundedSender<ServerMessage>,
) -> Result<Session, JoinError> {
    let Admission {
        room,
        authenticated,
    } = state.rooms.admit(room_id, pin)?;
    let member_id = Uuid::new_v4();

    if authenticated {
        let _ = sender.send(ServerMessage::Authenticated);
    }
    room.join(member_id, sender);

    tracing::info!(
        member_id = %member_id,
        room_id = %room.id(),
        authenticated,
        "New connection established"
    );

    Ok(Session {
        member_id,
        room,
        authenticated,
    })
}

/// 연결 해제 처리
pub fn handle_disconnect(session: &Session) {
    session.room.leave(session.member_id);
    tracing::info!(
        member_id = %session.member_id,
        room_id = %session.room.id(),
        "Connection closed"
    );
}
