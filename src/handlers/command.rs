//! 클라이언트 명령 핸들러

use crate::protocol::ClientCommand;

use super::connection::Session;

/// 인증된 멤버의 텍스트 프레임을 방 명령으로 전달
///
/// 관람자 프레임과 알 수 없는 토큰은 무시한다.
pub fn handle_command(session: &Session, text: &str) {
    if !session.authenticated {
        tracing::debug!(member_id = %session.member_id, "Ignoring frame from viewer");
        return;
    }

    match text.parse::<ClientCommand>() {
        Ok(command) => session.room.command(command),
        Err(e) => tracing::debug!(member_id = %session.member_id, error = %e, "Ignoring frame"),
    }
}
