//! 애플리케이션 상태 관리

use crate::config::{Config, RoomConfig};
use crate::engine::{spawn_room, MemberId, MemberSender, RoomEngine, RoomEvent};
use crate::protocol::{ClientCommand, ServerMessage};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 레지스트리 (room_id -> RoomHandle)
    pub rooms: RoomRegistry,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomRegistry::new(config.room.clone()),
            config: Arc::new(config),
        }
    }
}

/// 입장 거부 사유
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room not found")]
    RoomNotFound,
    #[error("wrong pin")]
    WrongPin,
}

impl JoinError {
    /// 연결을 닫기 전에 보내는 응답
    pub fn message(&self) -> ServerMessage {
        match self {
            JoinError::RoomNotFound => ServerMessage::RoomNotFound,
            JoinError::WrongPin => ServerMessage::WrongPin,
        }
    }
}

/// 입장 결과
pub struct Admission {
    pub room: RoomHandle,
    /// false면 명령을 보낼 수 없는 관람자
    pub authenticated: bool,
}

/// 방 레지스트리
///
/// 방은 PIN과 함께 처음 접속할 때 생성되고 프로세스가 끝날 때까지 유지된다.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    room_config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(room_config: RoomConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            room_config,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// 방 조회 또는 생성 후 PIN 검증
    pub fn admit(&self, room_id: &str, pin: Option<&str>) -> Result<Admission, JoinError> {
        let room_id = room_id.trim_start_matches('/');

        let room = match pin {
            Some(pin) => self
                .rooms
                .entry(room_id.to_string())
                .or_insert_with(|| {
                    tracing::info!(room_id = %room_id, "Room created");
                    RoomHandle::spawn(room_id, pin, &self.room_config)
                })
                .clone(),
            None => self
                .rooms
                .get(room_id)
                .map(|room| room.clone())
                .ok_or(JoinError::RoomNotFound)?,
        };

        match pin {
            Some(pin) if !room.check_secret(pin) => {
                tracing::warn!(room_id = %room_id, "Unsuccessful authentication, wrong PIN");
                Err(JoinError::WrongPin)
            }
            Some(_) => Ok(Admission {
                room,
                authenticated: true,
            }),
            None => Ok(Admission {
                room,
                authenticated: false,
            }),
        }
    }
}

/// 방 태스크에 이벤트를 보내는 핸들
#[derive(Clone)]
pub struct RoomHandle {
    id: String,
    secret: String,
    events: UnboundedSender<RoomEvent>,
}

impl RoomHandle {
    fn spawn(id: &str, secret: &str, config: &RoomConfig) -> Self {
        let engine = RoomEngine::new(id, config, Instant::now());
        Self {
            id: id.to_string(),
            secret: secret.to_string(),
            events: spawn_room(engine),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 평문 비교
    pub fn check_secret(&self, candidate: &str) -> bool {
        self.secret == candidate
    }

    pub fn join(&self, member_id: MemberId, sender: MemberSender) {
        self.send(RoomEvent::Join { member_id, sender });
    }

    pub fn leave(&self, member_id: MemberId) {
        self.send(RoomEvent::Leave { member_id });
    }

    pub fn command(&self, command: ClientCommand) {
        self.send(RoomEvent::Command(command));
    }

    fn send(&self, event: RoomEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!(room_id = %self.id, "Room task is gone, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomConfig::default())
    }

    #[tokio::test]
    async fn unknown_room_without_pin_is_rejected() {
        let rooms = registry();

        let result = rooms.admit("court-1", None);

        assert!(matches!(result, Err(JoinError::RoomNotFound)));
        assert_eq!(rooms.len(), 0);
    }

    #[tokio::test]
    async fn first_contact_with_pin_creates_room() {
        let rooms = registry();

        let admission = rooms.admit("/court-1", Some("1234")).unwrap();

        assert!(admission.authenticated);
        assert_eq!(admission.room.id(), "court-1");
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn existing_room_checks_pin() {
        let rooms = registry();
        rooms.admit("court-1", Some("1234")).unwrap();

        assert!(rooms.admit("court-1", Some("1234")).unwrap().authenticated);
        assert!(matches!(
            rooms.admit("court-1", Some("4321")),
            Err(JoinError::WrongPin)
        ));
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn existing_room_without_pin_admits_viewer() {
        let rooms = registry();
        rooms.admit("court-1", Some("1234")).unwrap();

        let admission = rooms.admit("court-1", None).unwrap();

        assert!(!admission.authenticated);
    }

    #[tokio::test]
    async fn secret_comparison_is_exact() {
        let rooms = registry();
        let room = rooms.admit("court-1", Some("1234")).unwrap().room;

        assert!(room.check_secret("1234"));
        assert!(!room.check_secret("1234 "));
        assert!(!room.check_secret(""));
    }

    #[test]
    fn join_errors_map_to_wire_tokens() {
        assert_eq!(JoinError::RoomNotFound.message().to_string(), "ROOM_NOT_FOUND");
        assert_eq!(JoinError::WrongPin.message().to_string(), "WRONG_PIN");
    }
}
