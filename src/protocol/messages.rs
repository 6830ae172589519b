//! 클라이언트-서버 메시지 프로토콜 정의
//!
//! 와이어 포맷은 JSON이 아닌 세미콜론으로 구분된 짧은 텍스트 프레임이다.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    // Admission
    Authenticated,
    WrongPin,
    RoomNotFound,

    // Clock
    /// `r;1` / `r;0`
    Running { running: bool },
    /// `t;<game_time>;<remaining_seconds>`
    Time {
        game_time: u64,
        remaining_seconds: u64,
    },
    Horn,
}

impl ServerMessage {
    /// 밀리초 단위 남은 시간을 반올림된 초로 변환한 시간 메시지
    pub fn time(game_time: u64, remaining_ms: u64) -> Self {
        Self::Time {
            game_time,
            remaining_seconds: round_to_seconds(remaining_ms),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Authenticated => f.write_str("AUTHENTICATED"),
            ServerMessage::WrongPin => f.write_str("WRONG_PIN"),
            ServerMessage::RoomNotFound => f.write_str("ROOM_NOT_FOUND"),
            ServerMessage::Running { running } => write!(f, "r;{}", u8::from(*running)),
            ServerMessage::Time {
                game_time,
                remaining_seconds,
            } => write!(f, "t;{};{}", game_time, remaining_seconds),
            ServerMessage::Horn => f.write_str("HORN"),
        }
    }
}

/// 0.5초는 올림 처리한다.
pub fn round_to_seconds(ms: u64) -> u64 {
    ms / 1000 + u64::from(ms % 1000 >= 500)
}

/// 클라이언트 → 서버 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Start,
    Pause,
    Reset,
    Horn,
    Rewind,
    Adjust { delta_seconds: i64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("invalid adjust delta: {0:?}")]
    InvalidDelta(String),
}

impl FromStr for ClientCommand {
    type Err = ParseCommandError;

    /// 프레임 전체가 토큰과 정확히 일치해야 한다. 공백이나 개행은 허용하지 않는다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ClientCommand::Start),
            "pause" => Ok(ClientCommand::Pause),
            "reset" => Ok(ClientCommand::Reset),
            "horn" => Ok(ClientCommand::Horn),
            "rewind" => Ok(ClientCommand::Rewind),
            _ => match s.split_once(';') {
                Some(("adjust", delta)) => delta
                    .parse()
                    .map(|delta_seconds| ClientCommand::Adjust { delta_seconds })
                    .map_err(|_| ParseCommandError::InvalidDelta(delta.to_string())),
                _ => Err(ParseCommandError::Unknown(s.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_render_wire_frames() {
        assert_eq!(ServerMessage::Running { running: true }.to_string(), "r;1");
        assert_eq!(ServerMessage::Running { running: false }.to_string(), "r;0");
        assert_eq!(ServerMessage::time(0, 29_000).to_string(), "t;0;29");
        assert_eq!(ServerMessage::Horn.to_string(), "HORN");
        assert_eq!(ServerMessage::WrongPin.to_string(), "WRONG_PIN");
        assert_eq!(ServerMessage::RoomNotFound.to_string(), "ROOM_NOT_FOUND");
        assert_eq!(ServerMessage::Authenticated.to_string(), "AUTHENTICATED");
    }

    #[test]
    fn remaining_seconds_are_rounded() {
        assert_eq!(round_to_seconds(0), 0);
        assert_eq!(round_to_seconds(499), 0);
        assert_eq!(round_to_seconds(500), 1);
        assert_eq!(round_to_seconds(29_499), 29);
        assert_eq!(round_to_seconds(29_500), 30);
    }

    #[test]
    fn rounding_does_not_overflow_near_max() {
        assert_eq!(round_to_seconds(u64::MAX), u64::MAX / 1000 + 1);
        assert_eq!(round_to_seconds(u64::MAX - 615), u64::MAX / 1000);
    }

    #[test]
    fn parses_core_commands() {
        assert_eq!("start".parse(), Ok(ClientCommand::Start));
        assert_eq!("pause".parse(), Ok(ClientCommand::Pause));
        assert_eq!("reset".parse(), Ok(ClientCommand::Reset));
        assert_eq!("horn".parse(), Ok(ClientCommand::Horn));
        assert_eq!("rewind".parse(), Ok(ClientCommand::Rewind));
    }

    #[test]
    fn parses_adjust_with_signed_delta() {
        assert_eq!(
            "adjust;-5".parse(),
            Ok(ClientCommand::Adjust { delta_seconds: -5 })
        );
        assert_eq!(
            "adjust;10".parse(),
            Ok(ClientCommand::Adjust { delta_seconds: 10 })
        );
        assert_eq!(
            "adjust; 10".parse::<ClientCommand>(),
            Err(ParseCommandError::InvalidDelta(" 10".to_string()))
        );
        assert_eq!(
            "adjust;ten".parse::<ClientCommand>(),
            Err(ParseCommandError::InvalidDelta("ten".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(matches!(
            "START".parse::<ClientCommand>(),
            Err(ParseCommandError::Unknown(_))
        ));
        assert!(matches!(
            "".parse::<ClientCommand>(),
            Err(ParseCommandError::Unknown(_))
        ));
    }

    #[test]
    fn padded_tokens_are_not_commands() {
        for frame in [" start", "start\n", "pause ", "\treset"] {
            assert_eq!(
                frame.parse::<ClientCommand>(),
                Err(ParseCommandError::Unknown(frame.to_string())),
                "frame {:?}",
                frame
            );
        }
    }
}
