//! 클라이언트-서버 텍스트 프로토콜

pub mod messages;

pub use messages::*;
