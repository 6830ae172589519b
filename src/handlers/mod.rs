//! 핸들러 모듈

pub mod command;
pub mod connection;

pub use command::*;
pub use connection::*;
