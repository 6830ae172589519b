//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_KEEPALIVE_MS: u64 = 60_000;
/// keep-alive 주기 상한 (1시간)
const MAX_KEEPALIVE_MS: u64 = 60 * 60 * 1000;
/// 샷클락 길이 상한 (24시간)
const MAX_SHOTCLOCK_SECS: u64 = 24 * 60 * 60;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub room: RoomConfig,
    pub log_level: String,
}

/// 방(샷클락) 설정
///
/// 모든 방에 동일하게 적용되는 정책 값이다.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 리셋 시 복원되는 샷클락 길이
    pub initial_duration: Duration,
    /// 일시정지 상태에서 남은 시간을 재전송하는 주기
    pub keepalive_interval: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            initial_duration: Duration::from_secs(30),
            keepalive_interval: Duration::from_millis(DEFAULT_KEEPALIVE_MS),
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env_or("PORT", 8080),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            room: RoomConfig {
                initial_duration: Duration::from_secs(
                    env_or("SHOTCLOCK_SECONDS", 30u64).min(MAX_SHOTCLOCK_SECS),
                ),
                keepalive_interval: keepalive_interval(
                    env::var("KEEPALIVE_INTERVAL_MS").ok().as_deref(),
                ),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(env::var(key).ok().as_deref(), default)
}

/// 0은 타이머가 즉시 재발화하므로 기본값으로 대체하고, 너무 큰 값은 상한으로 자른다.
fn keepalive_interval(raw: Option<&str>) -> Duration {
    let ms = match parse_or(raw, DEFAULT_KEEPALIVE_MS) {
        0 => DEFAULT_KEEPALIVE_MS,
        ms => ms.min(MAX_KEEPALIVE_MS),
    };
    Duration::from_millis(ms)
}

/// 값이 없거나 파싱에 실패하면 기본값을 사용한다.
fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
