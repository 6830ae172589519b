//! 샷클락 상태 머신
//!
//! 모든 연산은 호출 시점(`now`)을 인자로 받는 동기 함수이며, 방 태스크 하나가
//! 엔진을 독점 소유하므로 내부 잠금이 필요 없다.
//!
//! 남은 시간은 고정 간격으로 감소시키지 않는다. 상태가 바뀔 때마다
//! `last_event` 이후 실제 경과 시간을 빼서 재계산하므로 타이머 지연이 누적되지 않는다.

use crate::config::RoomConfig;
use crate::protocol::{ClientCommand, ServerMessage};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use uuid::Uuid;

use super::timer::{TimerKind, TimerSlot};

/// 틱은 남은 시간의 초 경계에 맞춰 발화한다.
const TICK_ALIGNMENT_MS: u64 = 1000;

/// 이 값 이하에서는 만료 신호와 혼동되지 않도록 혼을 울리지 않는다.
pub const HORN_THRESHOLD_MS: u64 = 2000;

/// 수동 보정으로 늘릴 수 있는 남은 시간의 상한 (24시간)
pub const MAX_REMAINING_MS: u64 = 24 * 60 * 60 * 1000;

pub type MemberId = Uuid;
pub type MemberSender = UnboundedSender<ServerMessage>;

pub struct RoomEngine {
    room_id: String,
    running: bool,
    remaining_ms: u64,
    initial_duration_ms: u64,
    /// `remaining_ms`가 마지막으로 정확했던 시점
    last_event: Instant,
    remaining_at_last_reset: Option<u64>,
    game_time: u64,
    members: HashMap<MemberId, MemberSender>,
    timer: TimerSlot,
    keepalive_interval: Duration,
}

impl RoomEngine {
    pub fn new(room_id: impl Into<String>, config: &RoomConfig, now: Instant) -> Self {
        let initial_duration_ms = duration_ms(config.initial_duration);
        Self {
            room_id: room_id.into(),
            running: false,
            remaining_ms: initial_duration_ms,
            initial_duration_ms,
            last_event: now,
            remaining_at_last_reset: None,
            game_time: 0,
            members: HashMap::new(),
            timer: TimerSlot::default(),
            // 0 간격은 keep-alive가 제자리에서 계속 재발화한다
            keepalive_interval: config
                .keepalive_interval
                .max(Duration::from_millis(TICK_ALIGNMENT_MS)),
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    #[cfg(test)]
    pub fn remaining_at_last_reset(&self) -> Option<u64> {
        self.remaining_at_last_reset
    }

    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[cfg(test)]
    pub fn timer_kind(&self) -> Option<TimerKind> {
        self.timer.kind()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// `now` 시점의 실제 남은 시간 (상태는 변경하지 않음)
    pub fn projected_remaining_ms(&self, now: Instant) -> u64 {
        if self.running {
            let elapsed = duration_ms(now.saturating_duration_since(self.last_event));
            self.remaining_ms.saturating_sub(elapsed)
        } else {
            self.remaining_ms
        }
    }

    // ----- membership -----

    /// 멤버 추가 후 현재 상태 스냅샷을 즉시 전송
    pub fn join_client(&mut self, member_id: MemberId, sender: MemberSender, now: Instant) {
        let snapshot = [
            ServerMessage::Running {
                running: self.running,
            },
            ServerMessage::time(self.game_time, self.projected_remaining_ms(now)),
        ];
        for message in snapshot {
            if sender.send(message).is_err() {
                tracing::warn!(room_id = %self.room_id, member_id = %member_id, "Failed to send snapshot");
            }
        }

        self.members.insert(member_id, sender);
        if !self.running && self.timer.kind().is_none() {
            self.arm_keepalive(now);
        }

        tracing::info!(
            room_id = %self.room_id,
            member_id = %member_id,
            members = self.members.len(),
            "Member joined"
        );
    }

    /// 마지막 멤버가 나가면 시계를 멈추고 타이머를 모두 해제한다.
    pub fn disconnect_client(&mut self, member_id: MemberId, now: Instant) {
        if self.members.remove(&member_id).is_none() {
            return;
        }

        tracing::info!(
            room_id = %self.room_id,
            member_id = %member_id,
            members = self.members.len(),
            "Member left"
        );

        if self.members.is_empty() {
            self.pause(now);
            self.timer.cancel();
        }
    }

    // ----- clock operations -----

    pub fn apply(&mut self, command: ClientCommand, now: Instant) {
        match command {
            ClientCommand::Start => self.start(now),
            ClientCommand::Pause => self.pause(now),
            ClientCommand::Reset => self.reset(now),
            ClientCommand::Horn => self.horn(now),
            ClientCommand::Rewind => self.rewind_to_last_reset(now),
            ClientCommand::Adjust { delta_seconds } => self.adjust_time(delta_seconds, now),
        }
    }

    /// 남은 시간이 0이어도 시작할 수 있다. 이 경우 다음 틱에서 바로 만료된다.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_event = now;
        self.schedule_tick(now);
        self.broadcast_running();

        tracing::info!(room_id = %self.room_id, remaining_ms = self.remaining_ms, "Clock started");
    }

    pub fn pause(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        self.correct_for_elapsed(now);
        self.timer.cancel();
        self.running = false;
        self.last_event = now;
        self.broadcast_running();
        self.broadcast_time();
        self.arm_keepalive(now);

        tracing::info!(room_id = %self.room_id, remaining_ms = self.remaining_ms, "Clock paused");
    }

    /// 만료 후(정확히 0) 리셋하면 자동으로 다시 시작한다.
    pub fn reset(&mut self, now: Instant) {
        self.correct_for_elapsed(now);
        let corrected = self.remaining_ms;
        self.remaining_at_last_reset = Some(corrected);
        self.remaining_ms = self.initial_duration_ms;
        self.broadcast_time();

        if corrected == 0 && !self.running {
            self.start(now);
        } else if self.running {
            self.schedule_tick(now);
        }
        self.last_event = now;

        tracing::info!(room_id = %self.room_id, previous_ms = corrected, "Clock reset");
    }

    pub fn rewind_to_last_reset(&mut self, now: Instant) {
        let Some(snapshot) = self.remaining_at_last_reset else {
            return;
        };
        self.remaining_ms = snapshot;
        self.broadcast_time();
        if self.running {
            self.schedule_tick(now);
        }
        self.last_event = now;

        tracing::info!(room_id = %self.room_id, remaining_ms = snapshot, "Clock rewound to last reset");
    }

    /// 수동 보정. 결과는 `0..=MAX_REMAINING_MS` 범위로 제한된다.
    pub fn adjust_time(&mut self, delta_seconds: i64, now: Instant) {
        self.correct_for_elapsed(now);
        let delta_ms = delta_seconds.saturating_mul(1000);
        self.remaining_ms = if delta_ms >= 0 {
            self.remaining_ms
                .saturating_add(delta_ms.unsigned_abs())
                .min(MAX_REMAINING_MS)
        } else {
            self.remaining_ms.saturating_sub(delta_ms.unsigned_abs())
        };
        self.broadcast_time();
        if self.running {
            self.schedule_tick(now);
        }
        self.last_event = now;

        tracing::info!(
            room_id = %self.room_id,
            delta_seconds,
            remaining_ms = self.remaining_ms,
            "Clock adjusted"
        );
    }

    pub fn horn(&self, now: Instant) {
        if self.projected_remaining_ms(now) > HORN_THRESHOLD_MS {
            self.broadcast(ServerMessage::Horn);
        } else {
            tracing::debug!(room_id = %self.room_id, "Horn suppressed near expiry");
        }
    }

    // ----- timers -----

    /// 방 태스크가 타이머 데드라인에 도달했을 때 호출
    pub fn on_timer(&mut self, now: Instant) {
        match self.timer.take_due(now) {
            Some(TimerKind::Tick) => self.tick(now),
            Some(TimerKind::KeepAlive) => self.keep_alive(now),
            None => {}
        }
    }

    fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        self.correct_for_elapsed(now);
        if self.remaining_ms == 0 {
            self.running = false;
            self.broadcast_running();
            tracing::info!(room_id = %self.room_id, "Clock expired");
        }
        self.broadcast_time();
        self.last_event = now;

        if self.running {
            self.schedule_tick(now);
        } else {
            self.arm_keepalive(now);
        }
    }

    fn keep_alive(&mut self, now: Instant) {
        if self.running {
            return;
        }
        tracing::trace!(room_id = %self.room_id, "Keep-alive resync");
        self.broadcast_time();
        self.arm_keepalive(now);
    }

    fn schedule_tick(&mut self, now: Instant) {
        let delay = match self.remaining_ms % TICK_ALIGNMENT_MS {
            0 => TICK_ALIGNMENT_MS,
            partial => partial,
        };
        self.timer.arm(TimerKind::Tick, now + Duration::from_millis(delay));
        tracing::trace!(room_id = %self.room_id, delay_ms = delay, "Tick scheduled");
    }

    fn arm_keepalive(&mut self, now: Instant) {
        if !self.members.is_empty() {
            self.timer.arm(TimerKind::KeepAlive, now + self.keepalive_interval);
        }
    }

    fn correct_for_elapsed(&mut self, now: Instant) {
        self.remaining_ms = self.projected_remaining_ms(now);
    }

    // ----- broadcast -----

    fn broadcast_running(&self) {
        self.broadcast(ServerMessage::Running {
            running: self.running,
        });
    }

    fn broadcast_time(&self) {
        self.broadcast(ServerMessage::time(self.game_time, self.remaining_ms));
    }

    /// 전송 실패한 멤버는 건너뛴다. 정리는 연결 종료 이벤트가 담당한다.
    fn broadcast(&self, message: ServerMessage) {
        for (member_id, sender) in &self.members {
            if sender.send(message.clone()).is_err() {
                tracing::warn!(
                    room_id = %self.room_id,
                    member_id = %member_id,
                    "Failed to deliver {}",
                    message
                );
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
