//! 방마다 하나만 존재하는 취소 가능한 타이머 슬롯
//!
//! 새 타이머를 걸면 기존 타이머는 덮어써지므로, 교체된 데드라인은 절대 발화하지 않는다.

use tokio::time::{sleep_until, Instant};

/// 슬롯에 걸린 타이머의 용도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// 실행 중: 다음 초 경계에서 남은 시간을 재계산
    Tick,
    /// 정지 중: 남은 시간 재전송
    KeepAlive,
}

#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<(TimerKind, Instant)>,
}

impl TimerSlot {
    /// 기존 타이머를 취소하고 새 타이머를 건다.
    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        self.armed = Some((kind, deadline));
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.map(|(kind, _)| kind)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    /// 데드라인이 지났다면 슬롯을 비우고 타이머 종류를 반환
    pub fn take_due(&mut self, now: Instant) -> Option<TimerKind> {
        match self.armed {
            Some((kind, deadline)) if deadline <= now => {
                self.armed = None;
                Some(kind)
            }
            _ => None,
        }
    }
}

/// 데드라인까지 대기. 데드라인이 없으면 영원히 대기한다.
pub async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn arm_replaces_previous_timer() {
        let now = Instant::now();
        let mut slot = TimerSlot::default();

        slot.arm(TimerKind::KeepAlive, now + Duration::from_secs(60));
        slot.arm(TimerKind::Tick, now + Duration::from_millis(400));

        assert_eq!(slot.kind(), Some(TimerKind::Tick));
        assert_eq!(slot.deadline(), Some(now + Duration::from_millis(400)));
    }

    #[test]
    fn take_due_ignores_future_deadline() {
        let now = Instant::now();
        let mut slot = TimerSlot::default();
        slot.arm(TimerKind::Tick, now + Duration::from_millis(1000));

        assert_eq!(slot.take_due(now + Duration::from_millis(999)), None);
        assert_eq!(slot.kind(), Some(TimerKind::Tick));

        assert_eq!(
            slot.take_due(now + Duration::from_millis(1000)),
            Some(TimerKind::Tick)
        );
        assert_eq!(slot.kind(), None);
    }

    #[test]
    fn cancelled_slot_never_fires() {
        let now = Instant::now();
        let mut slot = TimerSlot::default();
        slot.arm(TimerKind::Tick, now);
        slot.cancel();

        assert_eq!(slot.take_due(now + Duration::from_secs(10)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_waits_for_deadline() {
        let start = Instant::now();
        expired(Some(start + Duration::from_millis(750))).await;
        assert!(Instant::now() >= start + Duration::from_millis(750));
    }
}
