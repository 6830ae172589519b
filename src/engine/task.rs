//! 방 태스크
//!
//! 방마다 하나의 tokio 태스크가 엔진을 독점 소유한다. 멤버 이벤트와 명령은
//! 도착 순서대로 처리되고, 타이머 슬롯도 같은 `select!` 루프에서 대기하므로
//! 명령과 틱이 서로 끼어들 수 없다.

use crate::protocol::ClientCommand;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use super::room::{MemberId, MemberSender, RoomEngine};
use super::timer;

/// 방 태스크로 전달되는 이벤트
#[derive(Debug)]
pub enum RoomEvent {
    Join {
        member_id: MemberId,
        sender: MemberSender,
    },
    Leave {
        member_id: MemberId,
    },
    Command(ClientCommand),
}

/// 엔진을 소유하는 방 태스크를 띄우고 이벤트 송신 채널을 반환
pub fn spawn_room(engine: RoomEngine) -> UnboundedSender<RoomEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_room(engine, rx));
    tx
}

async fn run_room(mut engine: RoomEngine, mut events: UnboundedReceiver<RoomEvent>) {
    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_event(&mut engine, event, Instant::now()),
                None => break,
            },
            _ = timer::expired(deadline) => engine.on_timer(Instant::now()),
        }
    }
    tracing::debug!("Room task stopped");
}

fn handle_event(engine: &mut RoomEngine, event: RoomEvent, now: Instant) {
    match event {
        RoomEvent::Join { member_id, sender } => engine.join_client(member_id, sender, now),
        RoomEvent::Leave { member_id } => engine.disconnect_client(member_id, now),
        RoomEvent::Command(command) => {
            tracing::debug!(?command, "Applying command");
            engine.apply(command, now);
        }
    }
}
