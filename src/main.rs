//! 샷클락 동기화 서버

mod config;
mod engine;
mod handlers;
mod protocol;
mod state;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use protocol::ServerMessage;
use serde::Deserialize;
use state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// WebSocket 접속 쿼리 (`/{room_id}?pin=...`)
#[derive(Debug, Deserialize)]
struct ConnectQuery {
    pin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));

    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/:room_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Shotclock server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/<room>?pin=<pin>", addr);
    tracing::info!(
        shotclock_secs = config.room.initial_duration.as_secs(),
        "Room policy loaded"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Shotclock Server</h1><p>WebSocket endpoint: /&lt;room&gt;?pin=&lt;pin&gt;</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "shotclock-server",
        "rooms": state.rooms.len(),
        "shotclock_seconds": state.config.room.initial_duration.as_secs(),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, query.pin))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: String,
    pin: Option<String>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 입장 처리
    let session = match handlers::handle_connection(&state, &room_id, pin.as_deref(), tx) {
        Ok(session) => session,
        Err(e) => {
            tracing::info!(room_id = %room_id, error = %e, "Connection rejected");
            let _ = ws_sender.send(Message::Text(e.message().to_string())).await;
            let _ = ws_sender.send(Message::Close(None)).await;
            return;
        }
    };

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.to_string())).await.is_err() {
                break;
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => handlers::handle_command(&session, &text),
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(&session);
    send_task.abort();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::RoomConfig;

    #[tokio::test]
    async fn health_reports_rooms_and_shot_clock_policy() {
        let state = Arc::new(AppState::new(Config {
            port: 0,
            host: "127.0.0.1".to_string(),
            room: RoomConfig::default(),
            log_level: "info".to_string(),
        }));
        state.rooms.admit("court-1", Some("1234")).unwrap();

        let Json(body) = health_handler(State(state)).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["server"], "shotclock-server");
        assert_eq!(body["rooms"], 1);
        assert_eq!(body["shotclock_seconds"], 30);
        assert!(body["timestamp"].as_u64().is_some());
    }
}
