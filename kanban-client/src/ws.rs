/// Push-update WebSocket listener.
///
/// Subscribes to the per-board topic and the global boards topic and
/// routes decoded updates into the session. The connection reconnects
/// with a fixed delay and answers pings; malformed frames are logged and
/// discarded — nothing on this path is allowed to throw into the update
/// pipeline.
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use kanban_core::events::BoardUpdate;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::session::BoardSession;

pub struct UpdateListener {
    tasks: Vec<JoinHandle<()>>,
}

impl UpdateListener {
    /// Spawn listener tasks for the session's board. One connection per
    /// topic; both feed the same session.
    pub fn spawn(config: ClientConfig, session: Arc<BoardSession>) -> Self {
        let client_id = Uuid::new_v4();
        let tasks = topic_urls(&config.ws_url, session.board_id())
            .into_iter()
            .map(|url| {
                let config = config.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    run_topic_listener(url, client_id, config, session).await;
                })
            })
            .collect();
        Self { tasks }
    }

    /// Subscription teardown: stop routing further updates. Outstanding
    /// HTTP requests are not cancelled; their completions no-op on the
    /// session's board-id guard.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn topic_urls(ws_url: &str, board_id: i64) -> [String; 2] {
    let base = ws_url.trim_end_matches('/');
    [
        format!("{base}/topic/board/{board_id}"),
        format!("{base}/topic/boards"),
    ]
}

async fn run_topic_listener(
    url: String,
    client_id: Uuid,
    config: ClientConfig,
    session: Arc<BoardSession>,
) {
    loop {
        match connect_and_listen(&url, client_id, &config, &session).await {
            Ok(()) => log::info!("[kanban.ws] Connection to {url} closed"),
            Err(e) => log::warn!("[kanban.ws] Connection to {url} failed: {e}"),
        }
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}

async fn connect_and_listen(
    url: &str,
    client_id: Uuid,
    config: &ClientConfig,
    session: &BoardSession,
) -> Result<(), String> {
    let connect_url = format!("{url}?client={client_id}");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&connect_url)
        .await
        .map_err(|e| format!("connect failed: {e}"))?;

    log::info!("[kanban.ws] Subscribed to {url}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval());

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(msg) = msg else { break };
                let msg = msg.map_err(|e| format!("read error: {e}"))?;
                match msg {
                    Message::Text(text) => handle_frame(session, &text).await,
                    Message::Ping(data) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

async fn handle_frame(session: &BoardSession, text: &str) {
    match serde_json::from_str::<BoardUpdate>(text) {
        Ok(update) => session.handle_update(update).await,
        Err(e) => log::warn!("[kanban.ws] Malformed push frame, discarding: {e}"),
    }
}
