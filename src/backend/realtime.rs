// src/backend/realtime.rs
//
// Row-change push channels from the hosted realtime service. One WebSocket per
// channel, Phoenix-style JSON frames. No reconnect: a dropped socket is logged
// and the channel simply ends.

use std::sync::Once;
use std::time::Duration;

use awc::ws;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::BackendError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_REF: &str = "1";
const PROTOCOL_VERSION: &str = "1.0.0";

static CRYPTO_PROVIDER: Once = Once::new();

/// Installs the process-wide rustls provider the `wss://` connector needs.
/// Safe to call repeatedly; a provider installed elsewhere is kept.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            log::debug!("rustls crypto provider already installed");
        }
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel name without the `realtime:` prefix, e.g. `profile-<id>`.
    pub name: String,
    pub table: String,
    /// Row filter such as `id=eq.<id>`.
    pub filter: String,
}

impl ChannelSpec {
    pub fn topic(&self) -> String {
        format!("realtime:{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub topic: String,
    pub table: String,
    pub kind: ChangeKind,
    /// The row after the change (empty object for deletes).
    pub record: Value,
}

#[derive(Debug, PartialEq)]
pub enum IncomingFrame {
    Change(ChangeEvent),
    JoinReply { ok: bool, response: Value },
    Other,
}

pub fn join_message(spec: &ChannelSpec, access_token: &str) -> String {
    json!({
        "topic": spec.topic(),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": spec.table,
                    "filter": spec.filter,
                }],
            },
            "access_token": access_token,
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
    .to_string()
}

pub fn heartbeat_message(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

pub fn parse_frame(text: &str) -> IncomingFrame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return IncomingFrame::Other;
    };
    let topic = value["topic"].as_str().unwrap_or_default().to_string();

    match value["event"].as_str() {
        Some("postgres_changes") => {
            let data = &value["payload"]["data"];
            let kind = match data["type"].as_str().or_else(|| data["eventType"].as_str()) {
                Some("INSERT") => ChangeKind::Insert,
                Some("UPDATE") => ChangeKind::Update,
                Some("DELETE") => ChangeKind::Delete,
                _ => ChangeKind::Other,
            };
            let record = data
                .get("record")
                .or_else(|| data.get("new"))
                .cloned()
                .unwrap_or_else(|| json!({}));
            IncomingFrame::Change(ChangeEvent {
                topic,
                table: data["table"].as_str().unwrap_or_default().to_string(),
                kind,
                record,
            })
        }
        Some("phx_reply") if value["ref"].as_str() == Some(JOIN_REF) => IncomingFrame::JoinReply {
            ok: value["payload"]["status"].as_str() == Some("ok"),
            response: value["payload"]["response"].clone(),
        },
        _ => IncomingFrame::Other,
    }
}

/// `credits` of a balance-row change when it is an integer.
pub fn balance_from_change(event: &ChangeEvent) -> Option<i64> {
    event.record.get("credits").and_then(Value::as_i64)
}

/// Open channel; dropping it closes the socket.
pub struct RealtimeChannel {
    pub topic: String,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.task.abort();
        log::info!("realtime channel closed topic={}", self.topic);
    }
}

#[derive(Clone)]
pub struct RealtimeClient {
    socket_url: String,
}

impl RealtimeClient {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        install_crypto_provider();
        let ws_base = if let Some(rest) = supabase_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = supabase_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            supabase_url.to_string()
        };
        let query = serde_urlencoded::to_string([("apikey", anon_key), ("vsn", PROTOCOL_VERSION)])
            .unwrap_or_else(|e| {
                log::error!("error encoding realtime query: {e}");
                format!("vsn={PROTOCOL_VERSION}")
            });
        Self {
            socket_url: format!("{ws_base}/realtime/v1/websocket?{query}"),
        }
    }

    /// Must run inside the actix runtime: the socket task is thread-local.
    pub fn subscribe(&self, spec: ChannelSpec, access_token: &str) -> RealtimeChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let topic = spec.topic();
        let url = self.socket_url.clone();
        let token = access_token.to_string();

        let task = actix_web::rt::spawn(async move {
            let topic = spec.topic();
            match run_channel(&url, &spec, &token, tx).await {
                Ok(()) => log::info!("realtime channel ended topic={topic}"),
                Err(e) => log::error!("realtime channel failed topic={topic}: {e}"),
            }
        });

        RealtimeChannel {
            topic,
            events: rx,
            task,
        }
    }
}

async fn run_channel(
    url: &str,
    spec: &ChannelSpec,
    access_token: &str,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) -> Result<(), BackendError> {
    let (_resp, mut socket) = awc::Client::new()
        .ws(url)
        .connect()
        .await
        .map_err(|e| BackendError::Realtime(e.to_string()))?;

    socket
        .send(ws::Message::Text(join_message(spec, access_token).into()))
        .await
        .map_err(|e| BackendError::Realtime(e.to_string()))?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                socket
                    .send(ws::Message::Text(heartbeat_message(next_ref).into()))
                    .await
                    .map_err(|e| BackendError::Realtime(e.to_string()))?;
                next_ref += 1;
            }
            frame = socket.next() => match frame {
                Some(Ok(ws::Frame::Text(bytes))) => {
                    let Ok(text) = std::str::from_utf8(&bytes) else {
                        continue;
                    };
                    match parse_frame(text) {
                        IncomingFrame::Change(event) => {
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                        IncomingFrame::JoinReply { ok: true, .. } => {
                            log::info!("realtime subscribed topic={}", spec.topic());
                        }
                        IncomingFrame::JoinReply { ok: false, response } => {
                            log::error!(
                                "realtime join rejected topic={} response={}",
                                spec.topic(),
                                response
                            );
                        }
                        IncomingFrame::Other => {}
                    }
                }
                Some(Ok(ws::Frame::Ping(payload))) => {
                    socket
                        .send(ws::Message::Pong(payload))
                        .await
                        .map_err(|e| BackendError::Realtime(e.to_string()))?;
                }
                Some(Ok(ws::Frame::Close(reason))) => {
                    log::warn!("realtime socket closed topic={} reason={:?}", spec.topic(), reason);
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(BackendError::Realtime(e.to_string())),
                None => return Ok(()),
            }
        }
    }
}
