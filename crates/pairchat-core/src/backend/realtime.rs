//! Realtime websocket channel for message inserts
//!
//! The hosted service fans out row changes over a phoenix-style websocket:
//! the client joins a topic for the messages table, keeps the socket alive
//! with periodic heartbeats, and receives one frame per inserted row,
//! table-wide and unfiltered. Frames that fail to decode are logged and
//! dropped; the channel is best-effort delivery.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

use super::InsertSubscription;
use crate::error::{ChatError, ChatResult};

/// Topic carrying inserts for the messages table
const MESSAGES_TOPIC: &str = "realtime:public:messages";

/// Keepalive period expected by the service
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Buffered insert records before backpressure on the socket task
const EVENT_BUFFER: usize = 256;

/// Client for the service's realtime websocket.
#[derive(Debug)]
pub struct RealtimeClient;

/// Join frame subscribing to INSERT events on the messages table.
fn join_frame(access_token: &str) -> Value {
    json!({
        "topic": MESSAGES_TOPIC,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "INSERT", "schema": "public", "table": "messages" }
                ]
            },
            "access_token": access_token,
        },
        "ref": "1",
    })
}

/// Keepalive frame on the control topic.
fn heartbeat_frame(reference: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
}

/// Leave frame ending the topic subscription.
fn leave_frame() -> Value {
    json!({
        "topic": MESSAGES_TOPIC,
        "event": "phx_leave",
        "payload": {},
        "ref": "leave",
    })
}

/// Extract the inserted record from a realtime frame, if it carries one.
///
/// Accepts both the current shape (`event: "postgres_changes"` with the
/// record under `payload.data.record`) and the older direct shape
/// (`event: "INSERT"` with the record under `payload.record`). Control
/// frames (`phx_reply`, heartbeat acks, presence) yield None.
fn extract_insert_record(frame: &Value) -> Option<Value> {
    match frame.get("event").and_then(Value::as_str)? {
        "postgres_changes" => {
            let data = frame.get("payload")?.get("data")?;
            if data.get("type").and_then(Value::as_str) != Some("INSERT") {
                return None;
            }
            data.get("record").cloned()
        }
        "INSERT" => frame.get("payload")?.get("record").cloned(),
        _ => None,
    }
}

impl RealtimeClient {
    /// Connect, join the messages topic, and return the subscription.
    ///
    /// The returned [`InsertSubscription`] yields raw records in delivery
    /// order; closing it (or dropping it) leaves the topic and closes the
    /// socket.
    pub async fn connect(url: Url, access_token: &str) -> ChatResult<InsertSubscription> {
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChatError::Subscribe(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let join = join_frame(access_token).to_string();
        sink.send(WsMessage::Text(join.into()))
            .await
            .map_err(|e| ChatError::Subscribe(e.to_string()))?;
        info!(topic = MESSAGES_TOPIC, "Joined realtime topic");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            let mut reference: u64 = 1;
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        let _ = sink.send(WsMessage::Text(leave_frame().to_string().into())).await;
                        let _ = sink.send(WsMessage::Close(None)).await;
                        debug!("Realtime subscription closed by handle");
                        break;
                    }
                    _ = heartbeat.tick() => {
                        reference += 1;
                        let frame = heartbeat_frame(reference).to_string();
                        if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                            warn!("Realtime heartbeat failed; socket gone");
                            break;
                        }
                    }
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                match serde_json::from_str::<Value>(text.as_str()) {
                                    Ok(value) => {
                                        if let Some(record) = extract_insert_record(&value) {
                                            if tx.send(record).await.is_err() {
                                                // Subscriber went away
                                                break;
                                            }
                                        }
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "Dropping undecodable realtime frame");
                                    }
                                }
                            }
                            Some(Ok(WsMessage::Ping(payload))) => {
                                let _ = sink.send(WsMessage::Pong(payload)).await;
                            }
                            Some(Ok(WsMessage::Close(_))) | None => {
                                info!("Realtime socket closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Realtime socket error");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(InsertSubscription::new(
            rx,
            Box::new(move || {
                let _ = close_tx.send(());
            }),
        ))
    }
}
