//! Per-lobby publish/subscribe fan-out: each lobby is a topic, each
//! connected device a subscriber, and each published message is
//! serialized to JSON at most once regardless of subscriber count.

use std::io::Write;
use std::sync::{Arc, OnceLock};

use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::protocol::{DeviceId, LobbyId, ServerMessage, WsFrame};

/// An event plus its lazily-computed serialized form, so fan-out to many
/// subscribers serializes the payload once.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    frame: Arc<WsFrame>,
    json: Arc<OnceLock<Bytes>>,
}

impl BroadcastMessage {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            frame: Arc::new(WsFrame::new(message)),
            json: Arc::new(OnceLock::new()),
        }
    }

    pub fn frame(&self) -> &WsFrame {
        &self.frame
    }

    pub fn arc_clone(&self) -> Self {
        self.clone()
    }

    /// Returns the cached JSON bytes, computing them on first access.
    pub fn get_or_serialize_json(&self) -> Bytes {
        if let Some(bytes) = self.json.get() {
            return bytes.clone();
        }
        let mut buffer = SerializationBuffer::default();
        let bytes = buffer.serialize_json(&*self.frame).unwrap_or_default();
        let _ = self.json.set(bytes.clone());
        bytes
    }
}

/// Reusable `BytesMut`-backed buffer for JSON serialization.
#[derive(Default)]
pub struct SerializationBuffer {
    buffer: BytesMut,
}

impl SerializationBuffer {
    const OVERSIZED_THRESHOLD: usize = 64 * 1024;

    pub fn serialize_json<T: Serialize>(&mut self, value: &T) -> Result<Bytes, serde_json::Error> {
        self.buffer.clear();
        {
            let mut writer = BytesMutWriteAdapter(&mut self.buffer);
            serde_json::to_writer(&mut writer, value)?;
        }
        let bytes = self.buffer.split().freeze();
        self.reset_if_oversized();
        Ok(bytes)
    }

    fn reset_if_oversized(&mut self) {
        if self.buffer.capacity() > Self::OVERSIZED_THRESHOLD {
            self.buffer = BytesMut::new();
        }
    }
}

struct BytesMutWriteAdapter<'a>(&'a mut BytesMut);

impl Write for BytesMutWriteAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type Subscribers = DashMap<DeviceId, mpsc::UnboundedSender<BroadcastMessage>>;

/// Tracks subscriptions per lobby and fans published events out to every
/// current subscriber. Sockets are the subscription owner
/// ([`crate::connection_hub`]); the Broadcaster only holds senders, so a
/// dropped socket's sender simply starts failing sends and is pruned on
/// next publish rather than requiring an explicit unsubscribe.
#[derive(Default)]
pub struct Broadcaster {
    topics: DashMap<LobbyId, Subscribers>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        lobby_id: LobbyId,
        device_id: DeviceId,
        sender: mpsc::UnboundedSender<BroadcastMessage>,
    ) {
        self.topics
            .entry(lobby_id)
            .or_default()
            .insert(device_id, sender);
    }

    pub fn unsubscribe(&self, lobby_id: LobbyId, device_id: &str) {
        if let Some(subs) = self.topics.get(&lobby_id) {
            subs.remove(device_id);
        }
    }

    /// Drops the whole topic, e.g. once a lobby is deleted.
    pub fn drop_lobby(&self, lobby_id: LobbyId) {
        self.topics.remove(&lobby_id);
    }

    /// Publishes to every current subscriber of `lobby_id`. A send failure
    /// (receiver dropped) removes that subscriber but does not affect
    /// delivery to the others.
    pub fn publish(&self, lobby_id: LobbyId, message: ServerMessage) {
        let broadcast = BroadcastMessage::new(message);
        let Some(subs) = self.topics.get(&lobby_id) else {
            return;
        };
        let dead: Vec<DeviceId> = subs
            .iter()
            .filter_map(|entry| {
                if entry.value().send(broadcast.arc_clone()).is_err() {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();
        drop(subs);
        if !dead.is_empty() {
            if let Some(subs) = self.topics.get(&lobby_id) {
                for device_id in dead {
                    subs.remove(&device_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_message_arc_clone_shares_json_cache() {
        let msg = BroadcastMessage::new(ServerMessage::GameStarted {
            lobby_code: "ABCD".into(),
        });
        let first = msg.get_or_serialize_json();
        let clone = msg.arc_clone();
        let second = clone.get_or_serialize_json();
        assert_eq!(first, second);
    }

    #[test]
    fn serialization_buffer_reuses_allocation() {
        let mut buffer = SerializationBuffer::default();
        let a = buffer
            .serialize_json(&ServerMessage::CountdownTick {
                seconds_remaining: 2,
            })
            .unwrap();
        let b = buffer
            .serialize_json(&ServerMessage::CountdownTick {
                seconds_remaining: 1,
            })
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn publish_delivers_to_subscribers_and_prunes_dead_ones() {
        let broadcaster = Broadcaster::new();
        let lobby_id = uuid::Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.subscribe(lobby_id, "a".into(), tx);

        broadcaster.publish(
            lobby_id,
            ServerMessage::GameStarted {
                lobby_code: "ABCD".into(),
            },
        );
        assert!(rx.recv().await.is_some());

        drop(rx);
        broadcaster.publish(
            lobby_id,
            ServerMessage::GameStarted {
                lobby_code: "ABCD".into(),
            },
        );
        assert!(broadcaster.topics.get(&lobby_id).unwrap().is_empty());
    }
}
