use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub sid: String,
    pub kind: TrackKind,
}

/// Remote roster entry available at connect time. The one-tutor post-join
/// check inspects this snapshot, not later join events.
#[derive(Debug, Clone)]
pub struct RemoteParticipantInfo {
    pub identity: String,
    pub display_name: String,
    pub tracks: Vec<TrackInfo>,
}

/// Events emitted by a connected room session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ParticipantJoined {
        identity: String,
        display_name: String,
    },
    ParticipantLeft {
        identity: String,
    },
    TrackPublished {
        identity: String,
        sid: String,
        kind: TrackKind,
    },
    TrackUnpublished {
        identity: String,
        sid: String,
    },
    TrackSubscribed {
        identity: String,
        sid: String,
    },
    TrackUnsubscribed {
        identity: String,
        sid: String,
    },
    /// Broadcast data-channel payload from another participant.
    Data {
        sender: String,
        payload: Vec<u8>,
    },
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: String,
    pub token: String,
    pub room_id: String,
    pub identity: String,
    pub display_name: String,
}

/// A connected room session.
///
/// Delivery guarantees the core relies on, and nothing stronger: broadcast
/// data from a single sender arrives in the order sent; there is no
/// cross-sender ordering and no exactly-once guarantee. A lost append is
/// lost until the next full sync; the protocol accepts that trade-off.
#[allow(async_fn_in_trait)]
pub trait RoomSession {
    /// Broadcast a data payload to every other participant in the room.
    async fn send_data(&self, payload: Vec<u8>) -> Result<()>;

    /// Gate an inbound track without leaving the room.
    async fn set_subscribed(&self, sid: &str, subscribed: bool) -> Result<()>;

    /// Next queued event; None once the session is torn down.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    async fn disconnect(&mut self);
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    type Session: RoomSession;

    async fn connect(
        &self,
        opts: ConnectOptions,
    ) -> Result<(Self::Session, Vec<RemoteParticipantInfo>)>;
}

struct PeerEntry {
    display_name: String,
    sender: mpsc::UnboundedSender<TransportEvent>,
    tracks: Vec<TrackInfo>,
}

type RoomPeers = HashMap<String, PeerEntry>;

/// In-process transport relaying broadcast data between participants over
/// unbounded channels. Preserves per-sender order (a single lock guards the
/// fan-out) and deliberately nothing more. Used by tests and the local
/// simulation driver.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    rooms: Arc<RwLock<HashMap<String, RoomPeers>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LoopbackTransport {
    type Session = LoopbackSession;

    async fn connect(
        &self,
        opts: ConnectOptions,
    ) -> Result<(Self::Session, Vec<RemoteParticipantInfo>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut rooms = self.rooms.write().await;
        let peers = rooms.entry(opts.room_id.clone()).or_default();

        if peers.contains_key(&opts.identity) {
            return Err(SyncError::connect_failed(format!(
                "identity {} already connected to room {}",
                opts.identity, opts.room_id
            )));
        }

        let existing: Vec<RemoteParticipantInfo> = peers
            .iter()
            .map(|(identity, entry)| RemoteParticipantInfo {
                identity: identity.clone(),
                display_name: entry.display_name.clone(),
                tracks: entry.tracks.clone(),
            })
            .collect();

        for entry in peers.values() {
            let _ = entry.sender.send(TransportEvent::ParticipantJoined {
                identity: opts.identity.clone(),
                display_name: opts.display_name.clone(),
            });
        }

        peers.insert(
            opts.identity.clone(),
            PeerEntry {
                display_name: opts.display_name.clone(),
                sender: tx,
                tracks: Vec::new(),
            },
        );

        tracing::debug!(
            identity = %opts.identity,
            room_id = %opts.room_id,
            peers = existing.len() + 1,
            "Loopback participant connected"
        );

        Ok((
            LoopbackSession {
                rooms: self.rooms.clone(),
                room_id: opts.room_id,
                identity: opts.identity,
                rx,
                connected: true,
            },
            existing,
        ))
    }
}

pub struct LoopbackSession {
    rooms: Arc<RwLock<HashMap<String, RoomPeers>>>,
    room_id: String,
    identity: String,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    connected: bool,
}

impl LoopbackSession {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Publish a track owned by this participant. Every peer, including the
    /// publisher, sees the TrackPublished event.
    pub async fn publish_track(&self, sid: &str, kind: TrackKind) {
        let mut rooms = self.rooms.write().await;
        let Some(peers) = rooms.get_mut(&self.room_id) else {
            return;
        };
        if let Some(entry) = peers.get_mut(&self.identity) {
            entry.tracks.push(TrackInfo {
                sid: sid.to_string(),
                kind,
            });
        }
        for entry in peers.values() {
            let _ = entry.sender.send(TransportEvent::TrackPublished {
                identity: self.identity.clone(),
                sid: sid.to_string(),
                kind,
            });
        }
    }

    pub async fn unpublish_track(&self, sid: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(peers) = rooms.get_mut(&self.room_id) else {
            return;
        };
        if let Some(entry) = peers.get_mut(&self.identity) {
            entry.tracks.retain(|t| t.sid != sid);
        }
        for entry in peers.values() {
            let _ = entry.sender.send(TransportEvent::TrackUnpublished {
                identity: self.identity.clone(),
                sid: sid.to_string(),
            });
        }
    }
}

impl RoomSession for LoopbackSession {
    async fn send_data(&self, payload: Vec<u8>) -> Result<()> {
        let rooms = self.rooms.read().await;
        let peers = rooms
            .get(&self.room_id)
            .ok_or_else(|| SyncError::TransportSendFailed("room gone".to_string()))?;
        for (identity, entry) in peers.iter() {
            if identity == &self.identity {
                continue;
            }
            let _ = entry.sender.send(TransportEvent::Data {
                sender: self.identity.clone(),
                payload: payload.clone(),
            });
        }
        Ok(())
    }

    async fn set_subscribed(&self, sid: &str, subscribed: bool) -> Result<()> {
        let rooms = self.rooms.read().await;
        let peers = rooms
            .get(&self.room_id)
            .ok_or_else(|| SyncError::TransportSendFailed("room gone".to_string()))?;

        let owner = peers
            .iter()
            .find(|(_, entry)| entry.tracks.iter().any(|t| t.sid == sid))
            .map(|(identity, _)| identity.clone());
        let Some(owner) = owner else {
            return Err(SyncError::TransportSendFailed(format!(
                "track {sid} not found"
            )));
        };

        // the transport acks the gate change back to the requesting client
        if let Some(me) = peers.get(&self.identity) {
            let event = if subscribed {
                TransportEvent::TrackSubscribed {
                    identity: owner,
                    sid: sid.to_string(),
                }
            } else {
                TransportEvent::TrackUnsubscribed {
                    identity: owner,
                    sid: sid.to_string(),
                }
            };
            let _ = me.sender.send(event);
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let mut rooms = self.rooms.write().await;
        let mut room_empty = false;
        if let Some(peers) = rooms.get_mut(&self.room_id) {
            if let Some(me) = peers.remove(&self.identity) {
                let _ = me.sender.send(TransportEvent::Disconnected);
            }
            for entry in peers.values() {
                let _ = entry.sender.send(TransportEvent::ParticipantLeft {
                    identity: self.identity.clone(),
                });
            }
            room_empty = peers.is_empty();
        }
        if room_empty {
            rooms.remove(&self.room_id);
        }
    }
}
