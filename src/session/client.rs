use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;

use super::state::{Effect, SessionState};
use super::status::{RoomMode, TutorStatus};
use super::whiteboard::Stroke;
use crate::booking::{self, Caller};
use crate::config::Config;
use crate::directory::Directory;
use crate::error::{Result, SyncError};
use crate::identity::{classify, Role};
use crate::transport::{ConnectOptions, RoomSession, Transport, TransportEvent};

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Dashboard-view side effect: a tutor looking at their dashboard (not in
/// a room) is Offline by definition.
pub async fn report_dashboard_offline<D: Directory>(directory: &D, uid: &str) {
    directory.set_tutor_status(uid, TutorStatus::Offline).await;
}

enum Pumped {
    Event(Option<TransportEvent>),
    Heartbeat,
}

/// Thin shell around a [`SessionState`]: pumps transport events through the
/// reducer and executes the requested effects against the transport and the
/// Directory. All awaits live here; the reducer itself never blocks.
pub struct SessionClient<S: RoomSession, D: Directory> {
    session: S,
    directory: D,
    state: SessionState,
    heartbeat_interval: Duration,
    disconnect_reason: Option<String>,
}

impl<S: RoomSession, D: Directory> SessionClient<S, D> {
    /// Tutor join path: declare the room mode in the Directory, connect,
    /// then run the post-join one-tutor check via the connect snapshot.
    pub async fn join_as_tutor<T>(
        transport: &T,
        directory: D,
        config: &Config,
        identity: &str,
        display_name: &str,
        room_id: &str,
        mode: RoomMode,
        booking_id: Option<String>,
    ) -> Result<Self>
    where
        T: Transport<Session = S>,
    {
        if classify(identity) != Role::Tutor {
            return Err(SyncError::Unauthorized(identity.to_string()));
        }

        directory
            .set_room_mode(identity, mode, booking_id.clone())
            .await;

        Self::connect(
            transport,
            directory,
            config,
            identity,
            display_name,
            room_id,
            mode,
            booking_id,
        )
        .await
    }

    /// Student/observer join path: resolve the booking reference to a room
    /// first, then connect to whatever it maps to.
    pub async fn join_with_booking<T>(
        transport: &T,
        directory: D,
        config: &Config,
        identity: &str,
        display_name: &str,
        raw_booking_key: &str,
        admin: bool,
    ) -> Result<Self>
    where
        T: Transport<Session = S>,
    {
        let caller = Caller {
            uid: Some(identity.to_string()),
            privileged: admin || classify(identity) == Role::Observer,
        };
        let access = booking::resolve(&directory, raw_booking_key, &caller, now_ms()).await?;
        tracing::info!(
            identity = %identity,
            room_id = %access.room_id,
            booking_key = %raw_booking_key,
            "Booking resolved to room"
        );

        Self::connect(
            transport,
            directory,
            config,
            identity,
            display_name,
            &access.room_id,
            RoomMode::Homework,
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn connect<T>(
        transport: &T,
        directory: D,
        config: &Config,
        identity: &str,
        display_name: &str,
        room_id: &str,
        mode: RoomMode,
        booking_id: Option<String>,
    ) -> Result<Self>
    where
        T: Transport<Session = S>,
    {
        let (session, existing) = transport
            .connect(ConnectOptions {
                url: config.transport.url.clone(),
                token: config.transport.token.clone(),
                room_id: room_id.to_string(),
                identity: identity.to_string(),
                display_name: display_name.to_string(),
            })
            .await?;

        let mut state = SessionState::new(identity, display_name, room_id, mode, booking_id);
        let effects = state.on_connected(&existing, now_ms());

        let mut client = Self {
            session,
            directory,
            state,
            heartbeat_interval: config.presence.heartbeat_interval,
            disconnect_reason: None,
        };
        client.execute(effects).await;
        Ok(client)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Access the underlying transport session, e.g. to publish tracks.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Why this client left the room, if it has (e.g. "tutor already
    /// present").
    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    // --- local intents, gated in the reducer -------------------------------

    pub async fn draw_stroke(&mut self, author: &str, stroke: Stroke) -> Result<()> {
        let effects = self.state.draw_stroke(author, stroke)?;
        self.execute(effects).await;
        Ok(())
    }

    pub async fn clear_board(&mut self, author: &str) -> Result<()> {
        let effects = self.state.clear_board(author)?;
        self.execute(effects).await;
        Ok(())
    }

    pub async fn sync_board(&mut self, author: &str) -> Result<()> {
        let effects = self.state.sync_board(author)?;
        self.execute(effects).await;
        Ok(())
    }

    pub async fn set_permission(&mut self, student_id: &str, hear: bool, speak: bool) -> Result<()> {
        let effects = self.state.set_permission(student_id, hear, speak)?;
        self.execute(effects).await;
        Ok(())
    }

    pub async fn open_board(&mut self, author: &str) {
        let effects = self.state.open_board(author);
        self.execute(effects).await;
    }

    // --- event pump --------------------------------------------------------

    /// Process the next transport event. Returns false once the session is
    /// disconnected or the transport closes.
    pub async fn process_next(&mut self) -> bool {
        match self.session.next_event().await {
            Some(event) => {
                let closing = matches!(event, TransportEvent::Disconnected);
                let effects = self.state.reduce(event, now_ms());
                self.execute(effects).await;
                !closing
            }
            None => false,
        }
    }

    /// Event loop with the presence heartbeat, running until the transport
    /// closes.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the interval fires immediately; skip the initial tick
        ticker.tick().await;

        loop {
            let pumped = tokio::select! {
                event = self.session.next_event() => Pumped::Event(event),
                _ = ticker.tick() => Pumped::Heartbeat,
            };

            match pumped {
                Pumped::Event(Some(event)) => {
                    let closing = matches!(event, TransportEvent::Disconnected);
                    let effects = self.state.reduce(event, now_ms());
                    self.execute(effects).await;
                    if closing {
                        break;
                    }
                }
                Pumped::Event(None) => break,
                Pumped::Heartbeat => {
                    if let Some(effect) = self.state.heartbeat(now_ms()) {
                        self.execute(vec![effect]).await;
                    }
                }
            }
        }
    }

    /// Explicit sign-out / page-unload path. Fires the same side effects as
    /// the transport Disconnected event; whichever path runs first wins and
    /// running both is harmless (full-state overwrites).
    pub async fn leave(&mut self) {
        let effects = self.state.on_disconnect(now_ms());
        self.execute(effects).await;
        self.session.disconnect().await;
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Broadcast(msg) => match msg.to_bytes() {
                    // a failed broadcast is not retried and not surfaced:
                    // at-most-once delivery is the accepted trade-off
                    Ok(bytes) => {
                        if let Err(e) = self.session.send_data(bytes).await {
                            tracing::warn!(error = %e, "Dropping undelivered broadcast");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping unencodable broadcast");
                    }
                },

                Effect::SetSubscribed { sid, subscribed } => {
                    if let Err(e) = self.session.set_subscribed(&sid, subscribed).await {
                        tracing::warn!(sid = %sid, error = %e, "Audio gate change failed");
                    }
                }

                Effect::SetTutorStatus(status) => {
                    self.directory
                        .set_tutor_status(self.state.identity(), status)
                        .await;
                }

                Effect::WriteSnapshot(snapshot) => {
                    self.directory
                        .write_session_snapshot(self.state.room_id(), snapshot)
                        .await;
                }

                Effect::ClearRoomMode => {
                    self.directory.clear_room_mode(self.state.identity()).await;
                }

                Effect::Disconnect { reason } => {
                    tracing::warn!(reason = %reason, "Leaving room");
                    self.disconnect_reason = Some(reason);
                    for follow_up in self.state.on_disconnect(now_ms()) {
                        queue.push_back(follow_up);
                    }
                    self.session.disconnect().await;
                }
            }
        }
    }
}
