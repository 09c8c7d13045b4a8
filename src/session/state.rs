use super::messages::DataMessage;
use super::permissions::{desired_subscriptions, PermissionLedger};
use super::roster::{compose_tiles, Roster, Tile, Viewer};
use super::status::{derive_status, RoomMode, TutorStatus};
use super::whiteboard::{can_mutate, BoardStore, Stroke};
use crate::directory::SessionSnapshot;
use crate::error::{Result, SyncError};
use crate::identity::{classify, Role};
use crate::transport::{RemoteParticipantInfo, TrackKind, TransportEvent};

/// Side effects requested by a state transition. The reducer never touches
/// I/O itself; a thin shell executes these against the transport and the
/// Directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Broadcast(DataMessage),
    SetSubscribed { sid: String, subscribed: bool },
    SetTutorStatus(TutorStatus),
    WriteSnapshot(SessionSnapshot),
    ClearRoomMode,
    /// Leave the room and surface `reason` as a status message.
    Disconnect { reason: String },
}

/// Session-scoped aggregate owning the roster, the permission ledger and
/// the board logs for one room. Explicitly passed to each handler so that
/// several sessions can coexist in one process.
pub struct SessionState {
    identity: String,
    display_name: String,
    role: Role,
    room_id: String,
    mode: RoomMode,
    booking_id: Option<String>,
    connected: bool,
    reported_status: Option<TutorStatus>,
    viewed_board: Option<String>,
    pub roster: Roster,
    pub ledger: PermissionLedger,
    pub boards: BoardStore,
}

impl SessionState {
    pub fn new(
        identity: impl Into<String>,
        display_name: impl Into<String>,
        room_id: impl Into<String>,
        mode: RoomMode,
        booking_id: Option<String>,
    ) -> Self {
        let identity = identity.into();
        let role = classify(&identity);
        Self {
            identity,
            display_name: display_name.into(),
            role,
            room_id: room_id.into(),
            mode,
            booking_id,
            connected: false,
            reported_status: None,
            viewed_board: None,
            roster: Roster::new(),
            ledger: PermissionLedger::new(),
            boards: BoardStore::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn booking_id(&self) -> Option<&str> {
        self.booking_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn reported_status(&self) -> Option<TutorStatus> {
        self.reported_status
    }

    /// Seed local state from the connect-time roster snapshot.
    ///
    /// This is where the one-tutor invariant is checked: a joining tutor
    /// that finds another tutor already present disconnects itself. The
    /// check is best-effort and racy: two tutors connecting in the same
    /// instant can both pass. That is the accepted behavior.
    pub fn on_connected(
        &mut self,
        existing: &[RemoteParticipantInfo],
        now_ms: i64,
    ) -> Vec<Effect> {
        self.connected = true;
        let local_identity = self.identity.clone();
        let local_name = self.display_name.clone();
        self.roster.upsert(&local_identity, &local_name, true);
        self.boards.ensure_board(&local_identity);

        for info in existing {
            self.roster.upsert(&info.identity, &info.display_name, false);
            for track in &info.tracks {
                self.roster.add_track(&info.identity, &track.sid, track.kind);
            }
        }

        if self.role == Role::Tutor {
            if let Some(other) = self.roster.remote_tutor() {
                tracing::warn!(
                    room_id = %self.room_id,
                    other_tutor = %other,
                    "Another tutor already present, leaving"
                );
                return vec![Effect::Disconnect {
                    reason: SyncError::TutorAlreadyPresent(self.room_id.clone())
                        .to_string(),
                }];
            }
        }

        let mut effects = self.apply_hearing();
        effects.extend(self.tutor_presence_effects(now_ms));
        effects
    }

    /// Single transition function: fold one transport event into the state
    /// and return the side effects to run.
    pub fn reduce(&mut self, event: TransportEvent, now_ms: i64) -> Vec<Effect> {
        match event {
            TransportEvent::ParticipantJoined {
                identity,
                display_name,
            } => {
                self.roster.upsert(&identity, &display_name, false);
                self.boards.ensure_board(&identity);
                tracing::info!(identity = %identity, room_id = %self.room_id, "Participant joined");

                // proactive catch-up so the newcomer never has to request
                // our board; roles that may not mutate a board stay silent
                let mut effects = Vec::new();
                if can_mutate(self.role, &self.identity, &self.identity) {
                    effects.push(Effect::Broadcast(DataMessage::WbSync {
                        author: self.identity.clone(),
                        strokes: self.boards.strokes(&self.identity).to_vec(),
                    }));
                }
                effects.extend(self.tutor_presence_effects(now_ms));
                effects
            }

            TransportEvent::ParticipantLeft { identity } => {
                self.roster.remove(&identity);
                tracing::info!(identity = %identity, room_id = %self.room_id, "Participant left");
                // boards are kept for the lifetime of the room
                self.tutor_presence_effects(now_ms)
            }

            TransportEvent::TrackPublished {
                identity,
                sid,
                kind,
            } => {
                self.roster.add_track(&identity, &sid, kind);
                if kind == TrackKind::Audio {
                    self.apply_hearing()
                } else {
                    Vec::new()
                }
            }

            TransportEvent::TrackUnpublished { identity, sid } => {
                self.roster.remove_track(&identity, &sid);
                self.apply_hearing()
            }

            TransportEvent::TrackSubscribed { sid, .. } => {
                self.roster.set_track_subscribed(&sid, true);
                // re-evaluated redundantly on purpose: subscription acks and
                // permission updates may arrive in either order
                self.apply_hearing()
            }

            TransportEvent::TrackUnsubscribed { sid, .. } => {
                self.roster.set_track_subscribed(&sid, false);
                self.apply_hearing()
            }

            TransportEvent::Data { sender, payload } => match DataMessage::decode(&payload) {
                Some(msg) => self.on_data_message(&sender, msg),
                None => Vec::new(),
            },

            TransportEvent::Disconnected => self.on_disconnect(now_ms),
        }
    }

    fn on_data_message(&mut self, sender: &str, msg: DataMessage) -> Vec<Effect> {
        match msg {
            DataMessage::Perm {
                student_id,
                hear,
                speak,
            } => {
                let relevant = match self.role {
                    Role::Tutor => true,
                    Role::Student => student_id == self.identity,
                    Role::Observer | Role::Unknown => false,
                };
                if !relevant {
                    return Vec::new();
                }
                tracing::debug!(
                    sender = %sender,
                    student_id = %student_id,
                    hear,
                    speak,
                    "Permission update received"
                );
                self.ledger.set(&student_id, hear, speak);
                self.apply_hearing()
            }

            // remote whiteboard mutations are accepted unconditionally; the
            // single-writer assumption is enforced on the sending side
            DataMessage::WbStroke { author, stroke } => {
                self.boards.append(&author, stroke);
                Vec::new()
            }

            DataMessage::WbSync { author, strokes } => {
                self.boards.replace(&author, strokes);
                Vec::new()
            }

            DataMessage::WbRequest { author } => {
                if author == self.identity
                    && can_mutate(self.role, &self.identity, &self.identity)
                {
                    vec![Effect::Broadcast(DataMessage::WbSync {
                        author: self.identity.clone(),
                        strokes: self.boards.strokes(&self.identity).to_vec(),
                    })]
                } else {
                    Vec::new()
                }
            }

            DataMessage::WbClear { author } => {
                self.boards.clear(&author);
                Vec::new()
            }
        }
    }

    /// Disconnect side effects. Fired from both the transport Disconnected
    /// event and the explicit leave path; only one of the two is guaranteed
    /// to run depending on how the client exits, and running both is safe
    /// because every write is a full-state overwrite.
    pub fn on_disconnect(&mut self, now_ms: i64) -> Vec<Effect> {
        self.connected = false;
        if self.role != Role::Tutor {
            return Vec::new();
        }
        // a tutor bounced by the one-tutor check never reported presence;
        // the room snapshot belongs to the tutor that did
        let owned_snapshot =
            matches!(self.reported_status, Some(s) if s != TutorStatus::Offline);
        self.reported_status = Some(TutorStatus::Offline);
        let mut effects = vec![
            Effect::SetTutorStatus(TutorStatus::Offline),
            Effect::ClearRoomMode,
        ];
        if owned_snapshot {
            effects.push(Effect::WriteSnapshot(self.snapshot(false, now_ms)));
        }
        effects
    }

    // --- local intents -----------------------------------------------------

    /// Commit a locally drawn stroke and broadcast it. The authority gate
    /// runs here, before anything is sent.
    pub fn draw_stroke(&mut self, author: &str, stroke: Stroke) -> Result<Vec<Effect>> {
        if !can_mutate(self.role, &self.identity, author) {
            return Err(SyncError::Unauthorized(self.identity.clone()));
        }
        self.boards.append(author, stroke.clone());
        Ok(vec![Effect::Broadcast(DataMessage::WbStroke {
            author: author.to_string(),
            stroke,
        })])
    }

    pub fn clear_board(&mut self, author: &str) -> Result<Vec<Effect>> {
        if !can_mutate(self.role, &self.identity, author) {
            return Err(SyncError::Unauthorized(self.identity.clone()));
        }
        self.boards.clear(author);
        Ok(vec![Effect::Broadcast(DataMessage::WbClear {
            author: author.to_string(),
        })])
    }

    /// Push a full board state, e.g. to resolve divergence.
    pub fn sync_board(&mut self, author: &str) -> Result<Vec<Effect>> {
        if !can_mutate(self.role, &self.identity, author) {
            return Err(SyncError::Unauthorized(self.identity.clone()));
        }
        Ok(vec![Effect::Broadcast(DataMessage::WbSync {
            author: author.to_string(),
            strokes: self.boards.strokes(author).to_vec(),
        })])
    }

    /// Tutor-only: update a student's hear/speak pair and replicate it.
    pub fn set_permission(
        &mut self,
        student_id: &str,
        hear: bool,
        speak: bool,
    ) -> Result<Vec<Effect>> {
        if self.role != Role::Tutor {
            return Err(SyncError::Unauthorized(self.identity.clone()));
        }
        self.ledger.set(student_id, hear, speak);
        let mut effects = vec![Effect::Broadcast(DataMessage::Perm {
            student_id: student_id.to_string(),
            hear,
            speak,
        })];
        effects.extend(self.apply_hearing());
        Ok(effects)
    }

    /// Switch the locally viewed board. A board with zero cached strokes
    /// gets a wb_request so its author pushes a full sync.
    pub fn open_board(&mut self, author: &str) -> Vec<Effect> {
        self.viewed_board = Some(author.to_string());
        if author != self.identity && self.boards.is_empty(author) {
            vec![Effect::Broadcast(DataMessage::WbRequest {
                author: author.to_string(),
            })]
        } else {
            Vec::new()
        }
    }

    pub fn viewed_board(&self) -> Option<&str> {
        self.viewed_board.as_deref()
    }

    /// Periodic presence write while connected. Tutor clients own the room
    /// snapshot; everyone else emits nothing.
    pub fn heartbeat(&self, now_ms: i64) -> Option<Effect> {
        if self.connected && self.role == Role::Tutor {
            Some(Effect::WriteSnapshot(self.snapshot(true, now_ms)))
        } else {
            None
        }
    }

    pub fn tiles(&self, viewer: Viewer) -> Vec<Tile> {
        compose_tiles(&self.roster, viewer)
    }

    // --- internals ---------------------------------------------------------

    /// Desired-state audio re-evaluation ("apply hearing"). Idempotent:
    /// only emits gates that differ from the currently known subscription
    /// state, and converges regardless of event ordering.
    fn apply_hearing(&self) -> Vec<Effect> {
        desired_subscriptions(
            self.role,
            &self.identity,
            &self.ledger,
            self.roster.remote_audio_tracks().into_iter(),
        )
        .into_iter()
        .filter(|(sid, wanted)| self.roster.track_subscribed(sid) != Some(*wanted))
        .map(|(sid, subscribed)| Effect::SetSubscribed { sid, subscribed })
        .collect()
    }

    /// Status + occupancy snapshot effects for tutor clients on every
    /// roster change.
    fn tutor_presence_effects(&mut self, now_ms: i64) -> Vec<Effect> {
        if self.role != Role::Tutor || !self.connected {
            return Vec::new();
        }
        let mut effects = Vec::new();
        let derived = derive_status(self.mode, self.roster.student_count());
        if self.reported_status != Some(derived) {
            self.reported_status = Some(derived);
            effects.push(Effect::SetTutorStatus(derived));
        }
        effects.push(Effect::WriteSnapshot(self.snapshot(true, now_ms)));
        effects
    }

    fn snapshot(&self, active: bool, now_ms: i64) -> SessionSnapshot {
        let students = self.roster.student_identities();
        SessionSnapshot {
            active,
            students_count: students.len(),
            students,
            updated_at: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::whiteboard::Point;
    use crate::transport::TrackInfo;

    const NOW: i64 = 1_730_000_000_000;

    fn stroke() -> Stroke {
        Stroke {
            color: "#000000".to_string(),
            size_px: 2.0,
            points: vec![Point { x: 0.1, y: 0.1 }],
        }
    }

    fn remote(identity: &str, tracks: &[(&str, TrackKind)]) -> RemoteParticipantInfo {
        RemoteParticipantInfo {
            identity: identity.to_string(),
            display_name: identity.to_string(),
            tracks: tracks
                .iter()
                .map(|(sid, kind)| TrackInfo {
                    sid: sid.to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }

    fn tutor_state() -> SessionState {
        SessionState::new("tutor_anna", "Anna", "room1", RoomMode::Homework, None)
    }

    fn student_state(identity: &str) -> SessionState {
        SessionState::new(identity, identity, "room1", RoomMode::Homework, None)
    }

    fn subscribes(effects: &[Effect]) -> Vec<(String, bool)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::SetSubscribed { sid, subscribed } => {
                    Some((sid.clone(), *subscribed))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_second_tutor_disconnects_itself() {
        let mut state = tutor_state();
        let effects = state.on_connected(&[remote("tutor_bob", &[])], NOW);
        assert_eq!(
            effects,
            vec![Effect::Disconnect {
                reason: SyncError::TutorAlreadyPresent("room1".to_string()).to_string()
            }]
        );
    }

    #[test]
    fn test_bounced_tutor_leaves_live_snapshot_alone() {
        let mut state = tutor_state();
        state.on_connected(&[remote("tutor_bob", &[])], NOW);

        // the bounced tutor goes offline and clears its own mode, but the
        // room snapshot stays owned by the tutor already running it
        let effects = state.on_disconnect(NOW);
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Offline)));
        assert!(effects.contains(&Effect::ClearRoomMode));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::WriteSnapshot(_))));
    }

    #[test]
    fn test_sole_tutor_reports_waiting_then_busy_then_waiting() {
        let mut state = tutor_state();
        let effects = state.on_connected(&[], NOW);
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Waiting)));

        let effects = state.reduce(
            TransportEvent::ParticipantJoined {
                identity: "student_john".to_string(),
                display_name: "John".to_string(),
            },
            NOW,
        );
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Busy)));

        let effects = state.reduce(
            TransportEvent::ParticipantLeft {
                identity: "student_john".to_string(),
            },
            NOW,
        );
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Waiting)));

        let effects = state.on_disconnect(NOW);
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Offline)));
        assert!(effects.contains(&Effect::ClearRoomMode));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::WriteSnapshot(s) if !s.active)));
    }

    #[test]
    fn test_session_mode_stays_busy_regardless_of_occupancy() {
        let mut state = SessionState::new(
            "tutor_anna",
            "Anna",
            "room1",
            RoomMode::Session,
            Some("B17".to_string()),
        );
        let effects = state.on_connected(&[], NOW);
        assert!(effects.contains(&Effect::SetTutorStatus(TutorStatus::Busy)));

        // occupancy changes do not move the status in Session mode
        let effects = state.reduce(
            TransportEvent::ParticipantJoined {
                identity: "student_john".to_string(),
                display_name: "John".to_string(),
            },
            NOW,
        );
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::SetTutorStatus(_))));
    }

    #[test]
    fn test_status_not_re_reported_when_unchanged() {
        let mut state = tutor_state();
        state.on_connected(&[], NOW);
        let effects = state.reduce(
            TransportEvent::ParticipantJoined {
                identity: "observer_1".to_string(),
                display_name: "Watcher".to_string(),
            },
            NOW,
        );
        // observers do not affect occupancy; still Waiting, no new write
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::SetTutorStatus(_))));
    }

    #[test]
    fn test_apply_hearing_converges_for_both_orderings() {
        // ordering A: permission first, then track available
        let mut a = student_state("student_john");
        a.on_connected(&[remote("tutor_anna", &[])], NOW);
        let perm = DataMessage::Perm {
            student_id: "student_john".to_string(),
            hear: true,
            speak: false,
        };
        let effects = a.reduce(
            TransportEvent::Data {
                sender: "tutor_anna".to_string(),
                payload: perm.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(subscribes(&effects).is_empty());
        let effects = a.reduce(
            TransportEvent::TrackPublished {
                identity: "tutor_anna".to_string(),
                sid: "mic-anna".to_string(),
                kind: TrackKind::Audio,
            },
            NOW,
        );
        assert_eq!(subscribes(&effects), vec![("mic-anna".to_string(), true)]);

        // ordering B: track available first, then permission
        let mut b = student_state("student_john");
        b.on_connected(&[remote("tutor_anna", &[("mic-anna", TrackKind::Audio)])], NOW);
        let perm = DataMessage::Perm {
            student_id: "student_john".to_string(),
            hear: true,
            speak: false,
        };
        let effects = b.reduce(
            TransportEvent::Data {
                sender: "tutor_anna".to_string(),
                payload: perm.to_bytes().unwrap(),
            },
            NOW,
        );
        assert_eq!(subscribes(&effects), vec![("mic-anna".to_string(), true)]);
    }

    #[test]
    fn test_apply_hearing_is_idempotent_after_ack() {
        let mut state = student_state("student_john");
        state.on_connected(&[remote("tutor_anna", &[("mic-anna", TrackKind::Audio)])], NOW);
        let perm = DataMessage::Perm {
            student_id: "student_john".to_string(),
            hear: true,
            speak: false,
        };
        state.reduce(
            TransportEvent::Data {
                sender: "tutor_anna".to_string(),
                payload: perm.to_bytes().unwrap(),
            },
            NOW,
        );

        // transport acks the subscription; the redundant re-evaluation on
        // that ack must emit nothing further
        let effects = state.reduce(
            TransportEvent::TrackSubscribed {
                identity: "tutor_anna".to_string(),
                sid: "mic-anna".to_string(),
            },
            NOW,
        );
        assert!(subscribes(&effects).is_empty());
    }

    #[test]
    fn test_revoked_hear_unsubscribes() {
        let mut state = student_state("student_john");
        state.on_connected(&[remote("tutor_anna", &[("mic-anna", TrackKind::Audio)])], NOW);
        for (hear, expected) in [(true, true), (false, false)] {
            let perm = DataMessage::Perm {
                student_id: "student_john".to_string(),
                hear,
                speak: false,
            };
            let effects = state.reduce(
                TransportEvent::Data {
                    sender: "tutor_anna".to_string(),
                    payload: perm.to_bytes().unwrap(),
                },
                NOW,
            );
            assert_eq!(
                subscribes(&effects),
                vec![("mic-anna".to_string(), expected)]
            );
            state.reduce(
                if expected {
                    TransportEvent::TrackSubscribed {
                        identity: "tutor_anna".to_string(),
                        sid: "mic-anna".to_string(),
                    }
                } else {
                    TransportEvent::TrackUnsubscribed {
                        identity: "tutor_anna".to_string(),
                        sid: "mic-anna".to_string(),
                    }
                },
                NOW,
            );
        }
    }

    #[test]
    fn test_perm_for_other_student_ignored_locally() {
        let mut state = student_state("student_john");
        state.on_connected(&[remote("tutor_anna", &[("mic-anna", TrackKind::Audio)])], NOW);
        let perm = DataMessage::Perm {
            student_id: "student_kate".to_string(),
            hear: true,
            speak: true,
        };
        let effects = state.reduce(
            TransportEvent::Data {
                sender: "tutor_anna".to_string(),
                payload: perm.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_tutor_hears_student_when_speak_granted() {
        let mut state = tutor_state();
        state.on_connected(
            &[remote("student_john", &[("mic-john", TrackKind::Audio)])],
            NOW,
        );
        let effects = state.set_permission("student_john", true, true).unwrap();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Broadcast(DataMessage::Perm { .. })
        )));
        assert_eq!(subscribes(&effects), vec![("mic-john".to_string(), true)]);
    }

    #[test]
    fn test_students_cannot_author_permissions() {
        let mut state = student_state("student_john");
        state.on_connected(&[], NOW);
        assert!(matches!(
            state.set_permission("student_john", true, true),
            Err(SyncError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_draw_authority() {
        let mut student = student_state("student_john");
        student.on_connected(&[], NOW);
        assert!(student.draw_stroke("student_john", stroke()).is_ok());
        assert!(matches!(
            student.draw_stroke("student_kate", stroke()),
            Err(SyncError::Unauthorized(_))
        ));

        let mut tutor = tutor_state();
        tutor.on_connected(&[], NOW);
        assert!(tutor.draw_stroke("student_john", stroke()).is_ok());

        let mut observer = student_state("observer_1");
        observer.on_connected(&[], NOW);
        assert!(matches!(
            observer.draw_stroke("observer_1", stroke()),
            Err(SyncError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_join_triggers_own_board_sync() {
        let mut state = student_state("student_john");
        state.on_connected(&[], NOW);
        state.draw_stroke("student_john", stroke()).unwrap();

        let effects = state.reduce(
            TransportEvent::ParticipantJoined {
                identity: "student_kate".to_string(),
                display_name: "Kate".to_string(),
            },
            NOW,
        );
        match &effects[0] {
            Effect::Broadcast(DataMessage::WbSync { author, strokes }) => {
                assert_eq!(author, "student_john");
                assert_eq!(strokes.len(), 1);
            }
            other => panic!("expected own-board sync, got {other:?}"),
        }
    }

    #[test]
    fn test_observer_never_emits_board_messages() {
        let mut state = student_state("observer_1");
        state.on_connected(&[remote("tutor_anna", &[])], NOW);

        // join-time catch-up sync is skipped for roles without board authority
        let effects = state.reduce(
            TransportEvent::ParticipantJoined {
                identity: "student_john".to_string(),
                display_name: "John".to_string(),
            },
            NOW,
        );
        assert!(effects.is_empty());

        // a request for the observer's own board likewise goes unanswered
        let req = DataMessage::WbRequest {
            author: "observer_1".to_string(),
        };
        let effects = state.reduce(
            TransportEvent::Data {
                sender: "student_john".to_string(),
                payload: req.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_wb_request_answered_only_by_author() {
        let mut author = student_state("student_john");
        author.on_connected(&[], NOW);
        author.draw_stroke("student_john", stroke()).unwrap();

        let req = DataMessage::WbRequest {
            author: "student_john".to_string(),
        };
        let effects = author.reduce(
            TransportEvent::Data {
                sender: "observer_1".to_string(),
                payload: req.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(matches!(
            &effects[0],
            Effect::Broadcast(DataMessage::WbSync { author, .. }) if author == "student_john"
        ));

        let mut bystander = student_state("student_kate");
        bystander.on_connected(&[], NOW);
        let req = DataMessage::WbRequest {
            author: "student_john".to_string(),
        };
        let effects = bystander.reduce(
            TransportEvent::Data {
                sender: "observer_1".to_string(),
                payload: req.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_open_board_requests_sync_only_when_empty() {
        let mut state = tutor_state();
        state.on_connected(&[], NOW);

        let effects = state.open_board("student_john");
        assert!(matches!(
            &effects[0],
            Effect::Broadcast(DataMessage::WbRequest { author }) if author == "student_john"
        ));

        // cached strokes suppress the request
        let sync = DataMessage::WbSync {
            author: "student_john".to_string(),
            strokes: vec![stroke()],
        };
        state.reduce(
            TransportEvent::Data {
                sender: "student_john".to_string(),
                payload: sync.to_bytes().unwrap(),
            },
            NOW,
        );
        assert!(state.open_board("student_john").is_empty());
    }

    #[test]
    fn test_malformed_data_is_dropped() {
        let mut state = tutor_state();
        state.on_connected(&[], NOW);
        let effects = state.reduce(
            TransportEvent::Data {
                sender: "student_john".to_string(),
                payload: b"{\"type\":\"unknown_future_thing\"}".to_vec(),
            },
            NOW,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_heartbeat_only_while_connected_tutor() {
        let mut tutor = tutor_state();
        assert!(tutor.heartbeat(NOW).is_none());
        tutor.on_connected(&[], NOW);
        assert!(matches!(
            tutor.heartbeat(NOW),
            Some(Effect::WriteSnapshot(_))
        ));

        let mut student = student_state("student_john");
        student.on_connected(&[], NOW);
        assert!(student.heartbeat(NOW).is_none());
    }
}
