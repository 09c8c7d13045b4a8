use std::collections::HashMap;
use serde::Serialize;

use crate::identity::{classify, Role};
use crate::transport::TrackKind;

#[derive(Debug, Clone)]
pub struct TrackPublication {
    pub sid: String,
    pub kind: TrackKind,
    pub subscribed: bool,
}

/// Live participant. Role is derived from the identity prefix on creation,
/// never stored externally; the whole record dies with the leave event.
#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: String,
    pub display_name: String,
    pub role: Role,
    pub is_local: bool,
    pub tracks: Vec<TrackPublication>,
}

/// The live set of participants and their publications.
#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, identity: &str, display_name: &str, is_local: bool) {
        self.participants
            .entry(identity.to_string())
            .or_insert_with(|| Participant {
                identity: identity.to_string(),
                display_name: display_name.to_string(),
                role: classify(identity),
                is_local,
                tracks: Vec::new(),
            });
    }

    pub fn remove(&mut self, identity: &str) -> Option<Participant> {
        self.participants.remove(identity)
    }

    pub fn participant(&self, identity: &str) -> Option<&Participant> {
        self.participants.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.participants.contains_key(identity)
    }

    pub fn add_track(&mut self, identity: &str, sid: &str, kind: TrackKind) {
        if let Some(p) = self.participants.get_mut(identity) {
            if !p.tracks.iter().any(|t| t.sid == sid) {
                p.tracks.push(TrackPublication {
                    sid: sid.to_string(),
                    kind,
                    subscribed: false,
                });
            }
        }
    }

    pub fn remove_track(&mut self, identity: &str, sid: &str) {
        if let Some(p) = self.participants.get_mut(identity) {
            p.tracks.retain(|t| t.sid != sid);
        }
    }

    pub fn set_track_subscribed(&mut self, sid: &str, subscribed: bool) {
        for p in self.participants.values_mut() {
            for t in p.tracks.iter_mut() {
                if t.sid == sid {
                    t.subscribed = subscribed;
                }
            }
        }
    }

    pub fn track_subscribed(&self, sid: &str) -> Option<bool> {
        self.participants
            .values()
            .flat_map(|p| p.tracks.iter())
            .find(|t| t.sid == sid)
            .map(|t| t.subscribed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn student_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.role == Role::Student)
            .count()
    }

    pub fn student_identities(&self) -> Vec<String> {
        let mut students: Vec<String> = self
            .participants
            .values()
            .filter(|p| p.role == Role::Student)
            .map(|p| p.identity.clone())
            .collect();
        students.sort();
        students
    }

    /// First remote tutor identity, if any. Used by the best-effort
    /// one-tutor post-join check.
    pub fn remote_tutor(&self) -> Option<&str> {
        self.participants
            .values()
            .find(|p| p.role == Role::Tutor && !p.is_local)
            .map(|p| p.identity.as_str())
    }

    /// Remote audio publications as (owner identity, track sid) pairs.
    pub fn remote_audio_tracks(&self) -> Vec<(&str, &str)> {
        self.participants
            .values()
            .filter(|p| !p.is_local)
            .flat_map(|p| {
                p.tracks
                    .iter()
                    .filter(|t| t.kind == TrackKind::Audio)
                    .map(move |t| (p.identity.as_str(), t.sid.as_str()))
            })
            .collect()
    }
}

/// Which client is looking. Admin views see observers and order tutor-first
/// with no local bias; tutor and student views never see observers at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Tutor,
    Student,
    Observer,
    Admin,
}

/// One presentation unit: a published camera feed, or a placeholder when
/// the participant has no camera track.
#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    pub identity: String,
    pub display_name: String,
    pub role: Role,
    pub is_local: bool,
    /// None renders as a placeholder.
    pub track_sid: Option<String>,
}

/// Recompute the tile list from scratch. No incremental patching: every
/// roster-mutating event rebuilds the whole presentation.
pub fn compose_tiles(roster: &Roster, viewer: Viewer) -> Vec<Tile> {
    let mut tiles: Vec<Tile> = Vec::new();

    for p in roster.iter() {
        if p.role == Role::Observer && viewer != Viewer::Admin {
            continue;
        }

        let cameras: Vec<&TrackPublication> = p
            .tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Video)
            .collect();

        if cameras.is_empty() {
            tiles.push(Tile {
                identity: p.identity.clone(),
                display_name: p.display_name.clone(),
                role: p.role,
                is_local: p.is_local,
                track_sid: None,
            });
        } else {
            for cam in cameras {
                tiles.push(Tile {
                    identity: p.identity.clone(),
                    display_name: p.display_name.clone(),
                    role: p.role,
                    is_local: p.is_local,
                    track_sid: Some(cam.sid.clone()),
                });
            }
        }
    }

    tiles.sort_by(|a, b| tile_order(a, viewer).cmp(&tile_order(b, viewer)));
    tiles
}

fn role_rank(role: Role) -> u8 {
    match role {
        Role::Tutor => 0,
        Role::Student => 1,
        Role::Unknown => 2,
        Role::Observer => 3,
    }
}

fn tile_order(tile: &Tile, viewer: Viewer) -> (u8, u8, String, String) {
    // among tutors, a non-admin viewer prefers its own tile; admin views
    // apply no local bias
    let local_bias = match viewer {
        Viewer::Admin => 0,
        _ if tile.role == Role::Tutor && tile.is_local => 0,
        _ if tile.role == Role::Tutor => 1,
        _ => 0,
    };
    (
        role_rank(tile.role),
        local_bias,
        tile.display_name.clone(),
        tile.identity.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(parts: &[(&str, &str, bool)]) -> Roster {
        let mut roster = Roster::new();
        for (identity, name, is_local) in parts {
            roster.upsert(identity, name, *is_local);
        }
        roster
    }

    #[test]
    fn test_observer_invisible_to_tutor_and_student_views() {
        let roster = roster_with(&[
            ("tutor_anna", "Anna", true),
            ("student_john", "John", false),
            ("observer_x", "Watcher", false),
        ]);

        for viewer in [Viewer::Tutor, Viewer::Student, Viewer::Observer] {
            let tiles = compose_tiles(&roster, viewer);
            assert!(
                tiles.iter().all(|t| t.identity != "observer_x"),
                "observer leaked into {viewer:?} view"
            );
        }
    }

    #[test]
    fn test_admin_view_includes_observers() {
        let roster = roster_with(&[
            ("tutor_anna", "Anna", false),
            ("observer_x", "Watcher", false),
        ]);
        let tiles = compose_tiles(&roster, Viewer::Admin);
        assert!(tiles.iter().any(|t| t.identity == "observer_x"));
    }

    #[test]
    fn test_tutor_first_then_students_by_name() {
        let roster = roster_with(&[
            ("student_zoe", "Zoe", false),
            ("student_adam", "Adam", false),
            ("tutor_anna", "Anna", false),
            ("guest_7", "Guest", false),
        ]);
        let tiles = compose_tiles(&roster, Viewer::Student);
        let order: Vec<&str> = tiles.iter().map(|t| t.identity.as_str()).collect();
        assert_eq!(
            order,
            vec!["tutor_anna", "student_adam", "student_zoe", "guest_7"]
        );
    }

    #[test]
    fn test_local_tutor_tile_beats_remote_tutor() {
        // should not happen under the one-tutor invariant, but the ordering
        // contract still prefers the local tile for non-admin viewers
        let mut roster = roster_with(&[
            ("tutor_bob", "Bob", false),
            ("tutor_anna", "Anna", true),
        ]);
        roster.upsert("student_john", "John", false);

        let tiles = compose_tiles(&roster, Viewer::Tutor);
        assert_eq!(tiles[0].identity, "tutor_anna");

        // admin ordering ignores the local bias: plain name order
        let tiles = compose_tiles(&roster, Viewer::Admin);
        assert_eq!(tiles[0].identity, "tutor_anna");
        assert_eq!(tiles[1].identity, "tutor_bob");
    }

    #[test]
    fn test_one_tile_per_camera_track() {
        let mut roster = roster_with(&[("student_john", "John", false)]);
        roster.add_track("student_john", "cam-1", TrackKind::Video);
        roster.add_track("student_john", "cam-2", TrackKind::Video);
        roster.add_track("student_john", "mic-1", TrackKind::Audio);

        let tiles = compose_tiles(&roster, Viewer::Tutor);
        assert_eq!(tiles.len(), 2);
        assert!(tiles.iter().all(|t| t.track_sid.is_some()));
    }

    #[test]
    fn test_placeholder_tile_without_camera() {
        let mut roster = roster_with(&[("student_john", "John", false)]);
        roster.add_track("student_john", "mic-1", TrackKind::Audio);

        let tiles = compose_tiles(&roster, Viewer::Tutor);
        assert_eq!(tiles.len(), 1);
        assert!(tiles[0].track_sid.is_none());
    }

    #[test]
    fn test_remote_tutor_detection() {
        let roster = roster_with(&[
            ("tutor_anna", "Anna", true),
            ("student_john", "John", false),
        ]);
        assert_eq!(roster.remote_tutor(), None);

        let roster = roster_with(&[
            ("tutor_anna", "Anna", true),
            ("tutor_bob", "Bob", false),
        ]);
        assert_eq!(roster.remote_tutor(), Some("tutor_bob"));
    }

    #[test]
    fn test_student_count_ignores_others() {
        let roster = roster_with(&[
            ("tutor_anna", "Anna", true),
            ("student_john", "John", false),
            ("observer_x", "Watcher", false),
            ("guest_7", "Guest", false),
        ]);
        assert_eq!(roster.student_count(), 1);
    }
}
