use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::booking::Booking;
use crate::identity::Role;
use crate::session::status::{RoomMode, TutorStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub role: Role,
    pub display_name: String,
    pub room_id: Option<String>,
}

/// Full-state presence snapshot for a room, overwritten on every update so
/// re-entrant writers stay safe without locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub students: Vec<String>,
    pub students_count: usize,
    pub updated_at: i64,
}

/// Identity/booking/session persistence collaborator.
///
/// All writes are full-document merges or overwrites, never deltas; the
/// core relies on that to make redundant writes from re-entered handlers
/// harmless.
#[allow(async_fn_in_trait)]
pub trait Directory {
    async fn get_user_profile(&self, uid: &str) -> Option<UserProfile>;

    /// Direct lookup by document key.
    async fn get_booking(&self, key: &str) -> Option<Booking>;

    /// Field query by `normalized_id`, ordered by `start_time` descending.
    async fn find_bookings_by_normalized_id(&self, normalized_id: &str) -> Vec<Booking>;

    async fn set_tutor_status(&self, uid: &str, status: TutorStatus);

    async fn set_room_mode(&self, uid: &str, mode: RoomMode, booking_id: Option<String>);

    async fn clear_room_mode(&self, uid: &str);

    async fn write_session_snapshot(&self, room_id: &str, snapshot: SessionSnapshot);
}

#[derive(Default)]
struct MemoryDirectoryInner {
    profiles: HashMap<String, UserProfile>,
    bookings: HashMap<String, Booking>,
    statuses: HashMap<String, TutorStatus>,
    room_modes: HashMap<String, (RoomMode, Option<String>)>,
    snapshots: HashMap<String, SessionSnapshot>,
}

/// In-memory Directory used by tests and the local simulation driver.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<RwLock<MemoryDirectoryInner>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, uid: impl Into<String>, profile: UserProfile) {
        let mut inner = self.inner.write().await;
        inner.profiles.insert(uid.into(), profile);
    }

    /// Seed a booking under an explicit document key (keys and booking ids
    /// can differ, e.g. composite `<id>_<startMs>` documents).
    pub async fn insert_booking_at(&self, key: impl Into<String>, booking: Booking) {
        let mut inner = self.inner.write().await;
        inner.bookings.insert(key.into(), booking);
    }

    pub async fn insert_booking(&self, booking: Booking) {
        let key = booking.id.clone();
        self.insert_booking_at(key, booking).await;
    }

    pub async fn tutor_status(&self, uid: &str) -> Option<TutorStatus> {
        let inner = self.inner.read().await;
        inner.statuses.get(uid).copied()
    }

    pub async fn room_mode(&self, uid: &str) -> Option<(RoomMode, Option<String>)> {
        let inner = self.inner.read().await;
        inner.room_modes.get(uid).cloned()
    }

    pub async fn snapshot(&self, room_id: &str) -> Option<SessionSnapshot> {
        let inner = self.inner.read().await;
        inner.snapshots.get(room_id).cloned()
    }
}

impl Directory for MemoryDirectory {
    async fn get_user_profile(&self, uid: &str) -> Option<UserProfile> {
        let inner = self.inner.read().await;
        inner.profiles.get(uid).cloned()
    }

    async fn get_booking(&self, key: &str) -> Option<Booking> {
        let inner = self.inner.read().await;
        inner.bookings.get(key).cloned()
    }

    async fn find_bookings_by_normalized_id(&self, normalized_id: &str) -> Vec<Booking> {
        let inner = self.inner.read().await;
        let mut hits: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.normalized_id == normalized_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.start_time_ms.cmp(&a.start_time_ms));
        hits
    }

    async fn set_tutor_status(&self, uid: &str, status: TutorStatus) {
        let mut inner = self.inner.write().await;
        inner.statuses.insert(uid.to_string(), status);
        tracing::debug!(uid = %uid, status = ?status, "Tutor status written");
    }

    async fn set_room_mode(&self, uid: &str, mode: RoomMode, booking_id: Option<String>) {
        let mut inner = self.inner.write().await;
        inner.room_modes.insert(uid.to_string(), (mode, booking_id));
    }

    async fn clear_room_mode(&self, uid: &str) {
        let mut inner = self.inner.write().await;
        inner.room_modes.remove(uid);
    }

    async fn write_session_snapshot(&self, room_id: &str, snapshot: SessionSnapshot) {
        let mut inner = self.inner.write().await;
        inner.snapshots.insert(room_id.to_string(), snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(id: &str, start: i64) -> Booking {
        Booking {
            id: id.to_string(),
            normalized_id: id.to_string(),
            tutor_id: "tutor_anna".to_string(),
            student_id: None,
            start_time_ms: start,
            duration_min: 60,
        }
    }

    #[tokio::test]
    async fn test_field_query_orders_by_start_time_descending() {
        let dir = MemoryDirectory::new();
        dir.insert_booking_at("a", booking("B17", 100)).await;
        dir.insert_booking_at("b", booking("B17", 300)).await;
        dir.insert_booking_at("c", booking("B17", 200)).await;

        let hits = dir.find_bookings_by_normalized_id("B17").await;
        let starts: Vec<i64> = hits.iter().map(|b| b.start_time_ms).collect();
        assert_eq!(starts, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_snapshot_is_full_overwrite() {
        let dir = MemoryDirectory::new();
        dir.write_session_snapshot(
            "room1",
            SessionSnapshot {
                active: true,
                students: vec!["student_a".to_string()],
                students_count: 1,
                updated_at: 10,
            },
        )
        .await;
        dir.write_session_snapshot(
            "room1",
            SessionSnapshot {
                active: true,
                students: vec![],
                students_count: 0,
                updated_at: 20,
            },
        )
        .await;

        let snap = dir.snapshot("room1").await.unwrap();
        assert_eq!(snap.students_count, 0);
        assert!(snap.students.is_empty());
        assert_eq!(snap.updated_at, 20);
    }

    #[tokio::test]
    async fn test_room_mode_roundtrip_and_clear() {
        let dir = MemoryDirectory::new();
        dir.set_room_mode("tutor_anna", RoomMode::Session, Some("B17".to_string()))
            .await;
        assert_eq!(
            dir.room_mode("tutor_anna").await,
            Some((RoomMode::Session, Some("B17".to_string())))
        );

        dir.clear_room_mode("tutor_anna").await;
        assert_eq!(dir.room_mode("tutor_anna").await, None);
    }
}
