use serde::{Deserialize, Serialize};

/// Join context declared by the tutor before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    /// Open drop-in room, any eligible student may come and go.
    Homework,
    /// Single booked student; the mode carries a booking id.
    Session,
}

/// Externally visible tutor availability, written to the Directory for
/// discovery pages. Derived state, never set by students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorStatus {
    Offline,
    Waiting,
    Busy,
}

/// Derive the tutor's status while connected to a room.
///
/// Session mode pins the status to Busy for the whole session regardless of
/// occupancy. Homework mode tracks occupancy: Waiting with no students,
/// Busy with at least one. Offline is handled by the disconnect path, not
/// here.
pub fn derive_status(mode: RoomMode, student_count: usize) -> TutorStatus {
    match mode {
        RoomMode::Session => TutorStatus::Busy,
        RoomMode::Homework => {
            if student_count > 0 {
                TutorStatus::Busy
            } else {
                TutorStatus::Waiting
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_mode_is_always_busy() {
        assert_eq!(derive_status(RoomMode::Session, 0), TutorStatus::Busy);
        assert_eq!(derive_status(RoomMode::Session, 3), TutorStatus::Busy);
    }

    #[test]
    fn test_homework_mode_tracks_occupancy() {
        assert_eq!(derive_status(RoomMode::Homework, 0), TutorStatus::Waiting);
        assert_eq!(derive_status(RoomMode::Homework, 1), TutorStatus::Busy);
        assert_eq!(derive_status(RoomMode::Homework, 2), TutorStatus::Busy);
    }
}
