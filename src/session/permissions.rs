use std::collections::HashMap;

use crate::identity::{classify, Role};

/// Per-student hear/speak pair. `hear` gates student-hears-tutor, `speak`
/// gates tutor-hears-student. Both default to false at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionEntry {
    pub hear: bool,
    pub speak: bool,
}

/// Tutor-authored permission ledger, replicated to every client via `perm`
/// broadcasts. Students and observers are read-only consumers.
#[derive(Debug, Default)]
pub struct PermissionLedger {
    entries: HashMap<String, PermissionEntry>,
}

impl PermissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, student_id: &str) -> PermissionEntry {
        self.entries.get(student_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, student_id: &str, hear: bool, speak: bool) {
        self.entries
            .insert(student_id.to_string(), PermissionEntry { hear, speak });
    }
}

/// Compute the audio tracks this client should be subscribed to.
///
/// This is a pure desired-state function of (local role, ledger, available
/// tracks), which is what makes apply-hearing idempotent: track-available
/// and permission-update events may arrive in either order and every
/// re-evaluation converges to the same subscription set.
///
/// Unconditional rules sit above the ledger: students never hear other
/// students, observers subscribe to nothing.
pub fn desired_subscriptions<'a>(
    local_role: Role,
    local_identity: &str,
    ledger: &PermissionLedger,
    audio_tracks: impl Iterator<Item = (&'a str, &'a str)>,
) -> Vec<(String, bool)> {
    audio_tracks
        .filter(|(owner, _)| *owner != local_identity)
        .map(|(owner, sid)| {
            let wanted = match (local_role, classify(owner)) {
                (Role::Tutor, Role::Student) => ledger.get(owner).speak,
                (Role::Student, Role::Tutor) => ledger.get(local_identity).hear,
                _ => false,
            };
            (sid.to_string(), wanted)
        })
        .collect()
}
