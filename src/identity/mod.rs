use serde::{Deserialize, Serialize};

/// Role tags that identity strings are prefixed with. Matching is
/// case-insensitive and the first matching prefix wins.
pub const TUTOR_TAG: &str = "tutor";
pub const STUDENT_TAG: &str = "student";
pub const OBSERVER_TAG: &str = "observer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tutor,
    Student,
    Observer,
    /// Identity matched no role tag. Rendered as a generic tile but
    /// excluded from role-specific behavior.
    Unknown,
}

/// Derive a participant's role from its transport identity string.
/// Deterministic, total, side-effect-free.
pub fn classify(identity: &str) -> Role {
    let lowered = identity.to_ascii_lowercase();
    if lowered.starts_with(TUTOR_TAG) {
        Role::Tutor
    } else if lowered.starts_with(STUDENT_TAG) {
        Role::Student
    } else if lowered.starts_with(OBSERVER_TAG) {
        Role::Observer
    } else {
        Role::Unknown
    }
}

pub fn is_tutor(identity: &str) -> bool {
    classify(identity) == Role::Tutor
}

pub fn is_student(identity: &str) -> bool {
    classify(identity) == Role::Student
}

pub fn is_observer(identity: &str) -> bool {
    classify(identity) == Role::Observer
}
