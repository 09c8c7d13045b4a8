use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::identity::Role;

/// A point in normalized board space, both axes in [0, 1] so boards stay
/// resolution-independent across clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One committed pen stroke. Immutable once committed; boards are
/// append-only logs of these until a clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub color: String,
    pub size_px: f64,
    pub points: Vec<Point>,
}

/// Per-author ordered stroke logs, keyed by owner identity. A board exists
/// (possibly empty) for every identity ever referenced; materialized lazily.
#[derive(Debug, Default)]
pub struct BoardStore {
    boards: HashMap<String, Vec<Stroke>>,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_board(&mut self, author: &str) -> &mut Vec<Stroke> {
        self.boards.entry(author.to_string()).or_default()
    }

    /// Append a remote or local stroke. No dedupe: the sender is trusted to
    /// broadcast each drawn stroke exactly once.
    pub fn append(&mut self, author: &str, stroke: Stroke) {
        self.ensure_board(author).push(stroke);
    }

    /// Wholesale replace, used to catch up a newcomer or resolve divergence.
    pub fn replace(&mut self, author: &str, strokes: Vec<Stroke>) {
        *self.ensure_board(author) = strokes;
    }

    pub fn clear(&mut self, author: &str) {
        self.ensure_board(author).clear();
    }

    pub fn strokes(&self, author: &str) -> &[Stroke] {
        self.boards.get(author).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self, author: &str) -> bool {
        self.strokes(author).is_empty()
    }

    pub fn authors(&self) -> impl Iterator<Item = &str> {
        self.boards.keys().map(String::as_str)
    }
}

/// Send-side authority gate. Trust-based: every client checks this before
/// emitting a mutating message, but accepts remote mutations
/// unconditionally (single-writer relies on UI-level gating, not
/// verification).
pub fn can_mutate(local_role: Role, local_identity: &str, author: &str) -> bool {
    match local_role {
        Role::Tutor => true,
        Role::Student => local_identity == author,
        Role::Observer | Role::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(color: &str) -> Stroke {
        Stroke {
            color: color.to_string(),
            size_px: 4.0,
            points: vec![Point { x: 0.1, y: 0.2 }, Point { x: 0.3, y: 0.4 }],
        }
    }

    #[test]
    fn test_board_materialized_lazily() {
        let mut store = BoardStore::new();
        assert!(store.strokes("student_john").is_empty());
        store.ensure_board("student_john");
        assert!(store.authors().any(|a| a == "student_john"));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = BoardStore::new();
        store.append("student_john", stroke("red"));
        store.append("student_john", stroke("blue"));
        let colors: Vec<&str> = store
            .strokes("student_john")
            .iter()
            .map(|s| s.color.as_str())
            .collect();
        assert_eq!(colors, vec!["red", "blue"]);
    }

    #[test]
    fn test_replace_and_clear() {
        let mut store = BoardStore::new();
        store.append("student_john", stroke("red"));
        store.replace("student_john", vec![stroke("green"), stroke("blue")]);
        assert_eq!(store.strokes("student_john").len(), 2);

        store.clear("student_john");
        assert!(store.is_empty("student_john"));
        // the board itself survives the clear
        assert!(store.authors().any(|a| a == "student_john"));
    }

    #[test]
    fn test_authority_matrix() {
        // tutor may mutate any board
        assert!(can_mutate(Role::Tutor, "tutor_anna", "tutor_anna"));
        assert!(can_mutate(Role::Tutor, "tutor_anna", "student_john"));

        // student only their own
        assert!(can_mutate(Role::Student, "student_john", "student_john"));
        assert!(!can_mutate(Role::Student, "student_john", "student_kate"));
        assert!(!can_mutate(Role::Student, "student_john", "tutor_anna"));

        // observers and unknowns never
        assert!(!can_mutate(Role::Observer, "observer_1", "observer_1"));
        assert!(!can_mutate(Role::Unknown, "guest_1", "guest_1"));
    }
}
