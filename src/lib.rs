//! Real-time session synchronization core for live tutoring rooms.
//!
//! One tutor, zero or more students and silent observers share a video
//! room, per-participant whiteboards and tutor-controlled audio routing.
//! This crate owns the protocol and state machines that keep every
//! client's view consistent: who is here, who may hear or speak, what is
//! drawn on each board, and which booking maps to which room. Media
//! encoding, transport reliability and booking CRUD live behind the
//! [`transport::Transport`] and [`directory::Directory`] seams.

pub mod booking;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod session;
pub mod transport;

pub use booking::{resolve, Booking, Caller, RoomAccess};
pub use config::Config;
pub use directory::{Directory, MemoryDirectory, SessionSnapshot, UserProfile};
pub use error::{Result, SyncError};
pub use identity::{classify, Role};
pub use session::{
    DataMessage, RoomMode, SessionClient, SessionState, Stroke, Tile, TutorStatus, Viewer,
};
pub use transport::{
    ConnectOptions, LoopbackTransport, RoomSession, TrackKind, Transport, TransportEvent,
};
