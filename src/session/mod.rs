pub mod client;
pub mod messages;
pub mod permissions;
pub mod roster;
pub mod state;
pub mod status;
pub mod whiteboard;

pub use client::SessionClient;
pub use messages::DataMessage;
pub use roster::{compose_tiles, Roster, Tile, Viewer};
pub use state::{Effect, SessionState};
pub use status::{derive_status, RoomMode, TutorStatus};
pub use whiteboard::{BoardStore, Point, Stroke};
