//! The Game Session Engine (one actor per in-progress game) and the Event
//! Bus each session carries. See [`crate::registry`] for the collection
//! that creates, looks up, and retires these actors.

mod actor;
mod commands;
mod events;
mod handle;
mod snapshot;
mod state;

pub use actor::SessionActor;
pub use commands::SessionError;
pub use events::{SessionEvent, SessionEventKind, SubscribeOutcome};
pub use handle::SessionHandle;
pub use snapshot::{DrawOffer, EndReason, FsmState, GameResult, MoveRecord, SessionSnapshot};
