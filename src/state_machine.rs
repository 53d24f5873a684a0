//! Per-user dialog state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod payload;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Reply};
pub use event::{DialogCommand, Event};
pub use state::{DialogContext, DialogState};
pub use transition::{transition, TransitionError, NOT_UNDERSTOOD, NO_IMPORT_IN_PROGRESS};
