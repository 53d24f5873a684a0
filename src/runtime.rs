//! Runtime for driving dialogs
//!
//! The dispatcher owns the per-user sessions and performs the I/O the pure
//! state machine asks for, through the traits in [`traits`].

mod command;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::Dispatcher;
pub use traits::*;
