//! Caller-side conversation runtime
//!
//! The engine only declares which tools a state needs. This module is the
//! loop that feeds user messages through an interpreter, runs the declared
//! tools and hands their output back as context updates.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, RuntimeError, Turn};
pub use traits::*;
