//! Shared domain types for the colloquy runtime.
//!
//! Everything other crates agree on lives here: the message model, the
//! streaming event vocabulary, observer events, the shutdown flag, the
//! error taxonomy, and the deserialized configuration tree.

pub mod config;
pub mod error;
pub mod message;
pub mod observe;
pub mod shutdown;
pub mod stream;
