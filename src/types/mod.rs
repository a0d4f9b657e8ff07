//! Core types for Parley.

pub mod message;

pub use message::*;
