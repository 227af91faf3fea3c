//! Core contract types for the cellar store
//!
//! This crate holds the types shared by every layer: the typed-array
//! value model, session identifiers, and the error taxonomy. It has no
//! I/O; the storage and engine crates build on it.

pub mod array;
pub mod error;
pub mod types;

pub use array::{ElementType, TypedArray};
pub use error::{Error, Result};
pub use types::SessionId;
