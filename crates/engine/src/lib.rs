//! Session and connection layer for the cellar store
//!
//! [`Database`] wraps one open engine connection with typed key-value
//! operations; [`Sessions`] is the registry of open connections with
//! the default-id shortcut. Together they form the caller-facing
//! surface: open a session, operate by explicit id or via the default,
//! close when done.

pub mod database;
pub mod sessions;

pub use database::Database;
pub use sessions::Sessions;
