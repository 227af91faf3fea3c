//! Key-value engine trait definitions.

mod log;

pub use log::{LogEngine, LOG_FORMAT_VERSION, LOG_MAGIC};

use cellar_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Byte-oriented key-value engine.
///
/// The engine is a black box to everything above it: an ordered or
/// hashed store offering point operations, aggregate statistics, and a
/// full forward scan. Values are opaque blobs; the engine never
/// interprets them. Durability is the engine's own concern.
///
/// # Thread Safety
///
/// Engines must be `Send + Sync`; a single connection may be shared
/// across threads behind an `Arc`.
pub trait KvEngine: Send + Sync {
    /// Look up a key. Absence is `Ok(None)`, not an error.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write or overwrite an entry. Last write wins.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove an entry. Returns `false` when the key was absent.
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Whether a key is present.
    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// Engine-reported aggregate counters, without traversing entries.
    fn stat(&self) -> Result<EngineStat>;

    /// Snapshot of every entry, in the engine's native iteration order.
    fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Flush buffered writes to the backing file.
    fn flush(&self) -> Result<()>;

    /// Flush and release the backing file deterministically.
    ///
    /// Idempotent; the engine remains usable afterwards but callers
    /// should treat close as the end of the connection's life.
    fn close(&self) -> Result<()>;

    /// Path of the backing file.
    fn path(&self) -> &Path;
}

/// Aggregate counters reported by [`KvEngine::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStat {
    /// Number of live entries
    pub entries: u64,
    /// Size of the backing file on disk, in bytes
    pub disk_bytes: u64,
    /// Total bytes of live keys
    pub key_bytes: u64,
    /// Total bytes of live values
    pub value_bytes: u64,
    /// Log records superseded by later writes or deletes
    pub dead_records: u64,
}
