//! Cellar - persistent multi-session key-value store
//!
//! Cellar exposes one or more concurrently open database handles, each
//! wrapping a file-backed key-value engine, with dynamically typed
//! multi-dimensional array values marshalled through a versioned codec.
//!
//! # Quick Start
//!
//! ```no_run
//! use cellar::{Sessions, TypedArray};
//!
//! # fn main() -> cellar::Result<()> {
//! let sessions = Sessions::new();
//!
//! // Open a store; the new session becomes the default
//! let id = sessions.open("store.db", None)?;
//!
//! // Store and retrieve a typed value
//! let db = sessions.get(id)?;
//! db.put(b"x", &TypedArray::scalar_f64(3.14))?;
//! let value = db.get(b"x")?;
//!
//! sessions.close(id)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `cellar-core`: typed-array value model, session ids, errors
//! - `cellar-storage`: value-blob codec and the `KvEngine` seam with
//!   its file-backed log implementation
//! - `cellar-engine`: `Database` connections and the `Sessions`
//!   registry

pub use cellar_core::{ElementType, Error, Result, SessionId, TypedArray};
pub use cellar_engine::{Database, Sessions};
pub use cellar_storage::{decode_value, encode_value, EngineStat, KvEngine, LogEngine};
