//! Storage layer for the cellar store
//!
//! Two concerns live here:
//!
//! - the value-blob codec ([`codec`]): lossless, versioned conversion
//!   between `TypedArray` values and opaque byte blobs;
//! - the key-value engine seam ([`engine`]): the `KvEngine` trait the
//!   session layer programs against, plus `LogEngine`, the file-backed
//!   implementation.

pub mod codec;
pub mod engine;

pub use codec::{decode_value, encode_value, VALUE_FORMAT_VERSION, VALUE_MAGIC};
pub use engine::{EngineStat, KvEngine, LogEngine, LOG_FORMAT_VERSION, LOG_MAGIC};
