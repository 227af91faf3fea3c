//! Database connection
//!
//! A `Database` owns exactly one open engine connection and exposes the
//! typed key-value operations: get/put/delete/exists/stat/keys/values.
//! Key and value translation is delegated to the storage codec; the
//! byte-level work is delegated to the engine behind the `KvEngine`
//! trait.
//!
//! ## Error reporting
//!
//! Every operation returns a `Result`; failures carry a human-readable
//! message combining the engine's diagnostic with this layer's context
//! (operation, key where relevant). There is no mutable "last error"
//! slot, so a `Database` can be shared across threads behind an `Arc`
//! without a side-channel hazard.
//!
//! ## Absence semantics
//!
//! `get` and `exists` treat an absent key as a normal outcome. `delete`
//! is strict: deleting an absent key fails with `KeyNotFound`. This
//! asymmetry is a deliberate, tested part of the contract.

use cellar_core::{Error, Result, TypedArray};
use cellar_storage::{decode_value, encode_value, EngineStat, KvEngine, LogEngine};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One open connection to a key-value engine
///
/// Create with [`Database::open`] for the file-backed log engine, or
/// [`Database::with_engine`] to supply any other `KvEngine`.
pub struct Database {
    engine: Box<dyn KvEngine>,
    path: PathBuf,
}

impl Database {
    /// Open (or create) a database file at `path`.
    ///
    /// `home_dir`, when given, is the engine's environment root: it is
    /// created on demand and a relative `path` is resolved against it.
    /// Fails with `Open` when the engine cannot create or attach to the
    /// file, or when `path` is empty.
    pub fn open(path: impl AsRef<Path>, home_dir: Option<&Path>) -> Result<Self> {
        let engine = LogEngine::open(path, home_dir)?;
        let path = engine.path().to_path_buf();
        debug!(path = %path.display(), "database opened");
        Ok(Database {
            engine: Box::new(engine),
            path,
        })
    }

    /// Wrap an already-open engine connection.
    pub fn with_engine(engine: Box<dyn KvEngine>) -> Self {
        let path = engine.path().to_path_buf();
        Database { engine, path }
    }

    /// Path of the backing engine file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up `key` and decode the stored value.
    ///
    /// Absence is `Ok(None)`. A present blob that fails to decode is
    /// `CorruptValue`; genuine engine faults are `Engine`.
    pub fn get(&self, key: &[u8]) -> Result<Option<TypedArray>> {
        let blob = self
            .engine
            .get(key)
            .map_err(|e| engine_error("get", Some(key), e))?;
        match blob {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode_with_key_context(key, &bytes)?)),
        }
    }

    /// Encode `value` and write/overwrite the entry for `key`.
    ///
    /// Last write wins; there is no implicit merge.
    pub fn put(&self, key: &[u8], value: &TypedArray) -> Result<()> {
        let blob = encode_value(value)?;
        self.engine
            .put(key, &blob)
            .map_err(|e| engine_error("put", Some(key), e))
    }

    /// Remove the entry for `key`.
    ///
    /// Deleting an absent key fails with `KeyNotFound`; this is strict
    /// by contract, not silently idempotent.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let existed = self
            .engine
            .delete(key)
            .map_err(|e| engine_error("delete", Some(key), e))?;
        if !existed {
            return Err(Error::KeyNotFound(Error::display_key(key)));
        }
        Ok(())
    }

    /// Whether `key` is present. Absence is a normal outcome.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.engine
            .exists(key)
            .map_err(|e| engine_error("exists", Some(key), e))
    }

    /// Engine-reported aggregate counters.
    pub fn stat(&self) -> Result<EngineStat> {
        self.engine.stat().map_err(|e| engine_error("stat", None, e))
    }

    /// Every key currently stored, in the engine's native iteration
    /// order. A snapshot, fully materialized.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let entries = self
            .engine
            .scan()
            .map_err(|e| engine_error("keys", None, e))?;
        Ok(entries.into_iter().map(|(k, _)| k).collect())
    }

    /// Every stored value, decoded, in the same traversal order as
    /// [`keys`](Self::keys).
    ///
    /// Any entry whose blob fails to decode fails the whole call with
    /// `CorruptValue` naming the key; entries are never silently
    /// skipped.
    pub fn values(&self) -> Result<Vec<TypedArray>> {
        let entries = self
            .engine
            .scan()
            .map_err(|e| engine_error("values", None, e))?;
        entries
            .iter()
            .map(|(key, blob)| decode_with_key_context(key, blob))
            .collect()
    }

    /// Flush and release the engine deterministically.
    pub fn close(&self) -> Result<()> {
        debug!(path = %self.path.display(), "database closing");
        self.engine
            .close()
            .map_err(|e| engine_error("close", None, e))
    }
}

/// Decode a stored blob, naming the owning key on failure.
fn decode_with_key_context(key: &[u8], blob: &[u8]) -> Result<TypedArray> {
    decode_value(blob).map_err(|e| match e {
        Error::CorruptValue(msg) => Error::CorruptValue(format!(
            "key '{}': {}",
            Error::display_key(key),
            msg
        )),
        other => other,
    })
}

/// Wrap an opaque engine fault with operation and key context.
///
/// Errors that already carry their own meaning (corrupt value, key not
/// found) pass through untouched.
fn engine_error(op: &'static str, key: Option<&[u8]>, err: Error) -> Error {
    match err {
        e @ (Error::CorruptValue(_) | Error::KeyNotFound(_) | Error::Open { .. }) => e,
        other => {
            let message = match key {
                Some(k) => format!("{} (key '{}')", other, Error::display_key(k)),
                None => other.to_string(),
            };
            Error::Engine { op, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_core::ElementType;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("store.db"), None).unwrap();
        (dir, db)
    }

    #[test]
    fn test_open_empty_path_fails() {
        let result = Database::open("", None);
        assert!(matches!(result, Err(Error::Open { .. })));
    }

    #[test]
    fn test_open_with_home_dir() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("env");
        let db = Database::open("store.db", Some(&home)).unwrap();
        assert_eq!(db.path(), home.join("store.db"));
    }

    #[test]
    fn test_put_then_get() {
        let (_dir, db) = setup();
        let v = TypedArray::scalar_f64(3.14);
        db.put(b"x", &v).unwrap();
        assert_eq!(db.get(b"x").unwrap(), Some(v));
    }

    #[test]
    fn test_get_absent_is_none_not_error() {
        let (_dir, db) = setup();
        assert_eq!(db.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, db) = setup();
        db.put(b"k", &TypedArray::scalar_i64(1)).unwrap();
        db.put(b"k", &TypedArray::scalar_i64(2)).unwrap();
        assert_eq!(db.get(b"k").unwrap().unwrap().as_i64s(), Some(vec![2]));
    }

    #[test]
    fn test_delete_present_succeeds() {
        let (_dir, db) = setup();
        db.put(b"k", &TypedArray::scalar_bool(true)).unwrap();
        db.delete(b"k").unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_delete_absent_is_strict() {
        let (_dir, db) = setup();
        let err = db.delete(b"ghost").unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_delete_failure_leaves_state_consistent() {
        let (_dir, db) = setup();
        db.put(b"k", &TypedArray::scalar_i64(1)).unwrap();
        assert!(db.delete(b"other").is_err());
        // Subsequent calls operate normally
        assert!(db.exists(b"k").unwrap());
        db.delete(b"k").unwrap();
    }

    #[test]
    fn test_exists_before_and_after_put() {
        let (_dir, db) = setup();
        assert!(!db.exists(b"k").unwrap());
        db.put(b"k", &TypedArray::text("v")).unwrap();
        assert!(db.exists(b"k").unwrap());
    }

    #[test]
    fn test_stat_counts_entries() {
        let (_dir, db) = setup();
        assert_eq!(db.stat().unwrap().entries, 0);
        db.put(b"x", &TypedArray::scalar_f64(3.14)).unwrap();
        let stat = db.stat().unwrap();
        assert_eq!(stat.entries, 1);
        assert!(stat.disk_bytes > 0);
    }

    #[test]
    fn test_keys_and_values_aligned() {
        let (_dir, db) = setup();
        db.put(b"a", &TypedArray::scalar_i64(1)).unwrap();
        db.put(b"b", &TypedArray::scalar_i64(2)).unwrap();
        db.put(b"c", &TypedArray::scalar_i64(3)).unwrap();

        let keys = db.keys().unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let values = db.values().unwrap();
        let ints: Vec<i64> = values.iter().map(|v| v.as_i64s().unwrap()[0]).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn test_keys_empty_store() {
        let (_dir, db) = setup();
        assert!(db.keys().unwrap().is_empty());
        assert!(db.values().unwrap().is_empty());
    }

    #[test]
    fn test_values_corrupt_blob_fails_whole_call() {
        let dir = tempdir().unwrap();
        let engine = LogEngine::open(dir.path().join("store.db"), None).unwrap();
        engine
            .put(b"good", &encode_value(&TypedArray::scalar_i64(1)).unwrap())
            .unwrap();
        // Foreign-written bytes that are not a valid blob
        engine.put(b"bad", b"not a blob").unwrap();

        let db = Database::with_engine(Box::new(engine));
        let err = db.values().unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
        assert!(err.to_string().contains("bad"), "error should name the key");

        // get on the corrupt key reports the same class of failure
        assert!(matches!(db.get(b"bad"), Err(Error::CorruptValue(_))));
    }

    #[test]
    fn test_all_value_shapes_roundtrip() {
        let (_dir, db) = setup();
        let values = vec![
            TypedArray::scalar_f64(-0.5),
            TypedArray::from_f64s(&[1.0, 2.0, 3.0]),
            TypedArray::from_bools(&[true, false]),
            TypedArray::text("grüße"),
            TypedArray::opaque(vec![9, 8, 7]),
            TypedArray::new(ElementType::U16, vec![2, 2], vec![0, 1, 2, 3]).unwrap(),
            TypedArray::new(ElementType::I32, vec![0], vec![]).unwrap(),
        ];
        for (i, v) in values.iter().enumerate() {
            let key = format!("k{}", i);
            db.put(key.as_bytes(), v).unwrap();
            assert_eq!(db.get(key.as_bytes()).unwrap().as_ref(), Some(v));
        }
    }

    #[test]
    fn test_close_then_reopen_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let db = Database::open(&path, None).unwrap();
            db.put(b"k", &TypedArray::text("persisted")).unwrap();
            db.close().unwrap();
        }
        let db = Database::open(&path, None).unwrap();
        assert_eq!(
            db.get(b"k").unwrap().unwrap().as_text(),
            Some("persisted".to_string())
        );
    }
}
