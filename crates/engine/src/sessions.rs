//! Session registry
//!
//! `Sessions` maps small integer session ids to open [`Database`]
//! connections and tracks which id is the "default" - the most recently
//! opened, or one explicitly selected. It is an owned object, not a
//! process-wide singleton: construct one, share it (it is `Send +
//! Sync`), and drop it to tear everything down.
//!
//! ## Locking
//!
//! One mutex guards the registry map, the id counter, and the default
//! id. It is held only for registry mutation and lookup; engine I/O
//! (opening a file, flushing on close) always happens outside it, so a
//! slow open never blocks lookups on other sessions.
//!
//! ## Default-id policy
//!
//! Opening a session makes its id the default. Closing the default
//! falls back to the highest remaining id - ids are monotonic, so that
//! is exactly the most recently opened remaining session - or unsets
//! the default when no session remains.

use crate::database::Database;
use cellar_core::{Error, Result, SessionId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Registry of open database sessions
pub struct Sessions {
    inner: Mutex<Registry>,
}

struct Registry {
    open: BTreeMap<SessionId, Arc<Database>>,
    default: Option<SessionId>,
    next_id: u64,
}

impl Sessions {
    /// Create an empty registry. Ids start at 1.
    pub fn new() -> Self {
        Sessions {
            inner: Mutex::new(Registry {
                open: BTreeMap::new(),
                default: None,
                next_id: 1,
            }),
        }
    }

    /// Open a database at `path` and register it under a fresh id.
    ///
    /// The new id becomes the default. `home_dir`, when given, is the
    /// engine's environment root. Fails with `Open` when the engine
    /// cannot create or attach to the file, or when `path` is empty;
    /// on failure the registry is untouched.
    pub fn open(&self, path: impl AsRef<Path>, home_dir: Option<&Path>) -> Result<SessionId> {
        // Engine I/O first, outside the registry lock
        let db = Arc::new(Database::open(path, home_dir)?);

        let id = {
            let mut registry = self.inner.lock();
            let id = SessionId::new(registry.next_id);
            registry.next_id += 1;
            registry.open.insert(id, db.clone());
            registry.default = Some(id);
            id
        };
        debug!(%id, path = %db.path().display(), "session opened");
        Ok(id)
    }

    /// Close the session for `id`, releasing its engine handle.
    ///
    /// If `id` was the default, the default falls back to the highest
    /// remaining id (the most recently opened remaining session), or
    /// becomes unset when no session remains. Fails with
    /// `SessionNotFound` when `id` is not open, with no side effects.
    pub fn close(&self, id: SessionId) -> Result<()> {
        let db = {
            let mut registry = self.inner.lock();
            let db = registry
                .open
                .remove(&id)
                .ok_or(Error::SessionNotFound(id))?;
            if registry.default == Some(id) {
                registry.default = registry.open.keys().next_back().copied();
            }
            db
        };
        debug!(%id, "session closed");
        // Engine flush/compact happens after the lock is released
        db.close()
    }

    /// The live connection for `id`, shared, without ownership transfer.
    pub fn get(&self, id: SessionId) -> Result<Arc<Database>> {
        let registry = self.inner.lock();
        registry
            .open
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    /// The current default id.
    ///
    /// Fails with `NoDefaultSession` when no session is open.
    pub fn default_id(&self) -> Result<SessionId> {
        let registry = self.inner.lock();
        registry.default.ok_or(Error::NoDefaultSession)
    }

    /// Explicitly select the default session.
    pub fn set_default(&self, id: SessionId) -> Result<()> {
        let mut registry = self.inner.lock();
        if !registry.open.contains_key(&id) {
            return Err(Error::SessionNotFound(id));
        }
        registry.default = Some(id);
        Ok(())
    }

    /// Resolve an optional id to a live connection.
    ///
    /// `None` means "the current default"; fails with
    /// `NoDefaultSession` when nothing is open, `SessionNotFound` for
    /// an explicit id that is not open.
    pub fn resolve(&self, id: Option<SessionId>) -> Result<Arc<Database>> {
        match id {
            Some(id) => self.get(id),
            None => {
                let registry = self.inner.lock();
                let default = registry.default.ok_or(Error::NoDefaultSession)?;
                // The default always names an open session
                Ok(registry.open[&default].clone())
            }
        }
    }

    /// Number of currently open sessions.
    pub fn open_count(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// True when no session is open.
    pub fn is_empty(&self) -> bool {
        self.open_count() == 0
    }

    /// Close every open session deterministically.
    ///
    /// Returns the first close failure, after attempting all of them.
    pub fn close_all(&self) -> Result<()> {
        let dbs: Vec<Arc<Database>> = {
            let mut registry = self.inner.lock();
            registry.default = None;
            std::mem::take(&mut registry.open).into_values().collect()
        };
        let mut first_err = None;
        for db in dbs {
            if let Err(e) = db.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}
