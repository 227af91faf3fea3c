//! Append-only log engine
//!
//! `LogEngine` keeps every live entry in an in-memory sorted index and
//! persists mutations to an append-only record log. Reopening replays
//! the log to rebuild the index.
//!
//! # File structure
//!
//! ```text
//! +------------------+ 0
//! | Magic "CLRL"     | 4 bytes
//! | Format version   | u32
//! +------------------+ 8
//! | Record 1         |
//! | Record 2         |
//! | ...              |
//! +------------------+
//! ```
//!
//! Each record is `crc32 (u32) | kind (u8) | key_len (u32) |
//! value_len (u32) | key | value`, little-endian. The CRC covers
//! everything after itself. A truncated final record is a crash
//! artifact: replay drops it, truncates the file, and continues. A CRC
//! mismatch anywhere else is corruption and fails the open.
//!
//! Iteration order is key-sorted; that is this engine's native order
//! for `scan`.

use byteorder::{LittleEndian, WriteBytesExt};
use cellar_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{EngineStat, KvEngine};

/// Magic bytes at the start of every log file
pub const LOG_MAGIC: [u8; 4] = *b"CLRL";

/// Current log format version
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Log file header size in bytes
const LOG_HEADER_SIZE: usize = 8;

/// Fixed part of a record after the CRC: kind + key_len + value_len
const RECORD_FIXED_SIZE: usize = 9;

const RECORD_PUT: u8 = 1;
const RECORD_DELETE: u8 = 2;

/// File-backed key-value engine over an append-only record log
pub struct LogEngine {
    path: PathBuf,
    inner: Mutex<LogInner>,
}

struct LogInner {
    index: BTreeMap<Vec<u8>, Vec<u8>>,
    writer: BufWriter<File>,
    dead_records: u64,
}

impl LogEngine {
    /// Open or create a log engine backed by `path`.
    ///
    /// When `home_dir` is given it acts as the engine's environment
    /// root: it is created on demand and a relative `path` is resolved
    /// against it. An empty `path` fails with `Open`.
    pub fn open(path: impl AsRef<Path>, home_dir: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::Open {
                path: String::new(),
                reason: "path is empty".to_string(),
            });
        }

        let resolved = match home_dir {
            Some(home) if !home.as_os_str().is_empty() => {
                fs::create_dir_all(home).map_err(|e| open_error(path, &e))?;
                if path.is_relative() {
                    home.join(path)
                } else {
                    path.to_path_buf()
                }
            }
            _ => path.to_path_buf(),
        };

        let (index, dead_records) = if resolved.exists() {
            Self::replay(&resolved)?
        } else {
            let file = File::create(&resolved).map_err(|e| open_error(path, &e))?;
            let mut w = BufWriter::new(file);
            write_header(&mut w).map_err(|e| open_error(path, &e))?;
            w.flush().map_err(|e| open_error(path, &e))?;
            (BTreeMap::new(), 0)
        };

        let file = OpenOptions::new()
            .append(true)
            .open(&resolved)
            .map_err(|e| open_error(path, &e))?;

        debug!(
            path = %resolved.display(),
            entries = index.len(),
            dead_records,
            "log engine opened"
        );

        Ok(LogEngine {
            path: resolved,
            inner: Mutex::new(LogInner {
                index,
                writer: BufWriter::new(file),
                dead_records,
            }),
        })
    }

    /// Replay an existing log file into a fresh index.
    ///
    /// Truncates a torn tail record; fails on header or CRC corruption.
    fn replay(path: &Path) -> Result<(BTreeMap<Vec<u8>, Vec<u8>>, u64)> {
        let bytes = fs::read(path).map_err(|e| open_error(path, &e))?;

        if bytes.is_empty() {
            // Zero-byte file: treat as freshly created
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| open_error(path, &e))?;
            let mut w = BufWriter::new(file);
            write_header(&mut w).map_err(|e| open_error(path, &e))?;
            w.flush().map_err(|e| open_error(path, &e))?;
            return Ok((BTreeMap::new(), 0));
        }

        if bytes.len() < LOG_HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "log file {} is {} bytes, shorter than the header",
                path.display(),
                bytes.len()
            )));
        }
        if bytes[0..4] != LOG_MAGIC {
            return Err(Error::Corruption(format!(
                "log file {} has bad magic {:02X?}",
                path.display(),
                &bytes[0..4]
            )));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().expect("length checked"));
        if version > LOG_FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "log format version {} is newer than supported version {}",
                version, LOG_FORMAT_VERSION
            )));
        }

        let mut index = BTreeMap::new();
        let mut dead_records = 0u64;
        let mut pos = LOG_HEADER_SIZE;
        let mut good_end = LOG_HEADER_SIZE;

        while pos < bytes.len() {
            if pos + 4 + RECORD_FIXED_SIZE > bytes.len() {
                break; // torn tail
            }
            let crc = u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("length checked"));
            let kind = bytes[pos + 4];
            let key_len =
                u32::from_le_bytes(bytes[pos + 5..pos + 9].try_into().expect("length checked"))
                    as usize;
            let value_len =
                u32::from_le_bytes(bytes[pos + 9..pos + 13].try_into().expect("length checked"))
                    as usize;

            let body_len = RECORD_FIXED_SIZE + key_len + value_len;
            let Some(record_end) = pos.checked_add(4 + body_len) else {
                break;
            };
            if record_end > bytes.len() {
                break; // torn tail
            }

            let body = &bytes[pos + 4..record_end];
            if crc32fast::hash(body) != crc {
                return Err(Error::Corruption(format!(
                    "log record at offset {} in {} fails its checksum",
                    pos,
                    path.display()
                )));
            }

            let key = &body[RECORD_FIXED_SIZE..RECORD_FIXED_SIZE + key_len];
            match kind {
                RECORD_PUT => {
                    let value = &body[RECORD_FIXED_SIZE + key_len..];
                    if index.insert(key.to_vec(), value.to_vec()).is_some() {
                        dead_records += 1;
                    }
                }
                RECORD_DELETE => {
                    // The delete record itself is dead weight, plus the
                    // put it cancels when one existed
                    dead_records += 1;
                    if index.remove(key).is_some() {
                        dead_records += 1;
                    }
                }
                other => {
                    return Err(Error::Corruption(format!(
                        "log record at offset {} in {} has unknown kind {}",
                        pos,
                        path.display(),
                        other
                    )));
                }
            }

            pos = record_end;
            good_end = pos;
        }

        if good_end < bytes.len() {
            warn!(
                path = %path.display(),
                dropped = bytes.len() - good_end,
                "dropping torn tail record from log"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| open_error(path, &e))?;
            file.set_len(good_end as u64)
                .map_err(|e| open_error(path, &e))?;
        }

        Ok((index, dead_records))
    }

    /// Rewrite the log with live entries only, atomically replacing it.
    ///
    /// Caller must hold the inner lock.
    fn compact_locked(&self, inner: &mut LogInner) -> Result<()> {
        inner.writer.flush()?;

        let tmp = self.path.with_extension("compact");
        {
            let file = File::create(&tmp)?;
            let mut w = BufWriter::new(file);
            write_header(&mut w)?;
            for (key, value) in &inner.index {
                append_record(&mut w, RECORD_PUT, key, value)?;
            }
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        inner.writer = BufWriter::new(file);
        inner.dead_records = 0;

        debug!(path = %self.path.display(), entries = inner.index.len(), "log compacted");
        Ok(())
    }
}

impl KvEngine for LogEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        Ok(inner.index.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        append_record(&mut inner.writer, RECORD_PUT, key, value)?;
        if inner.index.insert(key.to_vec(), value.to_vec()).is_some() {
            inner.dead_records += 1;
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.lock();
        if !inner.index.contains_key(key) {
            return Ok(false);
        }
        append_record(&mut inner.writer, RECORD_DELETE, key, &[])?;
        inner.index.remove(key);
        inner.dead_records += 2;
        Ok(true)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let inner = self.inner.lock();
        Ok(inner.index.contains_key(key))
    }

    fn stat(&self) -> Result<EngineStat> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        let disk_bytes = fs::metadata(&self.path)?.len();
        let (key_bytes, value_bytes) = inner.index.iter().fold((0u64, 0u64), |(k, v), (key, value)| {
            (k + key.len() as u64, v + value.len() as u64)
        });
        Ok(EngineStat {
            entries: inner.index.len() as u64,
            disk_bytes,
            key_bytes,
            value_bytes,
            dead_records: inner.dead_records,
        })
    }

    fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.lock();
        Ok(inner
            .index
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        self.compact_locked(&mut inner)?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogEngine {
    fn drop(&mut self) {
        // Best-effort flush on drop - log errors but don't panic
        let mut inner = self.inner.lock();
        if let Err(e) = inner.writer.flush() {
            warn!(
                error = %e,
                path = %self.path.display(),
                "log flush on drop failed - tail writes may not be durable"
            );
        }
    }
}

fn write_header<W: Write>(w: &mut W) -> std::io::Result<()> {
    w.write_all(&LOG_MAGIC)?;
    w.write_u32::<LittleEndian>(LOG_FORMAT_VERSION)?;
    Ok(())
}

fn append_record<W: Write>(w: &mut W, kind: u8, key: &[u8], value: &[u8]) -> std::io::Result<()> {
    let mut body = Vec::with_capacity(RECORD_FIXED_SIZE + key.len() + value.len());
    body.push(kind);
    body.write_u32::<LittleEndian>(key.len() as u32)?;
    body.write_u32::<LittleEndian>(value.len() as u32)?;
    body.extend_from_slice(key);
    body.extend_from_slice(value);

    w.write_u32::<LittleEndian>(crc32fast::hash(&body))?;
    w.write_all(&body)?;
    Ok(())
}

fn open_error(path: &Path, e: &std::io::Error) -> Error {
    Error::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
