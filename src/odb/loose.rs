//! Loose-object reading.
//!
//! Loose objects live under `objects/xx/yyyy...` (first hex byte as the
//! fan-out directory) as zlib streams whose inflated form is
//! `<kind> SP <decimal size> NUL <payload>`. The reader inflates the whole
//! file, validates the header against a bounded allowance, and checks the
//! declared size against the actual payload.
//!
//! # Invariants
//! - Headers never exceed `LOOSE_HEADER_MAX_BYTES`.
//! - Inflated output is capped by `max_object_bytes`.
//! - A missing fan-out file is `Missing`, not `Io`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::{Decompress, FlushDecompress, Status};
use memchr::memchr;

use super::database::{ObjectData, ObjectDatabase, ObjectKind};
use super::errors::ObjectError;
use super::object_id::ObjectId;

/// Safety allowance for loose object headers (`"commit 123\0"`).
const LOOSE_HEADER_MAX_BYTES: usize = 64;

/// Default cap on inflated object size (256 MiB).
const DEFAULT_MAX_OBJECT_BYTES: usize = 256 * 1024 * 1024;

/// Reads loose objects from an `objects/` directory.
#[derive(Debug)]
pub struct LooseObjectDatabase {
    objects_dir: PathBuf,
    max_object_bytes: usize,
}

impl LooseObjectDatabase {
    /// Creates a reader rooted at an `objects/` directory.
    #[must_use]
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }

    /// Overrides the inflated-size cap.
    #[must_use]
    pub fn with_max_object_bytes(mut self, max: usize) -> Self {
        self.max_object_bytes = max;
        self
    }

    /// Returns the fan-out path for an id.
    fn path_for(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn read_inflated(&self, id: &ObjectId, path: &Path) -> Result<Vec<u8>, ObjectError> {
        let compressed = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ObjectError::Missing(*id));
            }
            Err(err) => return Err(ObjectError::Io(err)),
        };

        inflate_all(&compressed, self.max_object_bytes)
            .ok_or(ObjectError::corrupt(*id, "zlib stream failed to inflate"))
    }
}

impl ObjectDatabase for LooseObjectDatabase {
    fn open(&self, id: &ObjectId) -> Result<ObjectData, ObjectError> {
        let path = self.path_for(id);
        let inflated = self.read_inflated(id, &path)?;

        let header_end = memchr(0, &inflated[..inflated.len().min(LOOSE_HEADER_MAX_BYTES)])
            .ok_or(ObjectError::corrupt(*id, "missing header terminator"))?;
        let header = &inflated[..header_end];

        let space = memchr(b' ', header).ok_or(ObjectError::corrupt(*id, "malformed header"))?;
        let kind = ObjectKind::from_header_name(&header[..space])
            .ok_or(ObjectError::corrupt(*id, "unknown object kind"))?;
        let size = parse_decimal(&header[space + 1..])
            .ok_or(ObjectError::corrupt(*id, "invalid size field"))?;

        let payload = &inflated[header_end + 1..];
        if payload.len() != size {
            return Err(ObjectError::corrupt(*id, "size field does not match payload"));
        }

        Ok(ObjectData {
            kind,
            bytes: payload.to_vec(),
        })
    }

    fn has_object(&self, id: &ObjectId) -> bool {
        self.path_for(id).is_file()
    }
}

/// Inflates a complete zlib stream, bounded by `max_out`.
///
/// Returns `None` on corrupt input, a stalled stream, or output that
/// exceeds the cap.
fn inflate_all(input: &[u8], max_out: usize) -> Option<Vec<u8>> {
    let mut de = Decompress::new(true);
    let mut out = Vec::with_capacity(input.len().saturating_mul(2).min(max_out));
    let mut buf = [0u8; 16 * 1024];

    loop {
        let before_in = de.total_in();
        let before_out = de.total_out();
        let in_pos = before_in as usize;
        let status = de
            .decompress(&input[in_pos.min(input.len())..], &mut buf, FlushDecompress::None)
            .ok()?;
        let produced = (de.total_out() - before_out) as usize;
        if out.len() + produced > max_out {
            return None;
        }
        out.extend_from_slice(&buf[..produced]);

        match status {
            Status::StreamEnd => return Some(out),
            Status::Ok | Status::BufError => {
                // No forward progress on either side means a truncated or
                // stalled stream.
                if produced == 0 && de.total_in() == before_in {
                    return None;
                }
            }
        }
    }
}

/// Parses ASCII decimal digits into a usize.
fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.len() > 20 {
        return None;
    }
    let mut value: usize = 0;
    for &b in bytes {
        let digit = b.wrapping_sub(b'0');
        if digit > 9 {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(digit as usize)?;
    }
    Some(value)
}
