//! Binary coverage artifact.
//!
//! Layout (little-endian):
//!
//! ```text
//! "CVRG" | version u16 | session str | started_at str | written_at str
//!        | probe_count u32 | (name str, hits u64) * probe_count | sha256[32]
//! ```
//!
//! Strings are a `u16` byte length followed by UTF-8. The SHA-256 trailer
//! covers every preceding byte.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoverageError, Result};

/// Magic bytes at the start of every artifact.
pub const MAGIC: &[u8; 4] = b"CVRG";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Probe hit counts recorded during one service session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageData {
    /// Random identifier of the recording session.
    pub session: String,
    /// RFC 3339 timestamp of when recording started.
    pub started_at: String,
    /// RFC 3339 timestamp of when the artifact was written.
    pub written_at: String,
    /// Hit count per probe name. Registered-but-unhit probes have zero.
    pub probes: BTreeMap<String, u64>,
}

impl CoverageData {
    /// Returns whether the named probe was hit at least once.
    #[must_use]
    pub fn is_hit(&self, probe: &str) -> bool {
        self.probes.get(probe).is_some_and(|&hits| hits > 0)
    }

    /// Adds the counts of another session into this one.
    ///
    /// The merged session keeps the earliest start and latest write time.
    pub fn merge(&mut self, other: &Self) {
        for (name, hits) in &other.probes {
            let entry = self.probes.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*hits);
        }
        if other.started_at < self.started_at {
            self.started_at.clone_from(&other.started_at);
        }
        if other.written_at > self.written_at {
            self.written_at.clone_from(&other.written_at);
        }
        if self.session != other.session {
            self.session = format!("{}+{}", self.session, other.session);
        }
    }

    /// Serializes the data into the binary artifact format.
    ///
    /// # Errors
    ///
    /// Returns `CoverageError::Invalid` if a string exceeds the `u16` length
    /// limit or there are more probes than fit in a `u32`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        put_str(&mut buf, &self.session)?;
        put_str(&mut buf, &self.started_at)?;
        put_str(&mut buf, &self.written_at)?;

        let count = u32::try_from(self.probes.len()).map_err(|_| CoverageError::Invalid {
            message: format!("too many probes: {}", self.probes.len()),
        })?;
        buf.extend_from_slice(&count.to_le_bytes());
        for (name, hits) in &self.probes {
            put_str(&mut buf, name)?;
            buf.extend_from_slice(&hits.to_le_bytes());
        }

        let digest = Sha256::digest(&buf);
        buf.extend_from_slice(&digest);
        Ok(buf)
    }

    /// Parses and verifies a binary artifact.
    ///
    /// # Errors
    ///
    /// Returns the specific [`CoverageError`] describing why the bytes are
    /// not a complete, well-formed artifact. Structure is read before the
    /// checksum is verified, so a cut-off file is `Truncated` rather than
    /// `ChecksumMismatch`; string contents are checked last.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CoverageError::Empty);
        }
        if bytes.len() < HEADER_LEN {
            return Err(CoverageError::Truncated {
                offset: 0,
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(CoverageError::BadMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(CoverageError::UnsupportedVersion(version));
        }

        let mut reader = Reader {
            bytes,
            offset: HEADER_LEN,
        };
        let session = reader.string()?;
        let started_at = reader.string()?;
        let written_at = reader.string()?;
        let count = reader.u32()?;
        let mut raw_probes = Vec::new();
        for _ in 0..count {
            let name = reader.string()?;
            raw_probes.push((name, reader.u64()?));
        }

        let body_len = reader.offset;
        let trailer = reader.take(DIGEST_LEN)?;
        if reader.offset != bytes.len() {
            return Err(CoverageError::Invalid {
                message: format!("{} trailing bytes after checksum", bytes.len() - reader.offset),
            });
        }
        if Sha256::digest(&bytes[..body_len]).as_slice() != trailer {
            return Err(CoverageError::ChecksumMismatch);
        }

        let session = session.into_string()?;
        let started_at = started_at.into_string()?;
        let written_at = written_at.into_string()?;
        let mut probes = BTreeMap::new();
        for (name, hits) in raw_probes {
            let name = name.into_string()?;
            if probes.insert(name.clone(), hits).is_some() {
                return Err(CoverageError::Invalid {
                    message: format!("duplicate probe `{name}`"),
                });
            }
        }

        Ok(Self {
            session,
            started_at,
            written_at,
            probes,
        })
    }

    /// Writes the artifact so that `path` only ever holds a complete file.
    ///
    /// The bytes go to a sibling temporary file which is synced and then
    /// renamed over `path`. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or any filesystem step fails.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let tmp = temp_path(path);
        let mut file = std::fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        drop(file);
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;

        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            probes = self.probes.len(),
            "coverage artifact written"
        );
        Ok(())
    }

    /// Reads and verifies an artifact from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not well-formed.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        Self::decode(&bytes)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

fn io_err(path: &Path, source: std::io::Error) -> CoverageError {
    CoverageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn put_str(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| CoverageError::Invalid {
        message: format!("string of {} bytes exceeds the u16 length limit", value.len()),
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Cursor over the artifact body.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len().saturating_sub(self.offset);
        if available < n {
            return Err(CoverageError::Truncated {
                offset: self.offset,
                needed: n,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn string(&mut self) -> Result<RawStr<'a>> {
        let len = usize::from(self.u16()?);
        let offset = self.offset;
        Ok(RawStr {
            offset,
            bytes: self.take(len)?,
        })
    }
}

/// String bytes whose UTF-8 check waits until the checksum has passed.
struct RawStr<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl RawStr<'_> {
    fn into_string(self) -> Result<String> {
        String::from_utf8(self.bytes.to_vec()).map_err(|_| CoverageError::InvalidUtf8 {
            offset: self.offset,
        })
    }
}
