//! Framing shared by the binary index files.
//!
//! ```text
//! magic | version u8 | bincode body | xxh64 of all preceding bytes (u64 LE)
//! ```
//!
//! Decoding checks the header, then the checksum, then deserializes, so a
//! truncated or bit-flipped file never reaches bincode.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;
use xxhash_rust::xxh64::xxh64;

use crate::{Error, Result};

const CHECKSUM_LEN: usize = 8;

/// Serialize `body` behind a magic/version header and append its checksum.
pub fn encode<T: Serialize>(magic: &[u8], version: u8, body: &T, what: &'static str) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(magic.len() + 1);
    data.extend_from_slice(magic);
    data.push(version);
    bincode::serialize_into(&mut data, body)
        .map_err(|e| Error::Validation(format!("cannot encode {what}: {e}")))?;
    let checksum = xxh64(&data, 0);
    data.extend_from_slice(&checksum.to_le_bytes());
    Ok(data)
}

/// Inverse of [`encode`]. Every failure is `InvalidFormat`.
pub fn decode<T: DeserializeOwned>(data: &[u8], magic: &[u8], version: u8, what: &'static str) -> Result<T> {
    check_header(data, magic, version, what)?;
    let body_start = magic.len() + 1;
    let Some(checksum_offset) = data.len().checked_sub(CHECKSUM_LEN).filter(|&o| o >= body_start) else {
        return Err(invalid(what, format!("truncated at {} bytes", data.len())));
    };

    let (payload, footer) = data.split_at(checksum_offset);
    let stored = footer
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| invalid(what, "missing checksum".into()))?;
    let computed = xxh64(payload, 0);
    if stored != computed {
        return Err(invalid(what, format!("checksum mismatch (stored={stored:#x}, computed={computed:#x})")));
    }

    bincode::deserialize(&payload[body_start..]).map_err(|e| invalid(what, format!("corrupt body: {e}")))
}

/// Check the magic prefix and the version byte that follows it.
pub fn check_header(data: &[u8], magic: &[u8], version: u8, what: &'static str) -> Result<()> {
    if data.len() <= magic.len() {
        return Err(invalid(what, format!("truncated at {} bytes", data.len())));
    }
    if &data[..magic.len()] != magic {
        return Err(invalid(what, "bad magic header".into()));
    }
    let found = data[magic.len()];
    if found != version {
        return Err(invalid(what, format!("unsupported version {found} (expected {version})")));
    }
    Ok(())
}

pub(crate) fn invalid(what: &'static str, message: String) -> Error {
    Error::InvalidFormat { what, message }
}

/// Write `data` to `path` via a sibling temp file and rename, so readers
/// never observe a half-written index.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let result = std::fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&temp_path, path));
    if let Err(e) = result {
        error!(path = %path.display(), error = %e, "atomic write failed");
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
