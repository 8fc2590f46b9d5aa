//! Disk I/O helpers: load a collection file and atomically write it back.
//!
//! The rename-over approach is close to atomic on most platforms. On NTFS
//! (Windows) it's reliable; on FAT32 or network shares there are no hard
//! guarantees. If that matters to you, keep backups or use a real database.

use crate::collection::CollectionState;
use crate::error::{Error, Result};
use crate::serializer::Serializer;
use std::path::Path;

/// Reads and deserializes the collection file at `path`.
///
/// A missing file is created (parent directories included) and yields an
/// empty collection. An empty, unreadable or malformed file also yields an
/// empty collection; the problem is logged, never returned.
pub fn load<S: Serializer>(path: &Path, serializer: &S) -> CollectionState {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Err(e) = create_empty(path) {
                tracing::warn!("could not create data file {}: {}", path.display(), e);
            }
            return CollectionState::new();
        }
        Err(e) => {
            tracing::warn!("could not read data file {}: {}", path.display(), e);
            return CollectionState::new();
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return CollectionState::new();
    }
    match serializer.deserialize(&bytes) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                "data file {} is malformed, starting empty: {}",
                path.display(),
                e
            );
            CollectionState::new()
        }
    }
}

/// Serialize `state` and overwrite the file at `path`, creating parent
/// directories if needed.
pub fn save<S: Serializer>(path: &Path, state: &CollectionState, serializer: &S) -> Result<()> {
    let bytes = serializer.serialize(state)?;
    ensure_parent(path)?;
    atomic_write(path, &bytes)
}

/// Write `bytes` to `<path>.tmp` and then rename over `path`. This avoids
/// leaving a half-written file if the process crashes mid-write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let tmp = path.with_extension(format!("{ext}.tmp"));
    std::fs::write(&tmp, bytes).map_err(|e| Error::Io(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| Error::Io(e.to_string()))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| Error::Io(e.to_string()))
        }
        _ => Ok(()),
    }
}

fn create_empty(path: &Path) -> Result<()> {
    ensure_parent(path)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}
