use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Writes `content` to `path` atomically: write to a sibling temp file, then
/// rename over the destination. Never leaves a half-written file behind,
/// even if two processes race on the same path.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn write_atomic_str(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Content hash used for workspace-vs-local comparison during save, and for
/// workspace index `hash` bookkeeping.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deterministic hash of a workspace's absolute path, used for the `workspace.hash`
/// field in the package index and for [`openpackage_version::workspace_tag`].
pub fn workspace_hash(workspace_path: &str) -> String {
    content_hash(workspace_path.as_bytes())
}

/// Recursively removes `dir` if it exists, tolerating a missing directory.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs_err::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_atomic_str(&path, "hello").unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[test]
    fn remove_dir_if_exists_tolerates_missing_dir() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(remove_dir_if_exists(&missing).is_ok());
    }
}
