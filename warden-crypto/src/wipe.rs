//! Secure file wipe: overwrite then unlink.
//!
//! Three passes of cryptographically random bytes over the file's original
//! length, syncing after each pass, then unlink. Best-effort on
//! copy-on-write filesystems (btrfs, APFS, ZFS), where overwritten extents
//! may survive elsewhere on disk — defense in depth, not a guarantee.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use getrandom::getrandom;

use crate::error::CryptoError;

const WIPE_PASSES: usize = 3;
const WIPE_CHUNK: usize = 8192;

/// Overwrite `path` with random bytes three times, then remove it.
pub fn secure_wipe(path: &Path) -> Result<(), CryptoError> {
    let len = fs::metadata(path)?.len();
    if len > 0 {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let mut chunk = [0u8; WIPE_CHUNK];
        for _ in 0..WIPE_PASSES {
            file.seek(SeekFrom::Start(0))?;
            let mut remaining = len as usize;
            while remaining > 0 {
                let n = remaining.min(WIPE_CHUNK);
                getrandom(&mut chunk[..n]).map_err(|_| CryptoError::Rng)?;
                file.write_all(&chunk[..n])?;
                remaining -= n;
            }
            file.sync_all()?;
        }
    }
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipes_and_unlinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        fs::write(&path, b"do not keep me").unwrap();
        secure_wipe(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn wipes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        secure_wipe(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = secure_wipe(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, CryptoError::Io(_)));
    }
}
