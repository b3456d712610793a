//! Flat pack format for a one-level directory of small files.
//!
//! Format:
//!   [u32be name_len][name bytes][u32be data_len][data bytes] per file,
//!   sorted by name. No file modes, no timestamps: they are not part of the
//!   session semantics.
//!
//! Unpack is traversal-safe: names containing separators, leading dots, or
//! more than 255 bytes are skipped, and an overlong length field truncates
//! cleanly rather than panicking.

use std::fs;
use std::path::Path;

use crate::error::PackError;

/// Maximum entry-name length in bytes.
pub const MAX_NAME_BYTES: usize = 255;

// ---------------------------------------------------------------------------
// Pack
// ---------------------------------------------------------------------------

/// Pack every regular file directly under `dir`, sorted by name.
/// Subdirectories are not descended into; names that are not plain UTF-8
/// filenames are skipped with a warning.
pub fn pack(dir: &Path) -> Result<Vec<u8>, PackError> {
    let mut entries: Vec<(String, std::path::PathBuf)> = Vec::new();
    let read_dir = fs::read_dir(dir).map_err(|e| PackError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in read_dir {
        let entry = entry.map_err(|e| PackError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(raw) => {
                tracing::warn!(name = ?raw, "skipping non-utf8 entry name");
                continue;
            }
        };
        if name.contains('/') || name.contains('\\') {
            return Err(PackError::InvalidName { name });
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(PackError::NameTooLong { name });
        }
        entries.push((name, path));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    for (name, path) in entries {
        let data = fs::read(&path).map_err(|e| PackError::Io {
            path: path.clone(),
            source: e,
        })?;
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&data);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Unpack
// ---------------------------------------------------------------------------

/// Unpack frames into `dest` with owner-only permissions. Returns the number
/// of files written. Suspicious entries (separators, dot-prefix, oversized
/// names) are skipped, not fatal: a partially corrupted archive should still
/// yield its valid entries.
pub fn unpack(buf: &[u8], dest: &Path) -> Result<usize, PackError> {
    let mut pos = 0usize;
    let mut written = 0usize;

    loop {
        let Some((name_bytes, next)) = read_frame(buf, pos) else {
            break;
        };
        let Some((data, next)) = read_frame(buf, next) else {
            break;
        };
        pos = next;

        let name = match std::str::from_utf8(name_bytes) {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("skipping non-utf8 entry name in archive");
                continue;
            }
        };
        if !is_safe_name(name) {
            tracing::warn!(name, "skipping unsafe entry name in archive");
            continue;
        }

        let path = dest.join(name);
        fs::write(&path, data).map_err(|e| PackError::Io {
            path: path.clone(),
            source: e,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                PackError::Io {
                    path: path.clone(),
                    source: e,
                }
            })?;
        }
        written += 1;
    }
    Ok(written)
}

/// Read one `[u32be len][bytes]` frame. Returns `None` when the buffer is
/// exhausted or the length field points past the end (truncated archive).
fn read_frame(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let len_end = pos.checked_add(4)?;
    if len_end > buf.len() {
        return None;
    }
    let len = u32::from_be_bytes(buf[pos..len_end].try_into().ok()?) as usize;
    let data_end = len_end.checked_add(len)?;
    if data_end > buf.len() {
        return None;
    }
    Some((&buf[len_end..data_end], data_end))
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_BYTES
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_files(dir: &Path, files: &[(&str, &[u8])]) {
        for (name, data) in files {
            fs::write(dir.join(name), data).unwrap();
        }
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let src = tempfile::tempdir().unwrap();
        write_files(
            src.path(),
            &[
                ("creds.json", b"{\"a\":1}".as_slice()),
                ("session.db", &[0u8, 1, 2, 3, 255]),
                ("empty", b""),
            ],
        );

        let packed = pack(src.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let written = unpack(&packed, dest.path()).unwrap();
        assert_eq!(written, 3);

        for (name, data) in [
            ("creds.json", b"{\"a\":1}".as_slice()),
            ("session.db", &[0u8, 1, 2, 3, 255]),
            ("empty", b""),
        ] {
            assert_eq!(fs::read(dest.path().join(name)).unwrap(), data);
        }
    }

    #[test]
    fn pack_is_sorted_and_stable() {
        let src = tempfile::tempdir().unwrap();
        write_files(src.path(), &[("b", b"2"), ("a", b"1"), ("c", b"3")]);
        let first = pack(src.path()).unwrap();
        let second = pack(src.path()).unwrap();
        assert_eq!(first, second);

        // First frame must be "a".
        let name_len = u32::from_be_bytes(first[..4].try_into().unwrap()) as usize;
        assert_eq!(&first[4..4 + name_len], b"a");
    }

    #[test]
    fn pack_skips_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        write_files(src.path(), &[("file", b"x")]);
        fs::create_dir(src.path().join("subdir")).unwrap();

        let packed = pack(src.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        assert_eq!(unpack(&packed, dest.path()).unwrap(), 1);
    }

    #[test]
    fn unpack_skips_traversal_names() {
        let mut buf = Vec::new();
        for (name, data) in [
            ("../escape", b"evil".as_slice()),
            ("nested/path", b"evil"),
            (".hidden", b"evil"),
            ("ok.txt", b"good"),
        ] {
            buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
            buf.extend_from_slice(data);
        }

        let dest = tempfile::tempdir().unwrap();
        assert_eq!(unpack(&buf, dest.path()).unwrap(), 1);

        let names: Vec<String> = fs::read_dir(dest.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ok.txt".to_string()]);
    }

    #[test]
    fn unpack_truncates_cleanly_on_overlong_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(b"good");
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.push(b'x');
        // Second frame claims more data than the buffer holds.
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(b"bad");
        buf.extend_from_slice(&u32::MAX.to_be_bytes());

        let dest = tempfile::tempdir().unwrap();
        assert_eq!(unpack(&buf, dest.path()).unwrap(), 1);
        assert_eq!(fs::read(dest.path().join("good")).unwrap(), b"x");
    }

    #[test]
    fn unpack_empty_buffer_is_empty_dir() {
        let dest = tempfile::tempdir().unwrap();
        assert_eq!(unpack(&[], dest.path()).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn unpacked_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let src = tempfile::tempdir().unwrap();
        write_files(src.path(), &[("f", b"data")]);
        let packed = pack(src.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        unpack(&packed, dest.path()).unwrap();
        let mode = fs::metadata(dest.path().join("f")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
