//! Shared archive-extraction security (§4.7), used by both the standalone
//! storage client's on-disk extraction and any in-memory archive reads.
//!
//! A tar entry is only ever a regular file or a directory, and its path
//! must resolve inside the extraction root — anything else is rejected
//! before a single byte is written, not cleaned up after the fact.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tar::{Archive, EntryType};

use crate::error::{Error, Result};

/// Validates one archive entry's path and type, returning the sanitized
/// path to extract it to under `dest_root`.
///
/// Rejects:
/// - entry types other than regular file or directory (`UnsupportedEntryType`)
/// - absolute paths or any `..` component (`UnsafePath`)
pub fn safe_entry_path(entry_path: &Path, entry_type: EntryType, dest_root: &Path) -> Result<PathBuf> {
    if entry_type != EntryType::Regular && entry_type != EntryType::Directory {
        return Err(Error::UnsupportedEntryType(entry_path.display().to_string()));
    }

    for component in entry_path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => return Err(Error::UnsafePath(entry_path.display().to_string())),
        }
    }

    Ok(dest_root.join(entry_path))
}

/// Extracts `archive_bytes` (already gunzipped) into `dest_root`, applying
/// [`safe_entry_path`] to every entry before writing anything.
pub fn extract_checked(archive_bytes: &[u8], dest_root: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_root)?;
    let mut archive = Archive::new(archive_bytes);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();
        let entry_type = entry.header().entry_type();
        let safe_path = safe_entry_path(&entry_path, entry_type, dest_root)?;
        if entry_type == EntryType::Directory {
            std::fs::create_dir_all(&safe_path)?;
        } else {
            if let Some(parent) = safe_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&safe_path)?;
        }
    }
    Ok(())
}

/// Reads every entry of `archive_bytes` (already gunzipped) into memory,
/// applying the same [`safe_entry_path`] checks as [`extract_checked`]
/// before a single byte is buffered. Directory entries are validated but
/// not retained — the caller only wants file content, keyed by the
/// entry's archive-relative path.
pub fn read_entries(archive_bytes: &[u8]) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let virtual_root = Path::new("/");
    let mut out = BTreeMap::new();
    let mut archive = Archive::new(archive_bytes);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();
        let entry_type = entry.header().entry_type();
        let safe_path = safe_entry_path(&entry_path, entry_type, virtual_root)?;
        if entry_type == EntryType::Directory {
            continue;
        }
        let relative = safe_path.strip_prefix(virtual_root).unwrap().to_path_buf();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        out.insert(relative, bytes);
    }
    Ok(out)
}
