//! Standalone storage client (C8): browsing and downloading checkpoints
//! without a live sandbox — used by tooling that inspects past runs.

use std::io::Read;
use std::path::PathBuf;

use coordination::{FileContent, FileMap};
use flate2::read::GzDecoder;

use crate::checkpoint::{self, CheckpointInfo, CheckpointStore};
use crate::error::{Error, Result};

use super::archive::{extract_checked, read_entries};

pub struct StorageClient<'a> {
    store: &'a dyn CheckpointStore,
}

/// Options for [`StorageClient::download_checkpoint`].
#[derive(Debug, Clone, Default)]
pub struct DownloadCheckpointOptions {
    pub to: PathBuf,
    pub extract: bool,
}

/// Options for [`StorageClient::download_files`]: either an exact set of
/// paths, or a glob (`*`/`**`), against the archive's entries. `to`, if
/// given, is an extra on-disk mirror of the selected files; the method's
/// return value is always the in-memory [`FileMap`].
#[derive(Debug, Clone, Default)]
pub struct DownloadFilesOptions {
    pub files: Option<Vec<String>>,
    pub glob: Option<String>,
    pub to: Option<PathBuf>,
}

impl<'a> StorageClient<'a> {
    pub fn new(store: &'a dyn CheckpointStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, limit: Option<u32>, tag: Option<&str>) -> Result<Vec<CheckpointInfo>> {
        checkpoint::list_checkpoints(self.store, limit, tag).await
    }

    pub async fn get(&self, id: &str) -> Result<CheckpointInfo> {
        Ok(self.store.get_record(id).await?.into())
    }

    pub async fn get_latest(&self, tag: Option<&str>) -> Result<Option<CheckpointInfo>> {
        checkpoint::get_latest_checkpoint(self.store, tag).await
    }

    /// Fetches one checkpoint's archive, verifies its hash, and either
    /// writes the raw `.tar.gz` or extracts it into `opts.to` (§4.7).
    pub async fn download_checkpoint(&self, id: &str, opts: DownloadCheckpointOptions) -> Result<()> {
        let info = self.get(id).await?;
        let bytes = self.fetch_and_verify_archive(&info.hash).await?;

        if opts.extract {
            let decompressed = gunzip(&bytes)?;
            extract_checked(&decompressed, &opts.to)?;
        } else {
            if let Some(parent) = opts.to.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&opts.to, &bytes)?;
        }
        Ok(())
    }

    /// Streams the checkpoint's tar entries in memory and returns a
    /// [`FileMap`] of only those matching `opts.files` (exact set) or
    /// `opts.glob`, keyed by archive-relative path. If `opts.to` is given,
    /// the selected files are additionally written out to that directory.
    pub async fn download_files(&self, id: &str, opts: DownloadFilesOptions) -> Result<FileMap> {
        let info = self.get(id).await?;
        let bytes = self.fetch_and_verify_archive(&info.hash).await?;
        let decompressed = gunzip(&bytes)?;

        let entries = read_entries(&decompressed)?;

        let mut selected = FileMap::new();
        for (relative, contents) in entries {
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if !matches_selection(&relative_str, opts.files.as_deref(), opts.glob.as_deref()) {
                continue;
            }
            if let Some(dest_root) = &opts.to {
                let dst = dest_root.join(&relative);
                if let Some(parent) = dst.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&dst, &contents)?;
            }
            selected.insert(relative_str, FileContent::Bytes(contents));
        }
        Ok(selected)
    }

    async fn fetch_and_verify_archive(&self, hash: &str) -> Result<Vec<u8>> {
        let url = self.store.presign_download(hash).await?;
        let bytes = reqwest::get(&url).await?.bytes().await?.to_vec();
        let actual = sha256_hex(&bytes);
        if actual != hash {
            return Err(Error::IntegrityCheckFailed { expected: hash.to_string(), actual });
        }
        Ok(bytes)
    }
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Matches `relative` (forward-slash, archive-relative) against an exact
/// file-set first, then a glob (`*` = one path segment, `**` = any depth),
/// falling back to "match everything" when neither is given.
fn matches_selection(relative: &str, files: Option<&[String]>, glob: Option<&str>) -> bool {
    if let Some(files) = files {
        return files.iter().any(|f| f == relative);
    }
    if let Some(glob) = glob {
        return glob_match(glob, relative);
    }
    true
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let candidate_segments: Vec<&str> = candidate.split('/').collect();
    glob_match_segments(&pattern_segments, &candidate_segments)
}

fn glob_match_segments(pattern: &[&str], candidate: &[&str]) -> bool {
    match pattern.first() {
        None => candidate.is_empty(),
        Some(&"**") => {
            if pattern.len() == 1 {
                return true;
            }
            (0..=candidate.len()).any(|skip| glob_match_segments(&pattern[1..], &candidate[skip..]))
        }
        Some(seg) => match candidate.first() {
            Some(cand_seg) if segment_match(seg, cand_seg) => glob_match_segments(&pattern[1..], &candidate[1..]),
            _ => false,
        },
    }
}

fn segment_match(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return candidate.starts_with(prefix);
    }
    pattern == candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_file_set_matches_only_listed_paths() {
        assert!(matches_selection("a/b.txt", Some(&["a/b.txt".to_string()]), None));
        assert!(!matches_selection("a/c.txt", Some(&["a/b.txt".to_string()]), None));
    }

    #[test]
    fn single_star_glob_matches_one_segment() {
        assert!(glob_match("src/*.rs", "src/main.rs"));
        assert!(!glob_match("src/*.rs", "src/nested/main.rs"));
    }

    #[test]
    fn double_star_glob_matches_any_depth() {
        assert!(glob_match("**/*.rs", "src/nested/deep/main.rs"));
        assert!(glob_match("**/*.rs", "main.rs"));
    }

    #[test]
    fn no_selector_matches_everything() {
        assert!(matches_selection("anything.txt", None, None));
    }

    #[test]
    fn download_files_returns_an_in_memory_file_map() {
        let mut builder = tar::Builder::new(Vec::new());
        let contents = b"hello world";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "a/b.txt", &contents[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let entries = read_entries(&archive).unwrap();
        let mut selected = FileMap::new();
        for (relative, bytes) in entries {
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if matches_selection(&relative_str, None, Some("a/*.txt")) {
                selected.insert(relative_str, FileContent::Bytes(bytes));
            }
        }

        assert_eq!(selected.len(), 1);
        match selected.get("a/b.txt") {
            Some(FileContent::Bytes(bytes)) => assert_eq!(bytes, contents),
            other => panic!("unexpected entry: {other:?}"),
        }
    }
}
