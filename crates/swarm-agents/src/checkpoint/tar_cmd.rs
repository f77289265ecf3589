//! Tar command construction (§4.6.1 step 1, §6 "Tar commands").
//!
//! Builds a single `sh -c`-safe shell string that archives the workspace
//! directory plus the agent's settings directories, excludes the standard
//! cache directories, and pipes its own sha256 to stdout — so a single
//! `sandbox.run()` call both creates the archive and returns the content
//! hash, per §4.6.1 step 2.

use super::paths::shell_single_quote;

/// Always-excluded paths, relative to the workspace root, per §4.6.1.
const FIXED_EXCLUDES: &[&str] = &[
    "node_modules",
    "__pycache__",
    "*.pyc",
    ".cache",
    ".npm",
    ".pip",
    ".venv",
    "venv",
];

/// The path the archive is staged at inside the sandbox before upload.
pub const ARCHIVE_STAGING_PATH: &str = "/tmp/evolve-checkpoint.tar.gz";

/// Builds the tar-and-hash command run inside the sandbox to create one
/// checkpoint archive.
///
/// `workspace_dir` must already have passed
/// [`super::paths::validate_workspace_dir`]. `settings_dirs` are the
/// already-normalized (`.claude`, `.codex`, ...) dotfile names, resolved
/// relative to `/home/user`. The command's stdout is the hex sha256 of the
/// archive bytes (§4.6.1 step 2); its exit status is non-zero on any tar
/// failure, which the caller surfaces as an `upload-failed`-class error.
pub fn build_create_command(workspace_dir: &str, settings_dirs: &[String]) -> String {
    let workspace_basename = workspace_dir.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let mut excludes: Vec<String> = FIXED_EXCLUDES.iter().map(|e| format!("--exclude={}", shell_single_quote(e))).collect();
    excludes.push(format!("--exclude={}", shell_single_quote(&format!("{workspace_basename}/temp"))));

    // Members are relative to `/`, since the archive is created with `-C /`
    // (so extraction with `-C /home/user` lands them back under the right
    // root). Quoted exactly once, from the raw path — not re-derived from an
    // already-quoted string, which would double-escape any metacharacter.
    let mut archive_members = vec![shell_single_quote(workspace_dir.trim_start_matches('/'))];
    for dir in settings_dirs {
        archive_members.push(shell_single_quote(&format!("home/user/{dir}")));
    }

    format!(
        "tar {excludes} -czf {archive} -C / {members} 2>/dev/null && sha256sum {archive} | awk '{{print $1}}'",
        excludes = excludes.join(" "),
        archive = shell_single_quote(ARCHIVE_STAGING_PATH),
        members = archive_members.join(" "),
    )
}

/// `stat`-based size query for the staged archive, run after
/// [`build_create_command`] succeeds (§4.6.1 step 3). Non-numeric stdout is
/// the caller's signal to leave `sizeBytes` unset.
pub fn build_stat_size_command() -> String {
    format!("stat -c %s {} 2>/dev/null", shell_single_quote(ARCHIVE_STAGING_PATH))
}

/// Cleanup command run after a successful upload, or after a failed one —
/// either way the temporary archive must not linger in the sandbox.
pub fn build_cleanup_command() -> String {
    format!("rm -f {}", shell_single_quote(ARCHIVE_STAGING_PATH))
}

/// Restore-side download path inside the sandbox (§4.6.2 step 2).
pub const RESTORE_STAGING_PATH: &str = "/tmp/evolve-restore.tar.gz";

/// Sha256 of the downloaded archive, compared against the checkpoint's
/// recorded hash before extraction (§4.6.2 step 3).
pub fn build_hash_command() -> String {
    format!("sha256sum {} | awk '{{print $1}}'", shell_single_quote(RESTORE_STAGING_PATH))
}

/// Extraction command: `-C /home/user` per §4.6.2 step 4.
pub fn build_extract_command() -> String {
    format!(
        "tar -xzf {} -C {}",
        shell_single_quote(RESTORE_STAGING_PATH),
        shell_single_quote("/home/user")
    )
}

/// Cleanup for the restore-side temporary archive, used both on success and
/// on an integrity-check failure (§8 scenario C2).
pub fn build_restore_cleanup_command() -> String {
    format!("rm -f {}", shell_single_quote(RESTORE_STAGING_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_command_includes_fixed_excludes() {
        let cmd = build_create_command("/home/user/project", &[".claude".to_string()]);
        assert!(cmd.contains("--exclude='node_modules'"));
        assert!(cmd.contains("--exclude='.venv'"));
        assert!(cmd.contains("--exclude='project/temp'"));
    }

    #[test]
    fn create_command_includes_settings_dirs() {
        let cmd = build_create_command("/home/user/project", &[".claude".to_string(), ".codex".to_string()]);
        assert!(cmd.contains("'home/user/.claude'"));
        assert!(cmd.contains("'home/user/.codex'"));
    }

    #[test]
    fn create_command_pipes_sha256_to_stdout() {
        let cmd = build_create_command("/home/user/project", &[]);
        assert!(cmd.ends_with("| awk '{print $1}'"));
        assert!(cmd.contains("sha256sum"));
    }

    #[test]
    fn escapes_paths_with_shell_metacharacters() {
        let cmd = build_create_command("/home/user/it's a project", &[]);
        assert!(cmd.contains("'home/user/it'\\''s a project'"));
        // A double-escaped member would contain a literal backslash next to
        // the quote boundary markers, which this single, exact occurrence
        // rules out.
        assert_eq!(cmd.matches("it'\\''s a project").count(), 1);
    }

    #[test]
    fn restore_cleanup_targets_restore_staging_path() {
        assert_eq!(build_restore_cleanup_command(), "rm -f '/tmp/evolve-restore.tar.gz'");
    }

    #[test]
    fn extract_command_targets_home_user() {
        assert!(build_extract_command().contains("-C '/home/user'"));
    }
}
