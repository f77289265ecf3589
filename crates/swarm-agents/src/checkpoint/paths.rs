//! Path normalization rules for the checkpoint engine (§6).

use crate::error::{Error, Result};

/// Normalizes an agent settings directory to its bare dotfile name:
/// `~/.claude` or `/home/user/.claude` both become `.claude`. Rejects any
/// path containing `..`.
pub fn normalize_settings_dir(path: &str) -> Result<String> {
    if path.contains("..") {
        return Err(Error::invalid_argument(format!("settings dir {path:?} must not contain `..`")));
    }
    let trimmed = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("/home/user/"))
        .unwrap_or(path);
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::invalid_argument(format!("settings dir {path:?} has no dotfile component")));
    }
    Ok(trimmed.to_string())
}

/// Validates a workspace directory per §6: must start with `/home/user/`,
/// must not contain `..`, must not contain `//`, and must not equal
/// `/home/user/` exactly (the workspace must be a real subdirectory).
pub fn validate_workspace_dir(path: &str) -> Result<()> {
    if !path.starts_with("/home/user/") {
        return Err(Error::invalid_argument(format!("workspace dir {path:?} must start with `/home/user/`")));
    }
    if path.contains("..") {
        return Err(Error::invalid_argument(format!("workspace dir {path:?} must not contain `..`")));
    }
    if path.contains("//") {
        return Err(Error::invalid_argument(format!("workspace dir {path:?} must not contain `//`")));
    }
    if path == "/home/user/" {
        return Err(Error::invalid_argument("workspace dir must not equal `/home/user/` exactly"));
    }
    Ok(())
}

/// Single-quote-escapes `value` for safe interpolation into a `sh -c`
/// string: `'` becomes `'\''`, and the whole value is wrapped in quotes.
pub fn shell_single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tilde_prefixed_settings_dir() {
        assert_eq!(normalize_settings_dir("~/.claude").unwrap(), ".claude");
    }

    #[test]
    fn normalizes_absolute_settings_dir() {
        assert_eq!(normalize_settings_dir("/home/user/.codex").unwrap(), ".codex");
    }

    #[test]
    fn rejects_traversal_in_settings_dir() {
        assert!(normalize_settings_dir("~/.claude/../../etc").is_err());
    }

    #[test]
    fn accepts_valid_workspace_dir() {
        assert!(validate_workspace_dir("/home/user/project").is_ok());
    }

    #[test]
    fn rejects_workspace_dir_outside_home_user() {
        assert!(validate_workspace_dir("/tmp/project").is_err());
    }

    #[test]
    fn rejects_workspace_dir_with_double_slash() {
        assert!(validate_workspace_dir("/home/user//project").is_err());
    }

    #[test]
    fn rejects_bare_home_user() {
        assert!(validate_workspace_dir("/home/user/").is_err());
    }

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(shell_single_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn escapes_plain_path_as_noop_quote() {
        assert_eq!(shell_single_quote("/home/user/project"), "'/home/user/project'");
    }
}
