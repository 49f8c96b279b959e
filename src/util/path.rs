use std::path::{Path, PathBuf};

/// Expand environment variables in a path string.
///
/// Supports:
/// - `$VAR` syntax
/// - `${VAR}` syntax
/// - `~` for home directory
///
/// Unresolvable variables leave the input unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
