use std::path::{Component, Path, PathBuf};

use execd_core::Error;

/// Validates a request-supplied relative path and returns the `PathBuf` to
/// join onto a workspace root.
///
/// Rejects absolute paths and any path containing a `..` component — the
/// same invariant both file materialization (write side) and harvesting
/// (read side) must hold.
pub fn validate_relative_path(raw: &str) -> Result<PathBuf, Error> {
    if raw.is_empty() {
        return Err(Error::invalid_path(raw, "path must not be empty"));
    }

    let path = Path::new(raw);
    if path.is_absolute() {
        return Err(Error::invalid_path(raw, "path must be relative"));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::invalid_path(raw, "path must not contain '..'"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_path(raw, "path must be relative"));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::invalid_path(raw, "path must not be empty"));
    }

    Ok(normalized)
}

/// Returns `true` if `candidate` (assumed to exist under `root`) resolves,
/// once symlinks are followed, outside of `root`. Used by the harvester to
/// skip symlinks that would leak data from outside the workspace.
pub fn escapes_root(root: &Path, candidate: &Path) -> std::io::Result<bool> {
    let canonical_root = root.canonicalize()?;
    let canonical_candidate = candidate.canonicalize()?;
    Ok(!canonical_candidate.starts_with(&canonical_root))
}

/// Validates an environment variable name against `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_env_var_name(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => {
            return Err(Error::invalid_type(
                "env",
                format!("'{name}' is not a valid environment variable name"),
            ))
        }
    }
    if chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::invalid_type(
            "env",
            format!("'{name}' is not a valid environment variable name"),
        ))
    }
}
