use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use execd_core::{Error, FilePayload};
use execd_security::validator::{escapes_root, validate_relative_path};

use crate::compression::{compress, decompress};
use crate::format::{encode, parse_path};
use crate::glob;

/// Materializes a request's `files` map onto a workspace directory and
/// later harvests files matching `track` glob patterns back out.
pub struct WorkspaceBuilder;

impl WorkspaceBuilder {
    /// Writes every entry of `files` under `root`, creating intermediate
    /// directories as needed. Writes happen sequentially in map order,
    /// which for a `BTreeMap` is lexicographic by path — good enough to
    /// satisfy "within a single request, writes are sequential" without
    /// needing an explicit ordering field.
    pub fn materialize(
        root: &Path,
        files: &BTreeMap<String, FilePayload>,
    ) -> Result<(), Error> {
        for (logical_path, payload) in files {
            let relative = validate_relative_path(logical_path)?;
            let (format, compression) = parse_path(logical_path)?;
            let encoded = encode(format, &payload.0, logical_path)?;
            let bytes = compress(&encoded, compression)?;

            let full_path = root.join(&relative);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::file_system(parent, "create_dir_all", e))?;
            }
            std::fs::write(&full_path, &bytes)
                .map_err(|e| Error::file_system(&full_path, "write", e))?;
        }
        Ok(())
    }

    /// Collects every file under `root` matching any pattern in `track`,
    /// returning relative paths (lexicographically ordered) mapped to
    /// their final on-disk contents, decompressed and decoded as UTF-8
    /// with replacement.
    ///
    /// `track` absent, or empty, yields `None` — callers distinguish "no
    /// harvesting requested" (no `files` key in the response) from
    /// "harvesting requested but nothing matched" (empty map).
    pub fn harvest(
        root: &Path,
        track: Option<&[String]>,
    ) -> Result<Option<BTreeMap<String, String>>, Error> {
        let Some(patterns) = track else {
            return Ok(None);
        };
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut matched = BTreeMap::new();
        for entry in walk_files(root)? {
            let relative = entry
                .strip_prefix(root)
                .expect("walked entry is under root")
                .to_string_lossy()
                .replace('\\', "/");

            if !patterns.iter().any(|p| glob::matches(p, &relative)) {
                continue;
            }

            if escapes_root(root, &entry).unwrap_or(true) {
                continue;
            }

            let raw = std::fs::read(&entry).map_err(|e| Error::file_system(&entry, "read", e))?;
            let (_, compression) = parse_path(&relative)?;
            // A tracked path's suffix only *suggests* its compression; a
            // command may have written plain content under a name like
            // `out.gz`. Fall back to the raw bytes rather than failing the
            // whole request when decompression doesn't actually apply.
            let bytes = decompress(&raw, compression).unwrap_or(raw);
            matched.insert(relative, String::from_utf8_lossy(&bytes).into_owned());
        }

        Ok(Some(matched))
    }
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            std::fs::read_dir(&dir).map_err(|e| Error::file_system(&dir, "read_dir", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::file_system(&dir, "read_dir", e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| Error::file_system(&path, "file_type", e))?;
            if file_type.is_symlink() {
                // Symlinks are only followed if they resolve inside root;
                // `escapes_root` is re-checked per-match in `harvest`.
                if let Ok(target_meta) = std::fs::metadata(&path) {
                    if target_meta.is_dir() {
                        stack.push(path);
                    } else {
                        out.push(path);
                    }
                }
            } else if file_type.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}
