use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use execd_codec::WorkspaceBuilder;
use execd_core::{ConcurrencyMode, Error, FilePayload};

struct EnvironmentEntry {
    concurrency_mode: ConcurrencyMode,
    base_root: PathBuf,
    /// Only meaningful under `never`: `true` while a checkout is held.
    locked: AtomicBool,
}

/// Registry of named environments plus the scratch directory their
/// `fork`/`base` checkouts and base directories live under.
///
/// The registry itself never blocks a caller: `never`-mode contention is
/// reported immediately via `try_acquire` semantics, matching the
/// non-queueing contract at the core layer (an HTTP-level queue, if any,
/// is the dispatcher's concern, not this registry's).
pub struct EnvironmentManager {
    scratch_root: PathBuf,
    environments: DashMap<String, Arc<EnvironmentEntry>>,
}

/// A leased workspace root for one execution. Dropping it releases the
/// underlying environment: a `never` checkout unlocks the mutex, a
/// `fork`/`base` checkout best-effort removes its private copy.
pub struct Checkout {
    pub root: PathBuf,
    entry: Arc<EnvironmentEntry>,
    owns_directory: bool,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        match self.entry.concurrency_mode {
            ConcurrencyMode::Never => {
                self.entry.locked.store(false, Ordering::Release);
            }
            ConcurrencyMode::Fork | ConcurrencyMode::Base => {
                if self.owns_directory {
                    let _ = std::fs::remove_dir_all(&self.root);
                }
            }
        }
    }
}

impl EnvironmentManager {
    pub fn new(scratch_root: PathBuf) -> Self {
        EnvironmentManager {
            scratch_root,
            environments: DashMap::new(),
        }
    }

    /// Creates a new named environment: materializes `files` into a fresh
    /// base directory and records its concurrency mode.
    pub fn create(
        &self,
        name: &str,
        mode: ConcurrencyMode,
        files: &BTreeMap<String, FilePayload>,
    ) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::missing_required_field("name"));
        }
        if self.environments.contains_key(name) {
            return Err(Error::environment_exists(name));
        }

        let base_root = self.scratch_root.join("envs").join(name);
        std::fs::create_dir_all(&base_root)
            .map_err(|e| Error::file_system(&base_root, "create_dir_all", e))?;
        WorkspaceBuilder::materialize(&base_root, files)?;

        self.environments.insert(
            name.to_string(),
            Arc::new(EnvironmentEntry {
                concurrency_mode: mode,
                base_root,
                locked: AtomicBool::new(false),
            }),
        );
        Ok(())
    }

    pub fn concurrency_mode(&self, name: &str) -> Result<ConcurrencyMode, Error> {
        self.environments
            .get(name)
            .map(|e| e.concurrency_mode)
            .ok_or_else(|| Error::environment_not_found(name))
    }

    /// Leases a workspace for one execution against the named environment.
    pub fn checkout(&self, name: &str) -> Result<Checkout, Error> {
        let entry = self
            .environments
            .get(name)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| Error::environment_not_found(name))?;

        match entry.concurrency_mode {
            ConcurrencyMode::Never => {
                let acquired = entry
                    .locked
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok();
                if !acquired {
                    return Err(Error::environment_locked(name));
                }
                Ok(Checkout {
                    root: entry.base_root.clone(),
                    entry,
                    owns_directory: false,
                })
            }
            ConcurrencyMode::Fork | ConcurrencyMode::Base => {
                let checkout_root = self
                    .scratch_root
                    .join("checkouts")
                    .join(uuid::Uuid::new_v4().to_string());
                copy_tree(&entry.base_root, &checkout_root)?;
                Ok(Checkout {
                    root: checkout_root,
                    entry,
                    owns_directory: true,
                })
            }
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(dst).map_err(|e| Error::file_system(dst, "create_dir_all", e))?;
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::file_system(src, "walk", std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .expect("walked entry is under src");
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| Error::file_system(&target, "create_dir_all", e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::file_system(parent, "create_dir_all", e))?;
            }
            std::fs::copy(entry.path(), &target)
                .map_err(|e| Error::file_system(&target, "copy", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (EnvironmentManager, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        (EnvironmentManager::new(dir.path().to_path_buf()), dir)
    }

    #[test]
    fn creating_duplicate_name_fails() {
        let (mgr, _dir) = manager();
        mgr.create("x", ConcurrencyMode::Never, &BTreeMap::new())
            .unwrap();
        assert!(matches!(
            mgr.create("x", ConcurrencyMode::Never, &BTreeMap::new()),
            Err(Error::EnvironmentExists { .. })
        ));
    }

    #[test]
    fn never_mode_locks_exclusively() {
        let (mgr, _dir) = manager();
        mgr.create("x", ConcurrencyMode::Never, &BTreeMap::new())
            .unwrap();

        let first = mgr.checkout("x").unwrap();
        assert!(matches!(
            mgr.checkout("x"),
            Err(Error::EnvironmentLocked { .. })
        ));
        drop(first);
        assert!(mgr.checkout("x").is_ok());
    }

    #[test]
    fn fork_mode_allows_concurrent_checkouts() {
        let (mgr, _dir) = manager();
        mgr.create("x", ConcurrencyMode::Fork, &BTreeMap::new())
            .unwrap();
        let a = mgr.checkout("x").unwrap();
        let b = mgr.checkout("x").unwrap();
        assert_ne!(a.root, b.root);
    }

    #[test]
    fn fork_mutations_do_not_persist() {
        let (mgr, _dir) = manager();
        let mut files = BTreeMap::new();
        files.insert(
            "a.txt".to_string(),
            FilePayload(serde_json::json!("base")),
        );
        mgr.create("x", ConcurrencyMode::Fork, &files).unwrap();

        let checkout = mgr.checkout("x").unwrap();
        std::fs::write(checkout.root.join("a.txt"), "mutated").unwrap();
        drop(checkout);

        let next = mgr.checkout("x").unwrap();
        let contents = std::fs::read_to_string(next.root.join("a.txt")).unwrap();
        assert_eq!(contents, "base");
    }

    #[test]
    fn unknown_environment_errors() {
        let (mgr, _dir) = manager();
        assert!(matches!(
            mgr.checkout("missing"),
            Err(Error::EnvironmentNotFound { .. })
        ));
    }
}
