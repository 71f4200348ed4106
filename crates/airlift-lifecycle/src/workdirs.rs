//! ---
//! airlift_section: "04-lifecycle-orchestration"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Reset of the logs/dags/plugins working directories."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use airlift_common::config::DirectoriesConfig;
use tracing::{debug, warn};

use crate::error::StepError;

/// Which bind-mounted directory an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryRole {
    Logs,
    Dags,
    Plugins,
}

impl DirectoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryRole::Logs => "logs",
            DirectoryRole::Dags => "dags",
            DirectoryRole::Plugins => "plugins",
        }
    }
}

impl fmt::Display for DirectoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of the three working directories shared with the containers.
#[derive(Debug, Clone)]
pub struct WorkingDirectorySet {
    entries: Vec<(DirectoryRole, PathBuf)>,
    mode: u32,
    owner_uid: Option<u32>,
    owner_gid: Option<u32>,
}

/// What happened to one directory during a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOutcome {
    pub role: DirectoryRole,
    pub path: PathBuf,
    /// The directory did not exist and was created.
    pub created: bool,
    /// Top-level entries removed.
    pub removed_entries: usize,
    /// Best-effort failures that did not abort the reset.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub directories: Vec<DirectoryOutcome>,
}

impl ResetReport {
    pub fn warning_count(&self) -> usize {
        self.directories.iter().map(|d| d.warnings.len()).sum()
    }

    pub fn summary(&self) -> String {
        self.directories
            .iter()
            .map(|d| {
                if d.created {
                    format!("{} created", d.role)
                } else {
                    format!("{} cleared ({} entries)", d.role, d.removed_entries)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl WorkingDirectorySet {
    /// Resolve the configured directories relative to `root`.
    pub fn from_config(root: &Path, config: &DirectoriesConfig) -> Self {
        let resolve = |path: &PathBuf| {
            if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            }
        };
        Self {
            entries: vec![
                (DirectoryRole::Logs, resolve(&config.logs)),
                (DirectoryRole::Dags, resolve(&config.dags)),
                (DirectoryRole::Plugins, resolve(&config.plugins)),
            ],
            mode: config.mode,
            owner_uid: config.owner_uid,
            owner_gid: config.owner_gid,
        }
    }

    pub fn get(&self, role: DirectoryRole) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, path)| path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirectoryRole, &Path)> {
        self.entries.iter().map(|(role, path)| (*role, path.as_path()))
    }

    /// Empty (or create) every directory and re-apply the permission mode.
    ///
    /// Content removal and ownership fixes are best effort; creation and mode
    /// changes are fatal.
    pub fn reset(&self) -> Result<ResetReport, StepError> {
        let mut report = ResetReport::default();
        for (role, path) in &self.entries {
            report.directories.push(self.reset_one(*role, path)?);
        }
        Ok(report)
    }

    fn reset_one(&self, role: DirectoryRole, path: &Path) -> Result<DirectoryOutcome, StepError> {
        let mut outcome = DirectoryOutcome {
            role,
            path: path.to_path_buf(),
            created: false,
            removed_entries: 0,
            warnings: Vec::new(),
        };

        if path.is_dir() {
            match fs::read_dir(path) {
                Ok(entries) => {
                    for entry in entries {
                        let entry_path = match entry {
                            Ok(entry) => entry.path(),
                            Err(err) => {
                                warn!(directory = %path.display(), error = %err, "unable to read directory entry");
                                outcome.warnings.push(err.to_string());
                                continue;
                            }
                        };
                        match remove_entry(&entry_path) {
                            Ok(()) => outcome.removed_entries += 1,
                            Err(err) => {
                                warn!(entry = %entry_path.display(), error = %err, "unable to remove entry");
                                outcome
                                    .warnings
                                    .push(format!("{}: {}", entry_path.display(), err));
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(directory = %path.display(), error = %err, "unable to list directory");
                    outcome.warnings.push(err.to_string());
                }
            }
        } else {
            // A stray file where the directory belongs has to go before creation.
            if fs::symlink_metadata(path).is_ok() {
                fs::remove_file(path)
                    .map_err(|err| StepError::filesystem("remove stray file", path, err))?;
            }
            fs::create_dir_all(path)
                .map_err(|err| StepError::filesystem("create directory", path, err))?;
            outcome.created = true;
        }

        apply_mode(path, self.mode)
            .map_err(|err| StepError::filesystem("set permissions on", path, err))?;

        if self.owner_uid.is_some() || self.owner_gid.is_some() {
            if let Err(err) = apply_owner(path, self.owner_uid, self.owner_gid) {
                warn!(directory = %path.display(), error = %err, "ownership fix skipped");
                outcome.warnings.push(format!("chown {}: {}", path.display(), err));
            }
        }

        debug!(
            role = %role,
            directory = %path.display(),
            created = outcome.created,
            removed = outcome.removed_entries,
            "working directory reset"
        );
        Ok(outcome)
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(path: &Path, _mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

#[cfg(unix)]
fn apply_owner(path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
    std::os::unix::fs::chown(path, uid, gid)
}

#[cfg(not(unix))]
fn apply_owner(_path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set_for(root: &Path) -> WorkingDirectorySet {
        WorkingDirectorySet::from_config(root, &DirectoriesConfig::default())
    }

    fn assert_empty_and_writable(path: &Path) {
        assert!(path.is_dir(), "{} should exist", path.display());
        assert_eq!(
            fs::read_dir(path).expect("readable").count(),
            0,
            "{} should be empty",
            path.display()
        );
        let probe = path.join(".probe");
        fs::write(&probe, b"ok").expect("directory is writable");
        fs::remove_file(probe).expect("probe removable");
    }

    #[test]
    fn creates_missing_directories() {
        let root = tempdir().expect("tempdir");
        let dirs = set_for(root.path());
        let report = dirs.reset().expect("reset succeeds");
        assert_eq!(report.directories.len(), 3);
        assert!(report.directories.iter().all(|d| d.created));
        for (_, path) in dirs.iter() {
            assert_empty_and_writable(path);
        }
        assert_eq!(report.summary(), "logs created, dags created, plugins created");
    }

    #[test]
    fn clears_existing_content_recursively() {
        let root = tempdir().expect("tempdir");
        let dirs = set_for(root.path());
        let dags = root.path().join("dags");
        fs::create_dir_all(dags.join("nested/deeper")).expect("nested dirs");
        fs::write(dags.join("etl_dag.py"), "print('x')").expect("dag file");
        fs::write(dags.join("nested/deeper/file.txt"), "x").expect("nested file");
        fs::create_dir_all(root.path().join("logs/scheduler")).expect("logs");

        let report = dirs.reset().expect("reset succeeds");
        let dags_outcome = &report.directories[1];
        assert_eq!(dags_outcome.role, DirectoryRole::Dags);
        assert!(!dags_outcome.created);
        assert_eq!(dags_outcome.removed_entries, 2);
        assert_eq!(report.warning_count(), 0);
        for (_, path) in dirs.iter() {
            assert_empty_and_writable(path);
        }
    }

    #[test]
    fn replaces_stray_file_with_directory() {
        let root = tempdir().expect("tempdir");
        fs::write(root.path().join("plugins"), "not a dir").expect("stray file");
        let dirs = set_for(root.path());
        dirs.reset().expect("reset succeeds");
        assert_empty_and_writable(&root.path().join("plugins"));
    }

    #[cfg(unix)]
    #[test]
    fn applies_configured_mode() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().expect("tempdir");
        let dirs = set_for(root.path());
        dirs.reset().expect("reset succeeds");
        for (_, path) in dirs.iter() {
            let mode = fs::metadata(path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o777);
        }
    }

    #[test]
    fn creation_failure_is_fatal() {
        let root = tempdir().expect("tempdir");
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "file").expect("blocker file");
        let config = DirectoriesConfig {
            logs: blocker.join("logs"),
            ..DirectoriesConfig::default()
        };
        let dirs = WorkingDirectorySet::from_config(root.path(), &config);
        let err = dirs.reset().expect_err("cannot create below a file");
        assert!(matches!(err, StepError::Filesystem { .. }));
    }
}
