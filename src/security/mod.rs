/// Security module - destroyer registry and host power-off
///
/// The set of destroyers is closed: a config string selects one
/// `DestroyerKind`, and every variant implements `destroy_one`. A batch never
/// stops early; each target ends up destroyed, skipped (missing) or failed.
pub mod destruct;
pub mod power;
pub mod volume;

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::config::schema::DestroyerSection;
use crate::config::{DestroyerModule, TargetEntry, TargetKind};
use crate::error::DestructionError;
use destruct::{random_patterns, secure_patterns};

pub use power::power_off;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyerKind {
    /// Unlink without overwrite
    Default,
    /// Random-data passes, then unlink
    Fast { passes: u32 },
    /// Patterned passes, then rename and unlink
    SecureWipe { passes: u32 },
    /// Header areas only
    TrueCryptVolume,
}

/// Per-target result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Destroyed,
    SkippedMissing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyerResult {
    pub target: TargetEntry,
    pub outcome: Outcome,
}

/// Aggregate counts, the only part of a run reported to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub destroyed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(results: &[DestroyerResult]) -> Self {
        results.iter().fold(Summary::default(), |mut acc, r| {
            match r.outcome {
                Outcome::Destroyed => acc.destroyed += 1,
                Outcome::SkippedMissing => acc.skipped += 1,
                Outcome::Failed(_) => acc.failed += 1,
            }
            acc
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "destroyed={} skipped={} failed={}",
            self.destroyed, self.skipped, self.failed
        )
    }
}

impl DestroyerKind {
    pub fn from_config(section: &DestroyerSection) -> Self {
        match section.module {
            DestroyerModule::Default => DestroyerKind::Default,
            DestroyerModule::Fast => DestroyerKind::Fast {
                passes: section.fast_passes,
            },
            DestroyerModule::SecureWipe => DestroyerKind::SecureWipe {
                passes: section.shred_passes,
            },
            DestroyerModule::TrueCryptVolume => DestroyerKind::TrueCryptVolume,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DestroyerKind::Default => "default",
            DestroyerKind::Fast { .. } => "fast",
            DestroyerKind::SecureWipe { .. } => "secure-wipe",
            DestroyerKind::TrueCryptVolume => "truecrypt-volume",
        }
    }

    /// Destroy one target. Never panics, never aborts the caller's batch.
    pub fn destroy_one(&self, target: &TargetEntry) -> Outcome {
        let path = target.path.as_path();

        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Outcome::SkippedMissing,
            Err(e) => return Outcome::Failed(DestructionError::io("stat", path, e).to_string()),
        };

        let result = if meta.file_type().is_symlink() {
            self.destroy_through_link(path, target.kind)
        } else {
            self.destroy_resolved(path, meta.is_dir(), target.kind)
        };

        match result {
            Ok(()) => Outcome::Destroyed,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    fn destroy_resolved(&self, path: &Path, is_dir: bool, kind: TargetKind) -> Result<(), DestructionError> {
        if kind == TargetKind::Volume || *self == DestroyerKind::TrueCryptVolume {
            volume::destroy_volume(path)
        } else if is_dir {
            self.destroy_dir(path)
        } else {
            self.destroy_file(path)
        }
    }

    /// A configured target that is itself a link: destroy what it points
    /// to, then the link. Links found while walking a directory are never
    /// followed.
    fn destroy_through_link(&self, link: &Path, kind: TargetKind) -> Result<(), DestructionError> {
        match fs::canonicalize(link) {
            Ok(real) => {
                let meta = fs::metadata(&real).map_err(|e| DestructionError::io("stat", &real, e))?;
                log::info!("{} resolves to {}", link.display(), real.display());
                self.destroy_resolved(&real, meta.is_dir(), kind)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("{} is a dangling link, removing the link only", link.display());
            }
            Err(e) => return Err(DestructionError::io("resolve", link, e)),
        }
        destruct::unlink(link)
    }

    fn destroy_file(&self, path: &Path) -> Result<(), DestructionError> {
        let meta = fs::symlink_metadata(path).map_err(|e| DestructionError::io("stat", path, e))?;

        // Links, sockets, fifos and device nodes are unlinked, never opened.
        if !meta.is_file() {
            return destruct::unlink(path);
        }

        match self {
            DestroyerKind::Default => destruct::unlink(path),
            DestroyerKind::Fast { passes } => {
                destruct::overwrite_file(path, &random_patterns(*passes))?;
                destruct::unlink(path)
            }
            DestroyerKind::SecureWipe { passes } => {
                let stats = destruct::overwrite_file(path, &secure_patterns(*passes))?;
                log::debug!(
                    "Wiped {} with {} passes ({} bytes)",
                    path.display(),
                    stats.passes,
                    stats.bytes_written
                );
                destruct::scrub_and_unlink(path)
            }
            DestroyerKind::TrueCryptVolume => volume::destroy_volume(path),
        }
    }

    /// Depth-first: files first, then the directories that held them
    fn destroy_dir(&self, dir: &Path) -> Result<(), DestructionError> {
        let mut failures = Vec::new();
        self.destroy_tree(dir, &mut failures);

        let count = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(DestructionError::Partial {
                path: dir.to_path_buf(),
                count,
                first: Box::new(first),
            }),
        }
    }

    fn destroy_tree(&self, dir: &Path, failures: &mut Vec<DestructionError>) {
        let entries: Vec<_> = match fs::read_dir(dir) {
            Ok(entries) => entries.collect(),
            Err(e) => {
                failures.push(DestructionError::io("read directory", dir, e));
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(DestructionError::io("read directory", dir, e));
                    continue;
                }
            };

            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => self.destroy_tree(&path, failures),
                Ok(_) => {
                    if let Err(e) = self.destroy_file(&path) {
                        log::warn!("{}", e);
                        failures.push(e);
                    }
                }
                Err(e) => failures.push(DestructionError::io("stat", &path, e)),
            }
        }

        if let Err(e) = fs::remove_dir(dir) {
            failures.push(DestructionError::io("remove directory", dir, e));
        }
    }
}

/// Destroy every target in order, each bounded by `per_target`.
///
/// Blocking I/O runs on the blocking pool. A target that overruns its bound
/// is abandoned and recorded as failed; the batch moves on. Per-target detail
/// goes to the local log only.
pub async fn destroy(targets: &[TargetEntry], kind: DestroyerKind, per_target: Duration) -> Vec<DestroyerResult> {
    log::warn!(
        "🔥 Destroying {} target(s) with the {} destroyer",
        targets.len(),
        kind.name()
    );

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let entry = target.clone();
        let task = tokio::task::spawn_blocking(move || kind.destroy_one(&entry));

        let outcome = match tokio::time::timeout(per_target, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Outcome::Failed(format!("destroyer task failed: {}", e)),
            Err(_) => Outcome::Failed(format!("timed out after {:?}", per_target)),
        };

        log_outcome(target, &outcome);
        results.push(DestroyerResult {
            target: target.clone(),
            outcome,
        });
    }
    results
}

fn log_outcome(target: &TargetEntry, outcome: &Outcome) {
    match outcome {
        Outcome::Destroyed => log::info!("Destroyed {}", target.path.display()),
        Outcome::SkippedMissing => log::warn!("Path does not exist: {}", target.path.display()),
        Outcome::Failed(reason) => log::error!("Failed to destroy {}: {}", target.path.display(), reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file_entry(path: PathBuf) -> TargetEntry {
        TargetEntry::new(path, TargetKind::File)
    }

    #[test]
    fn test_from_config() {
        let mut section = DestroyerSection::default();
        assert_eq!(DestroyerKind::from_config(&section), DestroyerKind::SecureWipe { passes: 9 });

        section.module = DestroyerModule::Fast;
        assert_eq!(DestroyerKind::from_config(&section), DestroyerKind::Fast { passes: 3 });

        section.module = DestroyerModule::TrueCryptVolume;
        assert_eq!(DestroyerKind::from_config(&section).name(), "truecrypt-volume");
    }

    #[test]
    fn test_missing_target_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let kind = DestroyerKind::SecureWipe { passes: 9 };
        let outcome = kind.destroy_one(&file_entry(dir.path().join("absent")));
        assert_eq!(outcome, Outcome::SkippedMissing);
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();

        // A path under a regular file cannot be stat'ed (ENOTDIR), even as root
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let ok = dir.path().join("ok.txt");
        fs::write(&ok, b"payload").unwrap();

        let targets = vec![
            file_entry(dir.path().join("missing")),
            file_entry(blocker.join("child")),
            file_entry(ok.clone()),
        ];

        let results = destroy(&targets, DestroyerKind::SecureWipe { passes: 2 }, Duration::from_secs(30)).await;
        assert_eq!(results[0].outcome, Outcome::SkippedMissing);
        assert!(matches!(results[1].outcome, Outcome::Failed(_)));
        assert_eq!(results[2].outcome, Outcome::Destroyed);
        assert!(!ok.exists());

        let summary = Summary::of(&results);
        assert_eq!(summary.to_string(), "destroyed=1 skipped=1 failed=1");
    }

    #[test]
    fn test_directory_destroyed_depth_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("target");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        fs::write(root.join("a/mid.txt"), b"22").unwrap();
        fs::write(root.join("a/b/deep.txt"), b"333").unwrap();

        for kind in [
            DestroyerKind::Default,
            DestroyerKind::Fast { passes: 1 },
            DestroyerKind::SecureWipe { passes: 3 },
        ] {
            if !root.exists() {
                fs::create_dir_all(root.join("a")).unwrap();
                fs::write(root.join("a/again.txt"), b"4444").unwrap();
            }
            let entry = TargetEntry::new(root.clone(), TargetKind::Directory);
            assert_eq!(kind.destroy_one(&entry), Outcome::Destroyed, "{}", kind.name());
            assert!(!root.exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_directory_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside.txt");
        fs::write(&outside, b"keep me").unwrap();

        let root = dir.path().join("target");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let entry = TargetEntry::new(root.clone(), TargetKind::Directory);
        let outcome = DestroyerKind::SecureWipe { passes: 3 }.destroy_one(&entry);

        assert_eq!(outcome, Outcome::Destroyed);
        assert!(!root.exists());
        assert_eq!(fs::read(&outside).unwrap(), b"keep me");
    }

    #[cfg(unix)]
    #[test]
    fn test_top_level_file_link_destroys_the_file_it_names() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real_secret.key");
        fs::write(&real, b"TOP-SECRET-KEY").unwrap();

        // Second name for the same inode, to look at the data after unlink
        let observer = dir.path().join("observer");
        fs::hard_link(&real, &observer).unwrap();

        let link = dir.path().join("secret.key");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let outcome = DestroyerKind::SecureWipe { passes: 9 }.destroy_one(&file_entry(link.clone()));

        assert_eq!(outcome, Outcome::Destroyed);
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(!real.exists());
        let left = fs::read(&observer).unwrap();
        assert_eq!(left.len(), b"TOP-SECRET-KEY".len());
        assert_ne!(left, b"TOP-SECRET-KEY");
    }

    #[cfg(unix)]
    #[test]
    fn test_top_level_directory_link_destroys_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("vault");
        fs::create_dir(&vault).unwrap();
        fs::write(vault.join("wallet.dat"), b"COINS").unwrap();

        let link = dir.path().join("vault-link");
        std::os::unix::fs::symlink(&vault, &link).unwrap();

        let entry = TargetEntry::new(link.clone(), TargetKind::Directory);
        let outcome = DestroyerKind::SecureWipe { passes: 3 }.destroy_one(&entry);

        assert_eq!(outcome, Outcome::Destroyed);
        assert!(!vault.exists());
        assert!(fs::symlink_metadata(&link).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_top_level_link_removed() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();

        let outcome = DestroyerKind::Default.destroy_one(&file_entry(link.clone()));
        assert_eq!(outcome, Outcome::Destroyed);
        assert!(fs::symlink_metadata(&link).is_err());
    }

    #[test]
    fn test_secure_wipe_overwrites_before_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let original = vec![0x42u8; 100 * 1024];
        fs::write(&path, &original).unwrap();

        let observer = dir.path().join("observer");
        fs::hard_link(&path, &observer).unwrap();

        let outcome = DestroyerKind::SecureWipe { passes: 9 }.destroy_one(&file_entry(path.clone()));

        assert_eq!(outcome, Outcome::Destroyed);
        assert!(!path.exists());
        let left = fs::read(&observer).unwrap();
        assert_eq!(left.len(), original.len());
        assert!(left.iter().filter(|&&b| b == 0x42).count() < original.len() / 16);
    }

    #[tokio::test]
    async fn test_target_overrunning_its_bound_fails() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.img");
        fs::write(&big, vec![0u8; 8 * 1024 * 1024]).unwrap();

        let targets = vec![file_entry(big)];
        let results = destroy(&targets, DestroyerKind::SecureWipe { passes: 9 }, Duration::from_millis(1)).await;

        assert!(matches!(
            &results[0].outcome,
            Outcome::Failed(reason) if reason.starts_with("timed out")
        ));
        assert_eq!(Summary::of(&results).failed, 1);
    }

    #[test]
    fn test_volume_kind_and_module() {
        let dir = tempfile::tempdir().unwrap();
        let vol = dir.path().join("vault.tc");
        fs::write(&vol, vec![0u8; 300 * 1024]).unwrap();

        // Volume entries use the header destroyer whatever the module
        let outcome = DestroyerKind::Default.destroy_one(&TargetEntry::new(vol.clone(), TargetKind::Volume));
        assert_eq!(outcome, Outcome::Destroyed);
        assert!(!vol.exists());

        let folder = TargetEntry::new(dir.path().to_path_buf(), TargetKind::Directory);
        assert!(matches!(
            DestroyerKind::TrueCryptVolume.destroy_one(&folder),
            Outcome::Failed(reason) if reason.contains("not a volume")
        ));
    }
}
