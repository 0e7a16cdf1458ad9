/// Target list parsing
///
/// One target per line. `#` comments and blank lines are ignored. A line may
/// carry an explicit kind prefix (`volume:`, `dir:`, `file:`); otherwise the
/// kind is inferred from the path.
use std::fs;
use std::path::{Path, PathBuf};

use super::schema::TargetsSection;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
    Volume,
}

/// One path scheduled for destruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl TargetEntry {
    pub fn new(path: impl Into<PathBuf>, kind: TargetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Parse a target list. Malformed lines are skipped, never fatal.
pub fn load(text: &str) -> Vec<TargetEntry> {
    let mut entries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => log::warn!("Skipping target line {}: {}", index + 1, reason),
        }
    }

    entries
}

/// Read and parse a target list file. Fails only if the file is unreadable.
pub fn load_file(path: &Path) -> Result<Vec<TargetEntry>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(load(&text))
}

/// Inline `Targets.directories` entries first, then the optional list file
pub fn load_configured(section: &TargetsSection) -> Result<Vec<TargetEntry>, ConfigError> {
    let mut entries = load(&section.directories);
    if let Some(list_file) = &section.list_file {
        entries.extend(load_file(list_file)?);
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<TargetEntry, String> {
    let (explicit, rest) = if let Some(rest) = line.strip_prefix("volume:") {
        (Some(TargetKind::Volume), rest)
    } else if let Some(rest) = line.strip_prefix("dir:") {
        (Some(TargetKind::Directory), rest)
    } else if let Some(rest) = line.strip_prefix("file:") {
        (Some(TargetKind::File), rest)
    } else {
        (None, line)
    };

    let path = rest.trim();
    if path.is_empty() {
        return Err(format!("empty path in {:?}", line));
    }
    if path.contains('\0') {
        return Err("path contains a NUL byte".to_string());
    }

    let kind = explicit.unwrap_or_else(|| infer_kind(path));
    Ok(TargetEntry::new(path, kind))
}

fn infer_kind(path: &str) -> TargetKind {
    if path.ends_with('/') || Path::new(path).is_dir() {
        TargetKind::Directory
    } else {
        TargetKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_comments_and_blank_lines() {
        let entries = load("# comment\n\n/a/b\n/c\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("/a/b"));
        assert_eq!(entries[1].path, PathBuf::from("/c"));
    }

    #[test]
    fn test_kind_prefixes_and_inference() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            "volume:/dev/sdb2\n  dir: /srv/keys \nfile:/etc/shadow.bak\n{}\n/nowhere/at/all\n/var/cache/\n",
            dir.path().display()
        );

        let entries = load(&text);
        let kinds: Vec<TargetKind> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TargetKind::Volume,
                TargetKind::Directory,
                TargetKind::File,
                TargetKind::Directory,
                TargetKind::File,
                TargetKind::Directory,
            ]
        );
        assert_eq!(entries[1].path, PathBuf::from("/srv/keys"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let entries = load("volume:\n/ok\ndir:   \n");
        assert_eq!(entries, vec![TargetEntry::new("/ok", TargetKind::File)]);
    }

    #[test]
    fn test_load_file_and_configured_merge() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# from file\n/from/file").unwrap();

        let section = TargetsSection {
            directories: "/inline/one\n".to_string(),
            list_file: Some(file.path().to_path_buf()),
        };

        let entries = load_configured(&section).unwrap();
        let paths: Vec<&Path> = entries.iter().map(|e| e.path.as_path()).collect();
        assert_eq!(paths, vec![Path::new("/inline/one"), Path::new("/from/file")]);
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let result = load_file(Path::new("/nonexistent/targets.txt"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
