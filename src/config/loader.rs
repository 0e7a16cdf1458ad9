/// Configuration loader
use std::fs;
use std::path::{Path, PathBuf};

use super::schema::Config;
use crate::error::ConfigError;

const SEARCH_PATHS: [&str; 3] = ["palioxis.toml", "~/.palioxis.toml", "/etc/palioxis.toml"];

/// Load configuration from an explicit path, or from the first file found in
/// the default search paths. Falls back to built-in defaults when none exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }

    for candidate in SEARCH_PATHS {
        let path = PathBuf::from(shellexpand::tilde(candidate).into_owned());
        if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            return load_from_path(&path);
        }
    }

    log::warn!("No configuration file found, using defaults");
    Ok(Config::default())
}

/// Read and parse one TOML config file
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[Server]\nport = 10443\nkey = \"abc\"\n\n[Client]\nnodes_list = \"/etc/palioxis/nodes.txt\""
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 10443);
        assert_eq!(config.server.key, "abc");
        assert_eq!(config.client.nodes_list, PathBuf::from("/etc/palioxis/nodes.txt"));
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[Server\nport = ").unwrap();

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("palioxis.example.toml");
        let config = load_from_path(&path).unwrap();
        assert!(config.validate().is_ok());

        let targets = crate::config::targets::load_configured(&config.targets).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[2].kind, crate::config::TargetKind::Volume);
    }

    #[test]
    fn test_missing_explicit_path() {
        let result = load_config(Some(Path::new("/nonexistent/palioxis.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
