/// Configuration schema for the palioxis server and client
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration structure, one field per config file section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "Server", default)]
    pub server: ServerSection,

    #[serde(rename = "Certificates", default)]
    pub certificates: CertificatesSection,

    #[serde(rename = "Destroyer", default)]
    pub destroyer: DestroyerSection,

    #[serde(rename = "Daemon", default)]
    pub daemon: DaemonSection,

    #[serde(rename = "Targets", default)]
    pub targets: TargetsSection,

    #[serde(rename = "Client", default)]
    pub client: ClientSection,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,

    /// Destruct key; proof tokens must carry an HMAC claim made with it
    pub key: String,

    /// Accepted clock skew around a token's `issued_at`, both directions
    pub freshness_window_secs: u64,

    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            key: "OHSNAP".to_string(),
            freshness_window_secs: 300,
            handshake_timeout_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

// The key must never reach a log line.
impl fmt::Debug for ServerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("key", &"<redacted>")
            .field("freshness_window_secs", &self.freshness_window_secs)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificatesSection {
    pub ca_cert: PathBuf,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,

    /// DNS name the client expects in the server certificate
    pub server_name: String,
}

impl Default for CertificatesSection {
    fn default() -> Self {
        Self {
            ca_cert: PathBuf::from("palioxis-ca.crt"),
            server_cert: PathBuf::from("palioxis-server.crt"),
            server_key: PathBuf::from("palioxis-server.key"),
            client_cert: PathBuf::from("palioxis-client.crt"),
            client_key: PathBuf::from("palioxis-client.key"),
            server_name: "palioxis-server".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DestroyerSection {
    pub module: DestroyerModule,

    /// Overwrite passes for `secure-wipe`
    pub shred_passes: u32,

    /// Overwrite passes for `fast`
    pub fast_passes: u32,

    /// Upper bound on the time spent on a single target
    pub target_timeout_secs: u64,

    /// Power the host off once a destruct run has finished
    pub power_off: bool,
}

impl Default for DestroyerSection {
    fn default() -> Self {
        Self {
            module: DestroyerModule::SecureWipe,
            shred_passes: 9,
            fast_passes: 3,
            target_timeout_secs: 300,
            power_off: false,
        }
    }
}

/// Destruction strategy selected by the `Destroyer.module` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DestroyerModule {
    /// Unlink only, no overwrite
    #[serde(rename = "default", alias = "delete", alias = "unlink")]
    Default,
    /// Random-data passes, then unlink
    #[serde(rename = "fast")]
    Fast,
    /// Patterned multi-pass overwrite, then unlink
    #[serde(rename = "secure-wipe", alias = "shred", alias = "wipe")]
    SecureWipe,
    /// Overwrite volume header regions only
    #[serde(rename = "truecrypt-volume", alias = "truecrypt")]
    TrueCryptVolume,
}

impl DestroyerModule {
    /// Parse a module name (case-insensitive), accepting the same aliases as the config file
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" | "delete" | "unlink" => Some(DestroyerModule::Default),
            "fast" => Some(DestroyerModule::Fast),
            "secure-wipe" | "shred" | "wipe" => Some(DestroyerModule::SecureWipe),
            "truecrypt-volume" | "truecrypt" => Some(DestroyerModule::TrueCryptVolume),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetsSection {
    /// Newline-delimited target list, same format as a target list file
    pub directories: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientSection {
    pub nodes_list: PathBuf,

    /// Per-node bound covering connect, handshake and response. The server
    /// answers only after its destruct run, so this must outlast the run.
    pub timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            nodes_list: PathBuf::from("nodes.txt"),
            timeout_secs: 600,
        }
    }
}

impl Config {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.server.freshness_window_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.server.key.is_empty() {
            return invalid("Server.key cannot be empty");
        }

        if self.server.port == 0 {
            return invalid("Server.port must be non-zero");
        }

        if self.server.freshness_window_secs == 0 {
            return invalid("Server.freshness_window_secs must be positive");
        }

        if self.server.handshake_timeout_secs == 0 || self.server.request_timeout_secs == 0 {
            return invalid("Server timeouts must be positive");
        }

        if self.destroyer.shred_passes == 0 || self.destroyer.fast_passes == 0 {
            return invalid("Destroyer pass counts must be at least 1");
        }

        if self.destroyer.target_timeout_secs == 0 {
            return invalid("Destroyer.target_timeout_secs must be positive");
        }

        if self.client.timeout_secs == 0 {
            return invalid("Client.timeout_secs must be positive");
        }

        if self.certificates.server_name.is_empty() {
            return invalid("Certificates.server_name cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.server.key = "".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.destroyer.shred_passes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.freshness_window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_values() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.server.freshness_window_secs, 300);
        assert_eq!(config.destroyer.module, DestroyerModule::SecureWipe);
        assert_eq!(config.destroyer.shred_passes, 9);
        assert_eq!(config.destroyer.fast_passes, 3);
        assert!(!config.destroyer.power_off);
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.client.nodes_list, PathBuf::from("nodes.txt"));
        assert_eq!(config.client.timeout_secs, 600);
        assert!(config.client.timeout_secs > config.destroyer.target_timeout_secs);
    }

    #[test]
    fn test_sections_and_aliases() {
        let text = r#"
            [Server]
            host = "127.0.0.1"
            port = 9443
            key = "s3cret"

            [Destroyer]
            module = "shred"
            shred_passes = 4

            [Targets]
            directories = """
            /srv/data
            # not this one
            /home/alice/keys
            """
        "#;

        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.server.port, 9443);
        assert_eq!(config.destroyer.module, DestroyerModule::SecureWipe);
        assert_eq!(config.destroyer.shred_passes, 4);
        assert!(config.targets.directories.contains("/srv/data"));
    }

    #[test]
    fn test_unknown_module_rejected() {
        let text = "[Destroyer]\nmodule = \"thermite\"\n";
        assert!(toml::from_str::<Config>(text).is_err());
        assert_eq!(DestroyerModule::from_str("thermite"), None);
        assert_eq!(DestroyerModule::from_str("TrueCrypt"), Some(DestroyerModule::TrueCryptVolume));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::default();
        let rendered = format!("{:?}", config.server);
        assert!(!rendered.contains("OHSNAP"));
        assert!(rendered.contains("<redacted>"));
    }
}
