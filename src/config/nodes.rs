/// Node list parsing for the client
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Shared secret bound into a node's proof tokens. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// One destruct target host
#[derive(Debug, Clone)]
pub struct Node {
    pub host: String,
    pub port: u16,
    pub shared_secret: SharedSecret,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Load the node list file. Any malformed line aborts the load.
pub fn load_nodes(path: &Path) -> Result<Vec<Node>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let nodes = parse_nodes(&text, path)?;
    if nodes.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "no nodes listed in {}",
            path.display()
        )));
    }
    Ok(nodes)
}

/// Parse `<host> <port> <shared_secret>` lines; `path` is only used in errors
pub fn parse_nodes(text: &str, path: &Path) -> Result<Vec<Node>, ConfigError> {
    let mut nodes = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let error = |reason: &str| ConfigError::NodeList {
            path: path.to_path_buf(),
            line: index + 1,
            reason: reason.to_string(),
        };

        let mut parts = line.split_whitespace();
        let (Some(host), Some(port), Some(secret)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(error("expected <host> <port> <shared_secret>"));
        };

        let port: u16 = port.parse().map_err(|_| error("port is not a number"))?;
        if port == 0 {
            return Err(error("port must be non-zero"));
        }

        nodes.push(Node {
            host: host.to_string(),
            port,
            shared_secret: SharedSecret::new(secret),
        });
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_nodes() {
        let text = "# fleet\n\n10.0.0.5 8443 alpha\nvault.internal   9443\tbravo extra\n";
        let nodes = parse_nodes(text, Path::new("nodes.txt")).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].to_string(), "10.0.0.5:8443");
        assert_eq!(nodes[1].host, "vault.internal");
        assert_eq!(nodes[1].shared_secret.expose(), "bravo");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "10.0.0.5 8443 alpha\n10.0.0.6 notaport bravo\n";
        match parse_nodes(text, Path::new("nodes.txt")) {
            Err(ConfigError::NodeList { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(parse_nodes("10.0.0.7 8443\n", Path::new("nodes.txt")).is_err());
        assert!(parse_nodes("10.0.0.7 0 x\n", Path::new("nodes.txt")).is_err());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let nodes = parse_nodes("h 1 topsecret\n", Path::new("n")).unwrap();
        let rendered = format!("{:?}", nodes);
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn test_empty_file_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();
        assert!(matches!(load_nodes(file.path()), Err(ConfigError::Invalid(_))));
    }
}
