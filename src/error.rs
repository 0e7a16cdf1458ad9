/// Error taxonomy shared by the server, the dispatcher and the destroyers
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup configuration failures. Fatal before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("node list {}, line {line}: {reason}", path.display())]
    NodeList {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("cannot open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("certificate material {}: {reason}", path.display())]
    Certificate { path: PathBuf, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// Authentication gate failures. Each one ends a single session.
///
/// The variants are precise for local logging only; the wire always sees a
/// plain `nack`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("certificate untrusted")]
    CertificateUntrusted,

    #[error("token signature invalid")]
    InvalidSignature,

    #[error("token expired (issued_at={issued_at}, now={now})")]
    Expired { issued_at: i64, now: i64 },

    #[error("token replayed")]
    Replayed,

    #[error("secret mismatch")]
    SecretMismatch,
}

/// Per-node transport failures on the client side.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Frame codec failures.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed before a complete frame")]
    Closed,

    #[error("frame exceeds {0} bytes")]
    TooLarge(usize),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Per-target destruction failure. Recorded, never propagated past the batch.
#[derive(Error, Debug)]
pub enum DestructionError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a volume", path.display())]
    NotAVolume { path: PathBuf },

    #[error("{count} entries under {} could not be destroyed, first: {first}", path.display())]
    Partial {
        path: PathBuf,
        count: usize,
        first: Box<DestructionError>,
    },
}

impl DestructionError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        DestructionError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
