/// Command-line surface
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, DestroyerModule};
use crate::error::ConfigError;

#[derive(Debug, Parser)]
#[command(name = "palioxis", version, about = "Authenticated remote destruct trigger")]
pub struct Cli {
    /// Config file; defaults to ./palioxis.toml, ~/.palioxis.toml, /etc/palioxis.toml
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `palioxis=trace`; beats RUST_LOG and Daemon.log_level
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Listen for destruct requests and destroy the configured targets
    #[command(name = "server")]
    Server(ServerArgs),

    /// Send a destruct request to every node in the node list
    #[command(name = "client")]
    Client(ClientArgs),
}

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[arg(long = "host")]
    pub host: Option<String>,

    #[arg(short = 'p', long = "port", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Destruct key clients must prove knowledge of
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// default, fast, secure-wipe or truecrypt-volume
    #[arg(short = 'd', long = "destroyer")]
    pub destroyer: Option<String>,
}

#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Node list, one `<host> <port> <shared_secret>` per line
    #[arg(short = 'l', long = "list")]
    pub list: Option<PathBuf>,

    /// Per-node timeout in seconds
    #[arg(short = 't', long = "timeout", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(key) = &self.key {
            config.server.key = key.clone();
        }
        if let Some(name) = &self.destroyer {
            config.destroyer.module = DestroyerModule::from_str(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown destroyer module {:?}", name)))?;
        }
        Ok(())
    }
}

impl ClientArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(list) = &self.list {
            config.client.nodes_list = list.clone();
        }
        if let Some(secs) = self.timeout {
            config.client.timeout_secs = secs;
        }
    }
}
