/// Palioxis - authenticated remote destruct trigger
///
/// `server` mode waits for a mutually authenticated, signed and fresh destruct
/// request and runs the configured destroyer over its target list.
/// `client` mode sends that request to every node in a node list at once.
mod cli;
mod config;
mod error;
mod execution;
mod security;
mod verification;

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use cli::{Cli, Mode};
use config::schema::DaemonSection;
use config::{load_config, load_nodes, Config};
use error::ConfigError;
use execution::{DestructServer, Dispatcher};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match prepare(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("palioxis: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.log_level.as_deref(), &config.daemon) {
        eprintln!("palioxis: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.mode {
        Mode::Server(_) => run_server(config).await,
        Mode::Client(_) => run_client(config).await,
    }
}

/// Load the config file, apply CLI overrides, validate
fn prepare(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = load_config(cli.config.as_deref())?;

    match &cli.mode {
        Mode::Server(args) => args.apply(&mut config)?,
        Mode::Client(args) => args.apply(&mut config),
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(cli_level: Option<&str>, daemon: &DaemonSection) -> Result<(), ConfigError> {
    let env_level = std::env::var("RUST_LOG").ok();
    let filter = cli_level
        .map(str::to_string)
        .or(env_level)
        .unwrap_or_else(|| daemon.log_level.clone());

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);

    if let Some(path) = &daemon.log_file {
        builder.target(env_logger::Target::Pipe(Box::new(open_log_file(path)?)));
    }

    builder.init();
    Ok(())
}

/// Open `path` for appending, creating it and its parent directories
fn open_log_file(path: &Path) -> Result<File, ConfigError> {
    let open_err = |source| ConfigError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)
}

async fn run_server(config: Config) -> ExitCode {
    let targets = match config::targets::load_configured(&config.targets) {
        Ok(targets) => targets,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if targets.is_empty() {
        log::warn!("Target list is empty; a destruct request will destroy nothing");
    }

    let server = match DestructServer::from_config(&config, targets) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Cannot bind {}:{}: {}", config.server.host, config.server.port, e);
            return ExitCode::FAILURE;
        }
    };

    match server.run(listener).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_client(config: Config) -> ExitCode {
    let nodes = match load_nodes(&config.client.nodes_list) {
        Ok(nodes) => nodes,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = match Dispatcher::from_config(&config) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Dispatching destruct command to {} node(s)", nodes.len());
    let report = dispatcher.dispatch(&nodes).await;
    log::info!("{}", report);

    if report.any_acknowledged() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_created_with_parents_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/palioxis.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_log_file_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let err = open_log_file(&blocker.join("palioxis.log")).unwrap_err();
        assert!(matches!(err, ConfigError::LogFile { .. }));
        assert!(err.to_string().starts_with("cannot open log file"));
    }
}
