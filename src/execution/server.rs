/// Destruct server
///
/// Per connection: Handshaking → Authenticating → Executing → Responding →
/// Closed. Any failure before Executing answers a bare `nack` and closes, so
/// a caller cannot tell which check refused it.
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::ServerConfig;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use super::tls::server_config;
use super::wire::{read_frame, write_frame, DestructRequest, DestructResponse, DESTRUCT_COMMAND};
use crate::config::{Config, TargetEntry};
use crate::error::{AuthError, ConfigError};
use crate::security::{self, DestroyerKind, Summary};
use crate::verification::{Authenticator, ReplayGuard, Session, DESTROY_METHOD, DESTROY_TARGET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Handshaking,
    Authenticating,
    Executing,
    Responding,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Handshaking => "handshaking",
            SessionState::Authenticating => "authenticating",
            SessionState::Executing => "executing",
            SessionState::Responding => "responding",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Connection {
    peer_addr: SocketAddr,
    state: SessionState,
}

impl Connection {
    fn new(peer_addr: SocketAddr) -> Self {
        log::debug!("[{}] {}", peer_addr, SessionState::Handshaking);
        Self {
            peer_addr,
            state: SessionState::Handshaking,
        }
    }

    fn enter(&mut self, next: SessionState) {
        log::debug!("[{}] {} -> {}", self.peer_addr, self.state, next);
        self.state = next;
    }
}

pub struct DestructServer {
    acceptor: TlsAcceptor,
    authenticator: Authenticator,
    targets: Vec<TargetEntry>,
    destroyer: DestroyerKind,
    handshake_timeout: Duration,
    request_timeout: Duration,
    target_timeout: Duration,
    power_off: bool,

    /// One destruct run at a time
    execution: Mutex<()>,
}

impl DestructServer {
    pub fn from_config(config: &Config, targets: Vec<TargetEntry>) -> Result<Self, ConfigError> {
        let tls = server_config(&config.certificates)?;
        let replay = Arc::new(ReplayGuard::new(config.freshness_window()));
        let authenticator = Authenticator::new(config.server.key.clone(), config.freshness_window(), replay);

        Ok(Self::new(tls, authenticator, targets, config))
    }

    fn new(
        tls: Arc<ServerConfig>,
        authenticator: Authenticator,
        targets: Vec<TargetEntry>,
        config: &Config,
    ) -> Self {
        Self {
            acceptor: TlsAcceptor::from(tls),
            authenticator,
            targets,
            destroyer: DestroyerKind::from_config(&config.destroyer),
            handshake_timeout: Duration::from_secs(config.server.handshake_timeout_secs),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            target_timeout: Duration::from_secs(config.destroyer.target_timeout_secs),
            power_off: config.destroyer.power_off,
            execution: Mutex::new(()),
        }
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        tokio::select! {
            result = self.serve(listener) => result,
            _ = shutdown_signal() => {
                log::info!("Received shutdown signal, shutting down...");
                Ok(())
            }
        }
    }

    /// Accept loop; every connection is handled on its own task
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        log::info!(
            "Palioxis server listening on {} ({} target(s), {} destroyer)",
            listener.local_addr()?,
            self.targets.len(),
            self.destroyer.name()
        );

        loop {
            let (tcp, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::error!("Accept failed: {}", e);
                    continue;
                }
            };

            log::info!("Client connected from {}", peer_addr);
            let server = Arc::clone(&self);
            tokio::spawn(async move { server.handle_connection(tcp, peer_addr).await });
        }
    }

    async fn handle_connection(&self, tcp: TcpStream, peer_addr: SocketAddr) {
        let mut conn = Connection::new(peer_addr);

        let tls = match timeout(self.handshake_timeout, self.acceptor.accept(tcp)).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                log::warn!("[{}] {}: {}", peer_addr, AuthError::CertificateUntrusted, e);
                conn.enter(SessionState::Closed);
                return;
            }
            Err(_) => {
                log::warn!("[{}] TLS handshake timed out", peer_addr);
                conn.enter(SessionState::Closed);
                return;
            }
        };

        let peer_certificate = tls
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| cert.clone().into_owned());
        let mut stream = BufReader::new(tls);

        conn.enter(SessionState::Authenticating);

        let request: DestructRequest = match timeout(self.request_timeout, read_frame(&mut stream)).await {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                log::warn!("[{}] Bad request frame: {}", peer_addr, e);
                return self.reject(&mut conn, stream.get_mut()).await;
            }
            Err(_) => {
                log::warn!("[{}] Timed out waiting for the request", peer_addr);
                return self.reject(&mut conn, stream.get_mut()).await;
            }
        };

        if request.command != DESTRUCT_COMMAND
            || request.method != DESTROY_METHOD
            || request.target != DESTROY_TARGET
        {
            log::warn!(
                "[{}] Unsupported request: {} {} ({})",
                peer_addr,
                request.method,
                request.target,
                request.command
            );
            return self.reject(&mut conn, stream.get_mut()).await;
        }

        let session = Session {
            peer_addr,
            peer_certificate,
            method: request.method.clone(),
            target: request.target.clone(),
        };

        let identity = match self.authenticator.authenticate(&session, &request.proof) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("[{}] Authentication failed: {}", peer_addr, e);
                return self.reject(&mut conn, stream.get_mut()).await;
            }
        };

        log::info!(
            "[{}] Client authenticated as: {}",
            peer_addr,
            identity.subject_hint.as_deref().unwrap_or("<no common name>")
        );
        log::warn!(
            "[{}] Destruct authorized for client certificate {}, executing",
            peer_addr,
            identity.fingerprint
        );
        conn.enter(SessionState::Executing);

        let summary = {
            let _running = self.execution.lock().await;
            let results = security::destroy(&self.targets, self.destroyer, self.target_timeout).await;
            Summary::of(&results)
        };
        log::warn!("Self-destruct sequence completed: {}", summary);

        conn.enter(SessionState::Responding);
        self.respond(&mut conn, stream.get_mut(), &DestructResponse::ack(summary.to_string()))
            .await;

        if self.power_off {
            match tokio::task::spawn_blocking(security::power_off).await {
                Ok(Err(e)) => log::error!("Failed to power off: {}", e),
                Err(e) => log::error!("Power-off task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    async fn reject(&self, conn: &mut Connection, stream: &mut TlsStream<TcpStream>) {
        self.respond(conn, stream, &DestructResponse::rejected()).await;
    }

    async fn respond(&self, conn: &mut Connection, stream: &mut TlsStream<TcpStream>, response: &DestructResponse) {
        match timeout(self.request_timeout, write_frame(stream, response)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("[{}] Failed to send response: {}", conn.peer_addr, e),
            Err(_) => log::warn!("[{}] Timed out sending response", conn.peer_addr),
        }
        let _ = stream.shutdown().await;
        conn.enter(SessionState::Closed);
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
