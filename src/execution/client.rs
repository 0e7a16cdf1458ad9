/// Multi-node destruct dispatcher
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::tls::client_material;
use super::wire::{read_frame, write_frame, DestructRequest, DestructResponse, Status, DESTRUCT_COMMAND};
use crate::config::{Config, Node};
use crate::error::{ConfigError, NetworkError};
use crate::verification::{ProofSigner, DESTROY_METHOD, DESTROY_TARGET};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Acknowledged(String),
    Rejected(String),
    Unreachable(String),
}

impl NodeOutcome {
    pub fn is_ack(&self) -> bool {
        matches!(self, NodeOutcome::Acknowledged(_))
    }
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOutcome::Acknowledged(detail) => write!(f, "acknowledged ({})", detail),
            NodeOutcome::Rejected(reason) => write!(f, "rejected ({})", reason),
            NodeOutcome::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node: String,
    pub outcome: NodeOutcome,
}

/// Per-node results in node-list order, with totals
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<NodeResult>,
    pub acknowledged: usize,
    pub failed: usize,
}

impl BatchReport {
    fn new(results: Vec<NodeResult>) -> Self {
        let acknowledged = results.iter().filter(|r| r.outcome.is_ack()).count();
        let failed = results.len() - acknowledged;
        Self {
            results,
            acknowledged,
            failed,
        }
    }

    pub fn any_acknowledged(&self) -> bool {
        self.acknowledged > 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} node(s): {} succeeded, {} failed",
            self.results.len(),
            self.acknowledged,
            self.failed
        )
    }
}

pub struct Dispatcher {
    tls: Arc<ClientConfig>,
    signer: Arc<ProofSigner>,
    server_name: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let (tls, signer) = client_material(&config.certificates)?;
        Ok(Self {
            tls,
            signer: Arc::new(signer),
            server_name: config.certificates.server_name.clone(),
            timeout: config.client_timeout(),
        })
    }

    /// Trigger every node concurrently. One bad node never holds up the rest.
    pub async fn dispatch(&self, nodes: &[Node]) -> BatchReport {
        let mut tasks = Vec::with_capacity(nodes.len());

        for node in nodes {
            let tls = Arc::clone(&self.tls);
            let signer = Arc::clone(&self.signer);
            let server_name = self.server_name.clone();
            let limit = self.timeout;
            let node = node.clone();

            tasks.push(tokio::spawn(async move {
                let outcome = match timeout(limit, trigger(&tls, &signer, &server_name, &node)).await {
                    Ok(outcome) => outcome,
                    Err(_) => NodeOutcome::Unreachable(NetworkError::Timeout(limit).to_string()),
                };
                NodeResult {
                    node: node.to_string(),
                    outcome,
                }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (task, node) in tasks.into_iter().zip(nodes) {
            let result = task.await.unwrap_or_else(|e| NodeResult {
                node: node.to_string(),
                outcome: NodeOutcome::Unreachable(format!("task failed: {}", e)),
            });
            log_result(&result);
            results.push(result);
        }

        BatchReport::new(results)
    }
}

fn log_result(result: &NodeResult) {
    match &result.outcome {
        NodeOutcome::Acknowledged(_) => log::info!("[{}] {}", result.node, result.outcome),
        _ => log::error!("[{}] {}", result.node, result.outcome),
    }
}

async fn trigger(tls: &Arc<ClientConfig>, signer: &ProofSigner, server_name: &str, node: &Node) -> NodeOutcome {
    log::info!("Sending destruct command to {}", node);

    let proof = match signer.mint(
        DESTROY_METHOD,
        DESTROY_TARGET,
        &node.shared_secret,
        chrono::Utc::now().timestamp(),
    ) {
        Ok(proof) => proof,
        Err(e) => return NodeOutcome::Unreachable(format!("cannot sign proof: {}", e)),
    };

    let request = DestructRequest {
        command: DESTRUCT_COMMAND.to_string(),
        method: DESTROY_METHOD.to_string(),
        target: DESTROY_TARGET.to_string(),
        proof,
    };

    match send_request(tls, server_name, &node.host, node.port, &request).await {
        Ok(response) => match response.status {
            Status::Ack => NodeOutcome::Acknowledged(response.reason.unwrap_or_default()),
            Status::Nack => NodeOutcome::Rejected(response.reason.unwrap_or_default()),
        },
        Err(e) => NodeOutcome::Unreachable(e.to_string()),
    }
}

/// Connect, complete the mutual-TLS handshake, send one request and read one response
pub(crate) async fn send_request(
    tls: &Arc<ClientConfig>,
    server_name: &str,
    host: &str,
    port: u16,
    request: &DestructRequest,
) -> Result<DestructResponse, NetworkError> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|_| NetworkError::ServerName(server_name.to_string()))?;

    let tcp = TcpStream::connect((host, port)).await.map_err(NetworkError::Connect)?;
    let stream = TlsConnector::from(Arc::clone(tls))
        .connect(name, tcp)
        .await
        .map_err(NetworkError::Handshake)?;

    let mut stream = BufReader::new(stream);
    write_frame(stream.get_mut(), request).await?;
    let response = read_frame(&mut stream).await?;
    Ok(response)
}
