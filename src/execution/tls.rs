/// Certificate material loading and mutual-TLS configuration
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::config::schema::CertificatesSection;
use crate::error::ConfigError;
use crate::verification::ProofSigner;

fn cert_error(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::Certificate {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Read every certificate from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| cert_error(path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| cert_error(path, e))?;

    if certs.is_empty() {
        return Err(cert_error(path, "no certificates found"));
    }
    Ok(certs)
}

/// Read the first private key (PKCS#8, SEC1 or PKCS#1) from a PEM file
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    PrivateKeyDer::from_pem_file(path).map_err(|e| cert_error(path, e))
}

/// Trust anchors: only the configured CA is trusted
pub fn load_roots(path: &Path) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(|e| cert_error(path, e))?;
    }
    Ok(roots)
}

/// Server side: own certificate, and a mandatory client certificate chained to the CA
pub fn server_config(certs: &CertificatesSection) -> Result<Arc<ServerConfig>, ConfigError> {
    let roots = load_roots(&certs.ca_cert)?;
    let chain = load_certs(&certs.server_cert)?;
    let key = load_key(&certs.server_key)?;

    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider())
        .build()
        .map_err(|e| cert_error(&certs.ca_cert, e))?;

    let config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)?;

    Ok(Arc::new(config))
}

/// Client side: TLS config presenting the client certificate, plus a proof
/// signer over the same key pair
pub fn client_material(certs: &CertificatesSection) -> Result<(Arc<ClientConfig>, ProofSigner), ConfigError> {
    let roots = load_roots(&certs.ca_cert)?;
    let chain = load_certs(&certs.client_cert)?;
    let key = load_key(&certs.client_key)?;

    let signer = ProofSigner::new(&chain[0], &key).map_err(|e| cert_error(&certs.client_key, e))?;

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)?;

    Ok((Arc::new(config), signer))
}
