/// Proof token authentication for destruct sessions
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::CertificateDer;

use super::hmac::{constant_time_eq, thumbprint, verify_claim};
use super::proof::ProofToken;
use super::replay::ReplayGuard;
use crate::error::AuthError;

/// What the server knows about one connection once the TLS handshake is done
#[derive(Debug, Clone)]
pub struct Session {
    pub peer_addr: SocketAddr,

    /// Leaf certificate the client presented, already chain-verified by TLS
    pub peer_certificate: Option<CertificateDer<'static>>,

    /// Method and target of the request actually received
    pub method: String,
    pub target: String,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// SHA-256 thumbprint of the client certificate
    pub fingerprint: String,

    /// Subject common name, for log lines only
    pub subject_hint: Option<String>,
    pub peer_addr: SocketAddr,
}

fn subject_hint(cert: &CertificateDer<'_>) -> Option<String> {
    let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref()).ok()?;
    let common_name = parsed.subject().iter_common_name().next()?;
    common_name.as_str().ok().map(str::to_string)
}

pub struct Authenticator {
    secret: String,
    window_secs: i64,
    replay: Arc<ReplayGuard>,
}

impl Authenticator {
    pub fn new(secret: impl Into<String>, window: Duration, replay: Arc<ReplayGuard>) -> Self {
        Self {
            secret: secret.into(),
            window_secs: i64::try_from(window.as_secs()).unwrap_or(i64::MAX),
            replay,
        }
    }

    pub fn authenticate(&self, session: &Session, token: &ProofToken) -> Result<Identity, AuthError> {
        self.authenticate_at(session, token, chrono::Utc::now().timestamp())
    }

    /// Run every gate in order against a fixed clock. The first failure wins.
    pub fn authenticate_at(
        &self,
        session: &Session,
        token: &ProofToken,
        now: i64,
    ) -> Result<Identity, AuthError> {
        // 1. mutual TLS produced a client certificate
        let cert = session
            .peer_certificate
            .as_ref()
            .ok_or(AuthError::CertificateUntrusted)?;
        let fingerprint = thumbprint(cert.as_ref());

        // 2. bound to this certificate and this request, signed by its key
        if !constant_time_eq(&token.key_binding_hash, &fingerprint)
            || token.method != session.method
            || token.target_uri != session.target
            || !token.verify_signature(cert)
        {
            return Err(AuthError::InvalidSignature);
        }

        // 3. fresh
        if now.abs_diff(token.issued_at) > self.window_secs.unsigned_abs() {
            return Err(AuthError::Expired {
                issued_at: token.issued_at,
                now,
            });
        }

        // 4. never seen; consumes the id
        if !self
            .replay
            .check_and_insert(&token.unique_id, token.issued_at, now)
        {
            return Err(AuthError::Replayed);
        }
        log::debug!("Replay guard holds {} record(s)", self.replay.len());

        // 5. made with our key
        if !verify_claim(&token.claim_input(), &self.secret, &token.embedded_secret_claim) {
            return Err(AuthError::SecretMismatch);
        }

        Ok(Identity {
            fingerprint,
            subject_hint: subject_hint(cert),
            peer_addr: session.peer_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedSecret;
    use crate::verification::proof::tests::test_identity;
    use crate::verification::proof::{DESTROY_METHOD, DESTROY_TARGET, ProofSigner};

    const NOW: i64 = 1_700_000_000;
    const KEY: &str = "OHSNAP";

    fn authenticator() -> Authenticator {
        let guard = Arc::new(ReplayGuard::new(Duration::from_secs(300)));
        Authenticator::new(KEY, Duration::from_secs(300), guard)
    }

    fn session(cert: &CertificateDer<'static>) -> Session {
        Session {
            peer_addr: "127.0.0.1:50000".parse().unwrap(),
            peer_certificate: Some(cert.clone()),
            method: DESTROY_METHOD.to_string(),
            target: DESTROY_TARGET.to_string(),
        }
    }

    fn mint(signer: &ProofSigner, secret: &str, issued_at: i64) -> ProofToken {
        signer
            .mint(DESTROY_METHOD, DESTROY_TARGET, &SharedSecret::new(secret), issued_at)
            .unwrap()
    }

    #[test]
    fn test_valid_token_accepted_once() {
        let (cert, signer) = test_identity();
        let auth = authenticator();
        let token = mint(&signer, KEY, NOW);

        let identity = auth.authenticate_at(&session(&cert), &token, NOW).unwrap();
        assert_eq!(identity.fingerprint, thumbprint(cert.as_ref()));
        assert_eq!(identity.subject_hint.as_deref(), Some("palioxis-client"));

        assert_eq!(
            auth.authenticate_at(&session(&cert), &token, NOW + 1),
            Err(AuthError::Replayed)
        );
    }

    #[test]
    fn test_stale_token_expired_even_if_signed() {
        let (cert, signer) = test_identity();
        let auth = authenticator();

        let stale = mint(&signer, KEY, NOW - 301);
        assert!(matches!(
            auth.authenticate_at(&session(&cert), &stale, NOW),
            Err(AuthError::Expired { .. })
        ));

        let future = mint(&signer, KEY, NOW + 301);
        assert!(matches!(
            auth.authenticate_at(&session(&cert), &future, NOW),
            Err(AuthError::Expired { .. })
        ));

        let edge = mint(&signer, KEY, NOW - 300);
        assert!(auth.authenticate_at(&session(&cert), &edge, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret_mismatch() {
        let (cert, signer) = test_identity();
        let auth = authenticator();
        let token = mint(&signer, "not-the-key", NOW);

        assert_eq!(
            auth.authenticate_at(&session(&cert), &token, NOW),
            Err(AuthError::SecretMismatch)
        );
    }

    #[test]
    fn test_token_from_other_key_pair_rejected() {
        let (cert, _) = test_identity();
        let (_, other_signer) = test_identity();
        let auth = authenticator();
        let token = mint(&other_signer, KEY, NOW);

        assert_eq!(
            auth.authenticate_at(&session(&cert), &token, NOW),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_request_mismatch_rejected() {
        let (cert, signer) = test_identity();
        let auth = authenticator();
        let token = mint(&signer, KEY, NOW);

        let mut other_request = session(&cert);
        other_request.target = "/status".to_string();
        assert_eq!(
            auth.authenticate_at(&other_request, &token, NOW),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_client_certificate() {
        let (cert, signer) = test_identity();
        let auth = authenticator();
        let token = mint(&signer, KEY, NOW);

        let mut anonymous = session(&cert);
        anonymous.peer_certificate = None;
        assert_eq!(
            auth.authenticate_at(&anonymous, &token, NOW),
            Err(AuthError::CertificateUntrusted)
        );
    }
}
