/// Proof-of-possession tokens
///
/// A token is signed with the private key behind the client's TLS
/// certificate and carries the certificate's SHA-256 thumbprint, so it is
/// only accepted on a session authenticated with that same certificate. The
/// shared secret never travels: the token carries an HMAC made with it.
use std::sync::Arc;

use rustls::SignatureScheme;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, SignatureVerificationAlgorithm};
use rustls::sign::SigningKey;
use serde::{Deserialize, Serialize};

use super::hmac::{create_claim, thumbprint};
use crate::config::SharedSecret;

/// Request method every destruct proof is bound to
pub const DESTROY_METHOD: &str = "POST";

/// Request target every destruct proof is bound to
pub const DESTROY_TARGET: &str = "/destroy";

const SIGNING_CONTEXT: &str = "palioxis-proof-v1";

/// Schemes a client key may sign with, in order of preference
const OFFERED_SCHEMES: [SignatureScheme; 4] = [
    SignatureScheme::ED25519,
    SignatureScheme::ECDSA_NISTP256_SHA256,
    SignatureScheme::ECDSA_NISTP384_SHA384,
    SignatureScheme::RSA_PSS_SHA256,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofScheme {
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "ecdsa-p256-sha256")]
    EcdsaP256Sha256,
    #[serde(rename = "ecdsa-p384-sha384")]
    EcdsaP384Sha384,
    #[serde(rename = "rsa-pss-sha256")]
    RsaPssSha256,
}

impl ProofScheme {
    fn from_rustls(scheme: SignatureScheme) -> Option<Self> {
        match scheme {
            SignatureScheme::ED25519 => Some(ProofScheme::Ed25519),
            SignatureScheme::ECDSA_NISTP256_SHA256 => Some(ProofScheme::EcdsaP256Sha256),
            SignatureScheme::ECDSA_NISTP384_SHA384 => Some(ProofScheme::EcdsaP384Sha384),
            SignatureScheme::RSA_PSS_SHA256 => Some(ProofScheme::RsaPssSha256),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ProofScheme::Ed25519 => "ed25519",
            ProofScheme::EcdsaP256Sha256 => "ecdsa-p256-sha256",
            ProofScheme::EcdsaP384Sha384 => "ecdsa-p384-sha384",
            ProofScheme::RsaPssSha256 => "rsa-pss-sha256",
        }
    }

    fn verification_algorithm(self) -> &'static dyn SignatureVerificationAlgorithm {
        match self {
            ProofScheme::Ed25519 => webpki::ring::ED25519,
            ProofScheme::EcdsaP256Sha256 => webpki::ring::ECDSA_P256_SHA256,
            ProofScheme::EcdsaP384Sha384 => webpki::ring::ECDSA_P384_SHA384,
            ProofScheme::RsaPssSha256 => webpki::ring::RSA_PSS_2048_8192_SHA256_LEGACY_KEY,
        }
    }
}

/// Signed, single-use authorization proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofToken {
    pub method: String,
    pub target_uri: String,
    pub issued_at: i64,
    pub unique_id: String,
    pub key_binding_hash: String,
    pub embedded_secret_claim: String,
    pub scheme: ProofScheme,
    pub signature: String,
}

impl ProofToken {
    /// Data the secret claim is computed over
    pub fn claim_input(&self) -> String {
        claim_input(
            &self.method,
            &self.target_uri,
            self.issued_at,
            &self.unique_id,
            &self.key_binding_hash,
        )
    }

    /// Data the signature is computed over: every field except the signature
    pub fn signing_input(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            SIGNING_CONTEXT,
            self.claim_input(),
            self.embedded_secret_claim,
            self.scheme.name()
        )
    }

    /// Verify the signature under the public key of `cert`
    pub fn verify_signature(&self, cert: &CertificateDer<'_>) -> bool {
        let Ok(end_entity) = webpki::EndEntityCert::try_from(cert) else {
            return false;
        };
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };

        end_entity
            .verify_signature(
                self.scheme.verification_algorithm(),
                self.signing_input().as_bytes(),
                &signature,
            )
            .is_ok()
    }
}

fn claim_input(
    method: &str,
    target_uri: &str,
    issued_at: i64,
    unique_id: &str,
    key_binding_hash: &str,
) -> String {
    format!("{method}\n{target_uri}\n{issued_at}\n{unique_id}\n{key_binding_hash}")
}

/// Client-side token minter holding the certificate key pair
pub struct ProofSigner {
    key: Arc<dyn SigningKey>,
    key_binding_hash: String,
}

impl ProofSigner {
    pub fn new(cert: &CertificateDer<'_>, key: &PrivateKeyDer<'_>) -> Result<Self, rustls::Error> {
        let key = rustls::crypto::ring::sign::any_supported_type(key)?;
        if key.choose_scheme(&OFFERED_SCHEMES).is_none() {
            return Err(rustls::Error::General(
                "client key supports none of the proof signature schemes".to_string(),
            ));
        }

        Ok(Self {
            key,
            key_binding_hash: thumbprint(cert.as_ref()),
        })
    }

    /// Mint a fresh token for `method`/`target_uri` bound to `secret`
    pub fn mint(
        &self,
        method: &str,
        target_uri: &str,
        secret: &SharedSecret,
        issued_at: i64,
    ) -> Result<ProofToken, rustls::Error> {
        let signer = self.key.choose_scheme(&OFFERED_SCHEMES).ok_or_else(|| {
            rustls::Error::General("no proof signature scheme available".to_string())
        })?;
        let scheme = ProofScheme::from_rustls(signer.scheme()).ok_or_else(|| {
            rustls::Error::General(format!("unexpected signature scheme {:?}", signer.scheme()))
        })?;

        let unique_id = hex::encode(rand::random::<[u8; 16]>());
        let claim = create_claim(
            &claim_input(method, target_uri, issued_at, &unique_id, &self.key_binding_hash),
            secret.expose(),
        );

        let mut token = ProofToken {
            method: method.to_string(),
            target_uri: target_uri.to_string(),
            issued_at,
            unique_id,
            key_binding_hash: self.key_binding_hash.clone(),
            embedded_secret_claim: claim,
            scheme,
            signature: String::new(),
        };

        let signature = signer.sign(token.signing_input().as_bytes())?;
        token.signature = hex::encode(signature);
        Ok(token)
    }
}
