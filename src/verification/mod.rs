/// Verification module - proof tokens, replay protection and session authentication
pub mod authenticator;
pub mod hmac;
pub mod proof;
pub mod replay;

pub use authenticator::{Authenticator, Session};
pub use proof::{ProofSigner, ProofToken, DESTROY_METHOD, DESTROY_TARGET};
pub use replay::ReplayGuard;
