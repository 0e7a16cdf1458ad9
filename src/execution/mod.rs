/// Execution module - mutual-TLS transport, the destruct server and the client dispatcher
pub mod client;
pub mod server;
pub mod tls;
pub mod wire;

pub use client::Dispatcher;
pub use server::DestructServer;
