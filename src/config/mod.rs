/// Configuration module - config file, node list and target list loading
pub mod schema;
pub mod loader;
pub mod nodes;
pub mod targets;

pub use schema::{Config, DestroyerModule};
pub use loader::load_config;
pub use nodes::{load_nodes, Node, SharedSecret};
pub use targets::{TargetEntry, TargetKind};
