//! Traefik routing labels for swarm services
//!
//! This library turns an operator's routing intent into a label mutation for
//! a Docker swarm service and applies it:
//! - Discovers services and caches the list between runs
//! - Reads the current labels and removes every managed one
//! - Derives routers, middlewares and chains from independent feature toggles
//! - Hashes basic-auth credentials for both shell and compose output
//! - Runs the resulting commands locally or over ssh

pub mod compiler;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod intent;
pub mod labels;
pub mod middleware;
pub mod registry;
pub mod render;
