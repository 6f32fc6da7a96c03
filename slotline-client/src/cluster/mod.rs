//! Cluster routing: slot cache, connection handler, command executor and the
//! client facade built on them.

mod cache;
mod client;
mod command;
mod handler;

pub use cache::ClusterInfoCache;
pub use client::ClusterClient;
pub use command::ClusterCommand;
pub use handler::ConnectionHandler;
