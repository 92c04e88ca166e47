pub mod config;
pub mod params;
pub mod schema;

// Re-export the types most call sites need
pub use config::{ConsulConfig, HostConfig};
pub use params::Params;
pub use schema::{Resource, Schema, SchemaMap};
