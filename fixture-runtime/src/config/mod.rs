//! Configuration Management
//!
//! Service descriptions, their builder, and the JSON cluster file format.

pub mod builder;
pub mod file;
pub mod service;

// Re-export main types
pub use builder::ServiceConfigBuilder;
pub use file::{ClusterFile, ServiceDefinition};
pub use service::{HardwareRequirements, ReadinessSpec, ServiceConfig};
