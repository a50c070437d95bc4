//! Shared data types for certfleet: node identities, the fleet manifest,
//! per-node deployment results and the YAML config file.

pub mod config;
pub mod manifest;
pub mod node;
pub mod result;
pub mod validate;

pub use manifest::{FleetManifest, ManifestError, QuarantinedEntry};
pub use node::{NodeGroup, NodeIdentity};
pub use result::{DeployStatus, DeploymentResult, DeploymentSummary, ErrorKind};
