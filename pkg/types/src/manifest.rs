//! Fleet manifest parsing.
//!
//! Example `instances.yml`:
//! ```yaml
//! instances:
//!   - name: es-master-1
//!     ip: 10.0.0.1
//!     dns: es-master-1.internal
//!   - name: es-data-1
//!     ip: 10.0.0.2
//!     rack: r1
//!     group: data
//! ```
//!
//! `nodes:` is accepted in place of `instances:`. Entries that cannot be
//! turned into a [`NodeIdentity`] are quarantined with a reason instead of
//! failing the whole manifest.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::node::{NodeGroup, NodeIdentity};
use crate::validate::validate_node_name;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("manifest has no 'instances' or 'nodes' entries")]
    NoNodes,

    #[error("all {0} manifest entries were rejected")]
    AllQuarantined(usize),
}

/// A manifest entry that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedEntry {
    /// Position in the raw manifest sequence.
    pub index: usize,
    pub name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    instances: Option<Vec<serde_yaml::Value>>,
    #[serde(default)]
    nodes: Option<Vec<serde_yaml::Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNode {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    dns: Option<String>,
    #[serde(default)]
    rack: Option<String>,
    #[serde(default, alias = "role")]
    group: Option<String>,
}

/// Ordered set of fleet nodes. Order is significant: it drives issuance,
/// deployment and result ordering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetManifest {
    nodes: Vec<NodeIdentity>,
    quarantined: Vec<QuarantinedEntry>,
}

impl FleetManifest {
    /// Build a manifest from identities. Invalid or reserved names and
    /// duplicates are quarantined, keeping the first occurrence.
    pub fn from_nodes(nodes: Vec<NodeIdentity>) -> Self {
        let mut manifest = FleetManifest::default();
        let mut seen = HashSet::new();
        for (index, node) in nodes.into_iter().enumerate() {
            if let Err(e) = validate_node_name(&node.name) {
                manifest.quarantine(index, Some(node.name), e.to_string());
            } else if seen.insert(node.name.clone()) {
                manifest.nodes.push(node);
            } else {
                manifest.quarantine(index, Some(node.name), "duplicate node name".to_string());
            }
        }
        manifest
    }

    /// Read and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse manifest YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_yaml::from_str::<Option<RawManifest>>(content)?.unwrap_or_default();
        let entries = match (raw.instances, raw.nodes) {
            (Some(instances), _) if !instances.is_empty() => instances,
            (_, Some(nodes)) if !nodes.is_empty() => nodes,
            _ => return Err(ManifestError::NoNodes),
        };

        let mut manifest = FleetManifest::default();
        let mut seen = HashSet::new();
        for (index, value) in entries.into_iter().enumerate() {
            let raw: RawNode = match serde_yaml::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    manifest.quarantine(index, None, format!("malformed entry: {}", e));
                    continue;
                }
            };
            match Self::identity(&raw) {
                Ok(node) if !seen.insert(node.name.clone()) => {
                    manifest.quarantine(index, Some(node.name), "duplicate node name".to_string());
                }
                Ok(node) => manifest.nodes.push(node),
                Err(reason) => manifest.quarantine(index, raw.name.clone(), reason),
            }
        }

        if manifest.nodes.is_empty() {
            return Err(ManifestError::AllQuarantined(manifest.quarantined.len()));
        }
        Ok(manifest)
    }

    fn identity(raw: &RawNode) -> Result<NodeIdentity, String> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "missing 'name'".to_string())?;
        let ip = raw
            .ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| "missing 'ip'".to_string())?;
        validate_node_name(name).map_err(|e| e.to_string())?;
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| format!("invalid ip address '{}'", ip))?;

        let group = match raw.group.as_deref() {
            Some(group) => group.parse::<NodeGroup>()?,
            None => NodeGroup::infer(name),
        };

        Ok(NodeIdentity {
            name: name.to_string(),
            ip,
            dns: raw.dns.clone().filter(|d| !d.trim().is_empty()),
            rack: raw.rack.clone().filter(|r| !r.trim().is_empty()),
            group,
        })
    }

    fn quarantine(&mut self, index: usize, name: Option<String>, reason: String) {
        warn!(
            "Skipping manifest entry #{} ({}): {}",
            index,
            name.as_deref().unwrap_or("<unnamed>"),
            reason
        );
        self.quarantined.push(QuarantinedEntry {
            index,
            name,
            reason,
        });
    }

    pub fn nodes(&self) -> &[NodeIdentity] {
        &self.nodes
    }

    pub fn quarantined(&self) -> &[QuarantinedEntry] {
        &self.quarantined
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeIdentity> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keep only nodes of the given groups, preserving order.
    /// An empty selection keeps every node.
    pub fn select_groups(&self, groups: &[NodeGroup]) -> FleetManifest {
        if groups.is_empty() {
            return self.clone();
        }
        FleetManifest {
            nodes: self
                .nodes
                .iter()
                .filter(|n| groups.contains(&n.group))
                .cloned()
                .collect(),
            quarantined: self.quarantined.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a FleetManifest {
    type Item = &'a NodeIdentity;
    type IntoIter = std::slice::Iter<'a, NodeIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
