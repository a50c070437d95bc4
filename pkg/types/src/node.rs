use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// --- Node group ---

/// Role of a node within the cluster. Drives node-group selection for the
/// HTTP-layer deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    Master,
    Data,
    Ingest,
    Coordinator,
    Request,
    Other,
}

impl NodeGroup {
    pub const ALL: [NodeGroup; 6] = [
        NodeGroup::Master,
        NodeGroup::Data,
        NodeGroup::Ingest,
        NodeGroup::Coordinator,
        NodeGroup::Request,
        NodeGroup::Other,
    ];

    /// Infer the group from a node name. First match wins, so `master-hot-1`
    /// is a master.
    pub fn infer(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("master") {
            NodeGroup::Master
        } else if name.contains("request") {
            NodeGroup::Request
        } else if name.contains("ingest") {
            NodeGroup::Ingest
        } else if ["hot", "warm", "cold", "data"]
            .iter()
            .any(|tier| name.contains(tier))
        {
            NodeGroup::Data
        } else if name.contains("coord") {
            NodeGroup::Coordinator
        } else {
            NodeGroup::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeGroup::Master => "master",
            NodeGroup::Data => "data",
            NodeGroup::Ingest => "ingest",
            NodeGroup::Coordinator => "coordinator",
            NodeGroup::Request => "request",
            NodeGroup::Other => "other",
        }
    }
}

impl std::fmt::Display for NodeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        NodeGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown node group '{}' (expected one of master, data, ingest, coordinator, request, other)",
                    s
                )
            })
    }
}

// --- Node identity ---

/// One node of the fleet, as validated from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Unique within the manifest. Certificate CN and DNS SAN.
    pub name: String,
    /// Address used both for the IP SAN and to reach the node.
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack: Option<String>,
    pub group: NodeGroup,
}

impl NodeIdentity {
    /// Build an identity with the group inferred from the name. The name is
    /// not checked here; [`crate::FleetManifest`] validates every identity it
    /// admits.
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        let name = name.into();
        let group = NodeGroup::infer(&name);
        Self {
            name,
            ip,
            dns: None,
            rack: None,
            group,
        }
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_groups_from_names() {
        assert_eq!(NodeGroup::infer("es-master-1"), NodeGroup::Master);
        assert_eq!(NodeGroup::infer("ES-Request-2"), NodeGroup::Request);
        assert_eq!(NodeGroup::infer("ingest01"), NodeGroup::Ingest);
        assert_eq!(NodeGroup::infer("datahot-3"), NodeGroup::Data);
        assert_eq!(NodeGroup::infer("es-warm-1"), NodeGroup::Data);
        assert_eq!(NodeGroup::infer("cold7"), NodeGroup::Data);
        assert_eq!(NodeGroup::infer("coord-1"), NodeGroup::Coordinator);
        assert_eq!(NodeGroup::infer("kibana"), NodeGroup::Other);
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(NodeGroup::infer("master-hot-1"), NodeGroup::Master);
    }

    #[test]
    fn parse_group_names() {
        assert_eq!("Data".parse::<NodeGroup>(), Ok(NodeGroup::Data));
        assert_eq!(" coordinator ".parse::<NodeGroup>(), Ok(NodeGroup::Coordinator));
        assert!("frozen".parse::<NodeGroup>().is_err());
    }

    #[test]
    fn display_node() {
        let node = NodeIdentity::new("node-a", "10.0.0.1".parse().unwrap());
        assert_eq!(node.to_string(), "node-a (10.0.0.1)");
        assert_eq!(node.group, NodeGroup::Other);
    }
}
