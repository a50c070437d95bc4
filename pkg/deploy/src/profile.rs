use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use pkg_constants::paths;
use pkg_pki::CertDirLayout;
use pkg_types::NodeIdentity;

/// Which certificate set is pushed to each node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactProfile {
    /// Root CA plus the node's own certificate and key.
    #[default]
    Transport,
    /// The shared HTTP-layer triple under `https/`.
    Http,
}

/// A local file and the name it receives in the remote certificate directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub local: PathBuf,
    pub remote_name: String,
}

impl ArtifactProfile {
    pub fn artifacts(&self, layout: &CertDirLayout, node: &NodeIdentity) -> Vec<Artifact> {
        match self {
            ArtifactProfile::Transport => vec![
                Artifact {
                    local: layout.ca_cert(),
                    remote_name: paths::CA_CERT_FILENAME.to_string(),
                },
                Artifact {
                    local: layout.node_cert(&node.name),
                    remote_name: format!("{}.{}", node.name, paths::NODE_CERT_EXT),
                },
                Artifact {
                    local: layout.node_key(&node.name),
                    remote_name: format!("{}.{}", node.name, paths::NODE_KEY_EXT),
                },
            ],
            ArtifactProfile::Http => vec![
                Artifact {
                    local: layout.http_ca(),
                    remote_name: paths::HTTP_CA_FILENAME.to_string(),
                },
                Artifact {
                    local: layout.http_cert(),
                    remote_name: paths::HTTP_CERT_FILENAME.to_string(),
                },
                Artifact {
                    local: layout.http_key(),
                    remote_name: paths::HTTP_KEY_FILENAME.to_string(),
                },
            ],
        }
    }

    /// Whether the node's secret store is rebuilt by default.
    pub fn rebuilds_secret_store(&self) -> bool {
        matches!(self, ArtifactProfile::Transport)
    }
}

impl std::fmt::Display for ArtifactProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactProfile::Transport => write!(f, "transport"),
            ArtifactProfile::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for ArtifactProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transport" => Ok(ArtifactProfile::Transport),
            "http" | "https" => Ok(ArtifactProfile::Http),
            other => Err(format!("unknown profile '{}' (expected transport or http)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_artifacts() {
        let layout = CertDirLayout::new("/certs");
        let node = NodeIdentity::new("es-data-1", "10.0.0.2".parse().unwrap());
        let names: Vec<_> = ArtifactProfile::Transport
            .artifacts(&layout, &node)
            .into_iter()
            .map(|a| (a.local, a.remote_name))
            .collect();
        assert_eq!(
            names,
            vec![
                (PathBuf::from("/certs/ca.pem"), "ca.pem".to_string()),
                (PathBuf::from("/certs/es-data-1.crt"), "es-data-1.crt".to_string()),
                (PathBuf::from("/certs/es-data-1.key"), "es-data-1.key".to_string()),
            ]
        );
        assert!(ArtifactProfile::Transport.rebuilds_secret_store());
    }

    #[test]
    fn http_artifacts_are_shared() {
        let layout = CertDirLayout::new("/certs");
        let node = NodeIdentity::new("es-data-1", "10.0.0.2".parse().unwrap());
        let remote: Vec<_> = ArtifactProfile::Http
            .artifacts(&layout, &node)
            .into_iter()
            .map(|a| a.remote_name)
            .collect();
        assert_eq!(remote, vec!["ca.crt", "http.crt", "http.key"]);
        assert!(!ArtifactProfile::Http.rebuilds_secret_store());
    }

    #[test]
    fn parse_profile() {
        assert_eq!("HTTP".parse::<ArtifactProfile>().unwrap(), ArtifactProfile::Http);
        assert_eq!(
            "transport".parse::<ArtifactProfile>().unwrap(),
            ArtifactProfile::Transport
        );
        assert!("ftp".parse::<ArtifactProfile>().is_err());
    }
}
