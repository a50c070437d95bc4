use pkg_constants::deploy::DEFAULT_CONCURRENCY;
use pkg_pki::CertDirLayout;
use pkg_remote::Credentials;
use pkg_types::{FleetManifest, NodeGroup};
use tracing::warn;

use crate::commands::RemoteCommands;
use crate::error::{DeployError, Result};
use crate::poll::Poller;
use crate::profile::ArtifactProfile;

/// Tunables of a deployment run.
#[derive(Clone)]
pub struct DeployOptions {
    pub commands: RemoteCommands,
    pub poller: Poller,
    /// Nodes deployed at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Stored as the secret entry after the store is rebuilt.
    pub key_passphrase: Option<String>,
    /// Overrides the profile's secret-store default.
    pub rebuild_secret_store: Option<bool>,
    /// Restrict the run to these node groups. Empty means every node.
    pub groups: Vec<NodeGroup>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            commands: RemoteCommands::default(),
            poller: Poller::default(),
            concurrency: DEFAULT_CONCURRENCY,
            key_passphrase: None,
            rebuild_secret_store: None,
            groups: Vec::new(),
        }
    }
}

impl std::fmt::Debug for DeployOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployOptions")
            .field("commands", &self.commands)
            .field("poller", &self.poller)
            .field("concurrency", &self.concurrency)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("rebuild_secret_store", &self.rebuild_secret_store)
            .field("groups", &self.groups)
            .finish()
    }
}

/// Everything one deployment run needs, validated up front.
#[derive(Debug, Clone)]
pub struct DeployContext {
    manifest: FleetManifest,
    credentials: Credentials,
    layout: CertDirLayout,
    profile: ArtifactProfile,
    options: DeployOptions,
}

impl DeployContext {
    /// Fails with a config error when the user is empty. A group filter that
    /// matches no node falls back to the whole manifest.
    pub fn new(
        manifest: &FleetManifest,
        credentials: Credentials,
        layout: CertDirLayout,
        profile: ArtifactProfile,
        mut options: DeployOptions,
    ) -> Result<Self> {
        if credentials.user.trim().is_empty() {
            return Err(DeployError::Config("remote user is empty".to_string()));
        }
        let mut selected = manifest.select_groups(&options.groups);
        if selected.is_empty() {
            let groups: Vec<_> = options.groups.iter().map(NodeGroup::as_str).collect();
            warn!(
                "No manifest node matches groups [{}], deploying to all {} node(s)",
                groups.join(", "),
                manifest.len()
            );
            selected = manifest.clone();
        }
        let manifest = selected;
        options.concurrency = options.concurrency.max(1);
        Ok(Self {
            manifest,
            credentials,
            layout,
            profile,
            options,
        })
    }

    pub fn manifest(&self) -> &FleetManifest {
        &self.manifest
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn layout(&self) -> &CertDirLayout {
        &self.layout
    }

    pub fn profile(&self) -> ArtifactProfile {
        self.profile
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    pub fn rebuilds_secret_store(&self) -> bool {
        self.options
            .rebuild_secret_store
            .unwrap_or_else(|| self.profile.rebuilds_secret_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::NodeIdentity;

    fn manifest() -> FleetManifest {
        FleetManifest::from_nodes(vec![
            NodeIdentity::new("es-master-1", "10.0.0.1".parse().unwrap()),
            NodeIdentity::new("es-data-1", "10.0.0.2".parse().unwrap()),
        ])
    }

    #[test]
    fn group_filter_applies() {
        let ctx = DeployContext::new(
            &manifest(),
            Credentials::new("deploy"),
            CertDirLayout::default(),
            ArtifactProfile::Http,
            DeployOptions {
                groups: vec![NodeGroup::Data],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ctx.manifest().len(), 1);
        assert_eq!(ctx.manifest().nodes()[0].name, "es-data-1");
        assert!(!ctx.rebuilds_secret_store());
    }

    #[test]
    fn empty_selection_falls_back_to_every_node() {
        let ctx = DeployContext::new(
            &manifest(),
            Credentials::new("deploy"),
            CertDirLayout::default(),
            ArtifactProfile::Http,
            DeployOptions {
                groups: vec![NodeGroup::Ingest],
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<_> = ctx.manifest().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["es-master-1", "es-data-1"]);
    }

    #[test]
    fn empty_user_is_rejected() {
        assert!(
            DeployContext::new(
                &manifest(),
                Credentials::new(" "),
                CertDirLayout::default(),
                ArtifactProfile::Transport,
                DeployOptions::default(),
            )
            .is_err()
        );
    }

    #[test]
    fn concurrency_is_at_least_one() {
        let ctx = DeployContext::new(
            &manifest(),
            Credentials::new("deploy"),
            CertDirLayout::default(),
            ArtifactProfile::Transport,
            DeployOptions {
                concurrency: 0,
                rebuild_secret_store: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ctx.options().concurrency, 1);
        assert!(!ctx.rebuilds_secret_store());
    }

    #[test]
    fn debug_hides_passphrase() {
        let options = DeployOptions {
            key_passphrase: Some("changeit".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", options).contains("changeit"));
    }
}
