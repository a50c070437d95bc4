use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use pkg_remote::{RemoteConnector, RemoteSession};
use pkg_types::{DeploymentResult, NodeIdentity};

use crate::context::DeployContext;
use crate::error::{DeployError, Result};
use crate::poll::PollError;
use crate::profile::Artifact;
use crate::progress::ProgressSink;

/// Pushes issued certificates to every node of a [`DeployContext`].
pub struct FleetDeployer<'a> {
    ctx: &'a DeployContext,
    connector: &'a dyn RemoteConnector,
    progress: &'a dyn ProgressSink,
}

impl<'a> FleetDeployer<'a> {
    pub fn new(
        ctx: &'a DeployContext,
        connector: &'a dyn RemoteConnector,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            ctx,
            connector,
            progress,
        }
    }

    /// Deploy to every node. Always returns one result per manifest node, in
    /// manifest order, whatever fails along the way.
    pub async fn deploy(&self, cancel: &CancellationToken) -> Vec<DeploymentResult> {
        let concurrency = self.ctx.options().concurrency.max(1);
        info!(
            "Deploying {} profile to {} node(s) (concurrency {})",
            self.ctx.profile(),
            self.ctx.manifest().len(),
            concurrency
        );
        futures_util::stream::iter(self.ctx.manifest())
            .map(|node| self.deploy_node(node, cancel))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn deploy_node(&self, node: &NodeIdentity, cancel: &CancellationToken) -> DeploymentResult {
        let span = info_span!("node", name = %node.name, ip = %node.ip);
        async {
            if cancel.is_cancelled() {
                warn!("Skipping {}: run cancelled", node);
                return DeploymentResult::failed(
                    node,
                    DeployError::Cancelled.kind(),
                    DeployError::Cancelled.to_string(),
                );
            }

            // Dropping the losing branch drops its session, which tears the
            // connection down.
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DeployError::Cancelled),
                outcome = self.run_node(node, cancel) => outcome,
            };

            match outcome {
                Ok(detail) => {
                    info!("Deployed to {}: {}", node, detail);
                    self.progress
                        .report(node, &format!("Successfully deployed to {}", node));
                    DeploymentResult::success(node, detail)
                }
                Err(e) => {
                    error!("Deployment to {} failed: {}", node, e);
                    self.progress
                        .report(node, &format!("Failed on {}: {}", node, e));
                    DeploymentResult::failed(node, e.kind(), e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_node(&self, node: &NodeIdentity, cancel: &CancellationToken) -> Result<String> {
        let artifacts = self.ctx.profile().artifacts(self.ctx.layout(), node);
        if let Some(missing) = artifacts.iter().find(|a| !a.local.is_file()) {
            return Err(DeployError::FileNotFound(missing.local.clone()));
        }

        self.progress.report(node, &format!("Deploying to {}", node));
        let mut session = self
            .connector
            .connect(node, self.ctx.credentials())
            .await?;
        let outcome = self
            .apply(node, session.as_mut(), &artifacts, cancel)
            .await;
        if let Err(e) = session.close().await {
            warn!("Failed to close session to {}: {}", node, e);
        }
        outcome
    }

    async fn apply(
        &self,
        node: &NodeIdentity,
        session: &mut dyn RemoteSession,
        artifacts: &[Artifact],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let cmds = &self.ctx.options().commands;

        if !session.exec(&cmds.cert_dir_exists()).await?.success() {
            debug!("Creating {}", cmds.cert_dir);
            run(session, &cmds.create_cert_dir()).await?;
            run(session, &cmds.change_owner(&cmds.cert_dir)).await?;
        }

        for artifact in artifacts {
            let remote_path = cmds.remote_path(&artifact.remote_name);
            session.upload(&artifact.local, &remote_path).await?;
            run(session, &cmds.change_owner(&remote_path)).await?;
            run(session, &cmds.change_mode(&remote_path)).await?;
            self.progress
                .report(node, &format!("Uploaded {}", remote_path));
        }

        if !self.ctx.rebuilds_secret_store() {
            return Ok(format!("{} file(s) installed", artifacts.len()));
        }

        run(session, &cmds.remove_secret_store()).await?;
        run(session, &cmds.create_secret_store()).await?;
        self.wait_for_secret_store(session, cancel).await?;
        self.progress.report(node, "Secret store recreated");

        match self.ctx.options().key_passphrase.as_deref() {
            Some(passphrase) if !passphrase.is_empty() => {
                self.store_passphrase(session, passphrase).await?;
                self.progress
                    .report(node, &format!("Stored secret entry {}", cmds.secret_entry));
                Ok(format!(
                    "{} file(s) installed, secret store rebuilt with {}",
                    artifacts.len(),
                    cmds.secret_entry
                ))
            }
            _ => Ok(format!(
                "{} file(s) installed, secret store rebuilt",
                artifacts.len()
            )),
        }
    }

    async fn wait_for_secret_store(
        &self,
        session: &mut dyn RemoteSession,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cmds = &self.ctx.options().commands;
        let mut round = self.ctx.options().poller.start(cancel);
        loop {
            if session.exec(&cmds.secret_store_exists()).await?.success() {
                debug!("Secret store present after {} probe(s)", round.attempt());
                return Ok(());
            }
            round.miss().await.map_err(|e| match e {
                PollError::Exhausted { attempts, waited } => DeployError::Timeout {
                    what: cmds.secret_store_path.clone(),
                    attempts,
                    waited,
                },
                PollError::Cancelled => DeployError::Cancelled,
            })?;
        }
    }

    async fn store_passphrase(&self, session: &mut dyn RemoteSession, passphrase: &str) -> Result<()> {
        let cmds = &self.ctx.options().commands;
        let command = cmds.add_secret_entry();
        let output = session
            .exec_with_input(&command, format!("{}\n", passphrase).as_bytes())
            .await?;
        if !output.success() {
            return Err(command_error(command, output));
        }

        let listing = run(session, &cmds.list_secret_entries()).await?;
        if !cmds.listing_contains_entry(&listing) {
            return Err(DeployError::Verification(format!(
                "secret entry {} missing after add",
                cmds.secret_entry
            )));
        }
        Ok(())
    }
}

/// Run a command, turning a non-zero exit into [`DeployError::Command`].
async fn run(session: &mut dyn RemoteSession, command: &str) -> Result<String> {
    let output = session.exec(command).await?;
    if !output.success() {
        return Err(command_error(command.to_string(), output));
    }
    Ok(output.stdout)
}

fn command_error(command: String, output: pkg_remote::CommandOutput) -> DeployError {
    let stderr = match output.stderr.trim() {
        "" => output.stdout.trim().to_string(),
        stderr => stderr.to_string(),
    };
    DeployError::Command {
        command,
        status: output.status,
        stderr,
    }
}

/// Deploy `ctx` and return one result per node, in manifest order.
pub async fn deploy(
    ctx: &DeployContext,
    connector: &dyn RemoteConnector,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Vec<DeploymentResult> {
    FleetDeployer::new(ctx, connector, progress)
        .deploy(cancel)
        .await
}
