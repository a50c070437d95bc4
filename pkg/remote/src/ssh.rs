use async_trait::async_trait;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{RemoteError, Result};
use crate::session::{CommandOutput, Credentials, RemoteConnector, RemoteSession};
use pkg_constants::remote::SSHPASS_ENV;
use pkg_types::NodeIdentity;

/// Exit status OpenSSH reports for its own (non-remote) failures.
const SSH_CHANNEL_FAILURE: i32 = 255;

const MASTER_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// [`RemoteConnector`] backed by the system `ssh` and `scp` binaries.
///
/// Each session starts a connection master (`ssh -M`) on a private control
/// socket; commands and copies are multiplexed over it, so authentication
/// happens once per node. Password logins go through `sshpass -e`.
#[derive(Debug, Clone)]
pub struct SshConnector {
    ssh_program: String,
    scp_program: String,
    sshpass_program: String,
    control_dir: PathBuf,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            sshpass_program: "sshpass".to_string(),
            control_dir: std::env::temp_dir(),
        }
    }
}

impl SshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the per-session control sockets.
    pub fn with_control_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control_dir = dir.into();
        self
    }

    fn master_command(&self, credentials: &Credentials) -> Command {
        match credentials.password() {
            Some(password) => {
                let mut cmd = Command::new(&self.sshpass_program);
                cmd.arg("-e")
                    .arg(&self.ssh_program)
                    .env(SSHPASS_ENV, password)
                    .args(["-o", "NumberOfPasswordPrompts=1"]);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.ssh_program);
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        }
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(
        &self,
        node: &NodeIdentity,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>> {
        let host = node.ip.to_string();
        let control_path = self
            .control_dir
            .join(format!("certfleet-{}.sock", uuid::Uuid::new_v4().simple()));
        let mut session = SshSession {
            host: host.clone(),
            ip: node.ip,
            user: credentials.user.clone(),
            port: credentials.port,
            ssh_program: self.ssh_program.clone(),
            scp_program: self.scp_program.clone(),
            control_path,
            master: None,
        };

        debug!("Opening SSH master to {}@{}", credentials.user, host);
        let mut master = self
            .master_command(credentials)
            .args(session.common_args())
            .args(["-M", "-N"])
            .args(["-o", "ControlPersist=no"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                credentials.connect_timeout.as_secs().max(1)
            ))
            .args(
                credentials
                    .identity_file
                    .iter()
                    .flat_map(|path| ["-i".into(), path.as_os_str().to_owned()]),
            )
            .arg(&host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::Connect {
                host: host.clone(),
                reason: format!("failed to spawn {}: {}", self.ssh_program, e),
            })?;

        let deadline = Instant::now() + credentials.connect_timeout;
        loop {
            let exited = master.try_wait().map_err(|e| RemoteError::Connect {
                host: host.clone(),
                reason: e.to_string(),
            })?;
            if let Some(status) = exited {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(RemoteError::Connect {
                    host,
                    reason: format!("ssh exited with {}: {}", status, stderr.trim()),
                });
            }
            if session.master_ready().await {
                break;
            }
            if Instant::now() >= deadline {
                return Err(RemoteError::Timeout {
                    host,
                    secs: credentials.connect_timeout.as_secs(),
                });
            }
            tokio::time::sleep(MASTER_PROBE_INTERVAL).await;
        }

        info!("SSH session established to {}@{}", credentials.user, host);
        if let Some(stderr) = master.stderr.take() {
            drain_master_stderr(host, stderr);
        }
        session.master = Some(master);
        Ok(Box::new(session))
    }
}

/// Log the master's stderr at debug level for as long as it runs, so its
/// warnings never fill the pipe and stall the connection.
fn drain_master_stderr(host: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("ssh master {}: {}", host, line);
        }
    });
}

/// A session multiplexed over an `ssh -M` control socket.
pub struct SshSession {
    host: String,
    ip: IpAddr,
    user: String,
    port: u16,
    ssh_program: String,
    scp_program: String,
    control_path: PathBuf,
    /// Connection master; killed on drop.
    master: Option<Child>,
}

impl SshSession {
    fn common_args(&self) -> Vec<String> {
        vec![
            "-o".into(),
            format!("ControlPath={}", self.control_path.display()),
            "-p".into(),
            self.port.to_string(),
            "-l".into(),
            self.user.clone(),
        ]
    }

    fn ssh(&self) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(self.common_args())
            .args(["-o", "BatchMode=yes"])
            .kill_on_drop(true);
        cmd
    }

    async fn master_ready(&self) -> bool {
        self.ssh()
            .args(["-O", "check"])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// `user@host:path` as scp expects it, bracketing IPv6 literals.
    fn scp_target(&self, remote_path: &str) -> String {
        match self.ip {
            IpAddr::V4(ip) => format!("{}@{}:{}", self.user, ip, remote_path),
            IpAddr::V6(ip) => format!("{}@[{}]:{}", self.user, ip, remote_path),
        }
    }

    fn to_command_output(&self, output: Output) -> Result<CommandOutput> {
        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if result.status == SSH_CHANNEL_FAILURE {
            return Err(RemoteError::Transport {
                host: self.host.clone(),
                reason: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    fn channel_error(&self, e: std::io::Error) -> RemoteError {
        RemoteError::Transport {
            host: self.host.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        debug!("[{}] $ {}", self.host, command);
        let output = self
            .ssh()
            .arg(&self.host)
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.channel_error(e))?;
        self.to_command_output(output)
    }

    async fn exec_with_input(&mut self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        debug!("[{}] $ {} (with stdin)", self.host, command);
        let mut child = self
            .ssh()
            .arg(&self.host)
            .arg("--")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.channel_error(e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| self.channel_error(e))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.channel_error(e))?;
        self.to_command_output(output)
    }

    async fn upload(&mut self, local: &Path, remote_path: &str) -> Result<()> {
        debug!("[{}] upload {} -> {}", self.host, local.display(), remote_path);
        let transfer_error = |reason: String| RemoteError::Transfer {
            host: self.host.clone(),
            local: local.display().to_string(),
            remote: remote_path.to_string(),
            reason,
        };
        let output = Command::new(&self.scp_program)
            .args(["-q", "-o"])
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-o", "BatchMode=yes", "-P"])
            .arg(self.port.to_string())
            .arg(local)
            .arg(self.scp_target(remote_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| transfer_error(e.to_string()))?;
        if !output.status.success() {
            return Err(transfer_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut master) = self.master.take() else {
            return Ok(());
        };
        let _ = self
            .ssh()
            .args(["-O", "exit"])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = master.kill().await {
            debug!("[{}] SSH master already gone: {}", self.host, e);
        }
        debug!("SSH session to {} closed", self.host);
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.master.is_some() {
            debug!("SSH session to {} dropped without close", self.host);
        }
        // The master is killed by kill_on_drop; a SIGKILLed master leaves its socket behind.
        let _ = std::fs::remove_file(&self.control_path);
    }
}
