use std::path::PathBuf;
use std::time::Duration;

use pkg_constants::{deploy, paths, pki, remote};
use pkg_deploy::{Poller, RemoteCommands};
use pkg_types::config::CertfleetConfigFile;

/// Effective settings. Merge order: CLI flag > config file > constants.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cert_dir: PathBuf,
    pub commands: RemoteCommands,
    pub poller: Poller,
    pub concurrency: usize,
    pub ssh_port: u16,
    pub connect_timeout: Duration,
    pub node_validity_days: u32,
    pub service_aliases: Vec<String>,
}

impl Settings {
    pub fn resolve(file: CertfleetConfigFile, cli_cert_dir: Option<String>) -> Self {
        let defaults = RemoteCommands::default();
        let commands = RemoteCommands {
            cert_dir: file.remote_cert_dir.unwrap_or(defaults.cert_dir),
            service_user: file.service_user.unwrap_or(defaults.service_user),
            service_group: file.service_group.unwrap_or(defaults.service_group),
            file_mode: defaults.file_mode,
            secret_store_path: file.secret_store_path.unwrap_or(defaults.secret_store_path),
            secret_store_tool: file.secret_store_tool.unwrap_or(defaults.secret_store_tool),
            secret_entry: file.secret_entry.unwrap_or(defaults.secret_entry),
            use_sudo: file.use_sudo.unwrap_or(defaults.use_sudo),
        };

        Self {
            cert_dir: PathBuf::from(
                cli_cert_dir
                    .or(file.cert_dir)
                    .unwrap_or_else(|| paths::DEFAULT_CERT_DIR.to_string()),
            ),
            commands,
            poller: Poller::new(
                Duration::from_millis(
                    file.poll_interval_ms
                        .unwrap_or(deploy::SECRET_STORE_POLL_INTERVAL_MS),
                ),
                file.poll_attempts
                    .unwrap_or(deploy::SECRET_STORE_POLL_ATTEMPTS),
            ),
            concurrency: file.concurrency.unwrap_or(deploy::DEFAULT_CONCURRENCY),
            ssh_port: file.ssh_port.unwrap_or(remote::DEFAULT_SSH_PORT),
            connect_timeout: Duration::from_secs(
                file.connect_timeout_secs
                    .unwrap_or(remote::DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            node_validity_days: file.node_validity_days.unwrap_or(pki::NODE_VALIDITY_DAYS),
            service_aliases: file.service_aliases.unwrap_or_else(|| {
                pki::DEFAULT_SERVICE_ALIASES
                    .iter()
                    .map(|alias| alias.to_string())
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fill_gaps() {
        let settings = Settings::resolve(CertfleetConfigFile::default(), None);
        assert_eq!(settings.cert_dir, PathBuf::from("runtime/certificates"));
        assert_eq!(settings.commands, RemoteCommands::default());
        assert_eq!(settings.poller, Poller::default());
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.ssh_port, 22);
        assert_eq!(settings.node_validity_days, 825);
        assert_eq!(settings.service_aliases, vec!["localhost", "elasticsearch"]);
    }

    #[test]
    fn file_overrides_constants_and_cli_overrides_file() {
        let file = CertfleetConfigFile {
            cert_dir: Some("/var/lib/certfleet".into()),
            remote_cert_dir: Some("/opt/es/certs".into()),
            use_sudo: Some(false),
            poll_attempts: Some(3),
            concurrency: Some(8),
            ..Default::default()
        };
        let settings = Settings::resolve(file.clone(), None);
        assert_eq!(settings.cert_dir, PathBuf::from("/var/lib/certfleet"));
        assert_eq!(settings.commands.cert_dir, "/opt/es/certs");
        assert!(!settings.commands.use_sudo);
        assert_eq!(settings.poller.max_attempts, 3);
        assert_eq!(settings.concurrency, 8);

        let settings = Settings::resolve(file, Some("/tmp/certs".into()));
        assert_eq!(settings.cert_dir, PathBuf::from("/tmp/certs"));
    }
}
