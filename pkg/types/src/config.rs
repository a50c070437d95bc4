use serde::{Deserialize, Serialize};

/// CLI configuration file (YAML). Every key is optional; CLI flags override
/// it and built-in constants fill the gaps.
///
/// Example `config.yaml`:
/// ```yaml
/// cert-dir: /var/lib/certfleet/certificates
/// remote-cert-dir: /etc/elasticsearch/certs
/// service-user: elasticsearch
/// service-group: elasticsearch
/// secret-store-path: /etc/elasticsearch/elasticsearch.keystore
/// secret-store-tool: /usr/share/elasticsearch/bin/elasticsearch-keystore
/// secret-entry: xpack.security.transport.ssl.secure_key_passphrase
/// use-sudo: true
/// ssh-port: 22
/// connect-timeout-secs: 20
/// poll-interval-ms: 500
/// poll-attempts: 10
/// concurrency: 1
/// node-validity-days: 825
/// service-aliases: [localhost, elasticsearch]
/// ```
///
/// Passwords and key passphrases are deliberately not accepted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertfleetConfigFile {
    #[serde(default, alias = "cert-dir")]
    pub cert_dir: Option<String>,
    #[serde(default, alias = "remote-cert-dir")]
    pub remote_cert_dir: Option<String>,
    #[serde(default, alias = "service-user")]
    pub service_user: Option<String>,
    #[serde(default, alias = "service-group")]
    pub service_group: Option<String>,
    #[serde(default, alias = "secret-store-path")]
    pub secret_store_path: Option<String>,
    #[serde(default, alias = "secret-store-tool")]
    pub secret_store_tool: Option<String>,
    #[serde(default, alias = "secret-entry")]
    pub secret_entry: Option<String>,
    #[serde(default, alias = "use-sudo")]
    pub use_sudo: Option<bool>,
    #[serde(default, alias = "ssh-port")]
    pub ssh_port: Option<u16>,
    #[serde(default, alias = "connect-timeout-secs")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default, alias = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, alias = "poll-attempts")]
    pub poll_attempts: Option<u32>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "node-validity-days")]
    pub node_validity_days: Option<u32>,
    #[serde(default, alias = "service-aliases")]
    pub service_aliases: Option<Vec<String>>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: Option<T> = serde_yaml::from_str(&content)?;
    Ok(config.unwrap_or_default())
}
