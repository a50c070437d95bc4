//! Remote command surface executed on each node.

use pkg_constants::{paths, remote};
use pkg_remote::shell_quote;

/// Renders every shell command the orchestrator runs remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommands {
    pub cert_dir: String,
    pub service_user: String,
    pub service_group: String,
    pub file_mode: String,
    pub secret_store_path: String,
    pub secret_store_tool: String,
    pub secret_entry: String,
    /// Prefix privileged commands with `sudo`.
    pub use_sudo: bool,
}

impl Default for RemoteCommands {
    fn default() -> Self {
        Self {
            cert_dir: paths::REMOTE_CERT_DIR.to_string(),
            service_user: remote::DEFAULT_SERVICE_USER.to_string(),
            service_group: remote::DEFAULT_SERVICE_GROUP.to_string(),
            file_mode: remote::REMOTE_FILE_MODE.to_string(),
            secret_store_path: paths::REMOTE_SECRET_STORE.to_string(),
            secret_store_tool: paths::REMOTE_SECRET_STORE_TOOL.to_string(),
            secret_entry: remote::DEFAULT_SECRET_ENTRY.to_string(),
            use_sudo: true,
        }
    }
}

impl RemoteCommands {
    fn privileged(&self, command: String) -> String {
        if self.use_sudo {
            format!("sudo {}", command)
        } else {
            command
        }
    }

    /// Remote path of a file in the certificate directory.
    pub fn remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.cert_dir.trim_end_matches('/'), file_name)
    }

    pub fn cert_dir_exists(&self) -> String {
        self.privileged(format!("test -d {}", shell_quote(&self.cert_dir)))
    }

    pub fn create_cert_dir(&self) -> String {
        self.privileged(format!("mkdir -p {}", shell_quote(&self.cert_dir)))
    }

    pub fn change_owner(&self, path: &str) -> String {
        self.privileged(format!(
            "chown {}:{} {}",
            shell_quote(&self.service_user),
            shell_quote(&self.service_group),
            shell_quote(path)
        ))
    }

    pub fn change_mode(&self, path: &str) -> String {
        self.privileged(format!(
            "chmod {} {}",
            shell_quote(&self.file_mode),
            shell_quote(path)
        ))
    }

    pub fn remove_secret_store(&self) -> String {
        self.privileged(format!("rm -f {}", shell_quote(&self.secret_store_path)))
    }

    pub fn create_secret_store(&self) -> String {
        self.privileged(format!("{} create", shell_quote(&self.secret_store_tool)))
    }

    pub fn secret_store_exists(&self) -> String {
        self.privileged(format!("test -f {}", shell_quote(&self.secret_store_path)))
    }

    /// Adds the entry; the value is read from stdin (`-x`).
    pub fn add_secret_entry(&self) -> String {
        self.privileged(format!(
            "{} add -x {}",
            shell_quote(&self.secret_store_tool),
            shell_quote(&self.secret_entry)
        ))
    }

    pub fn list_secret_entries(&self) -> String {
        self.privileged(format!("{} list", shell_quote(&self.secret_store_tool)))
    }

    /// True when `listing` (output of [`Self::list_secret_entries`]) names the entry.
    pub fn listing_contains_entry(&self, listing: &str) -> bool {
        listing.lines().any(|line| line.trim() == self.secret_entry)
    }
}
