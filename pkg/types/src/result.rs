use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::node::NodeIdentity;

/// Classification of a failure, attached to a failed [`DeploymentResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Manifest or configuration missing/malformed.
    Config,
    /// Local certificate directory unreadable or unwritable.
    Io,
    /// Expected local artifact absent before upload.
    FileNotFound,
    /// Connect, authentication or channel failure.
    Transport,
    /// Remote command exited non-zero.
    Command,
    /// Remote side effect not observed within the polling budget.
    Timeout,
    /// Read-after-write check failed.
    Verification,
    /// The run was cancelled before this node finished.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "ConfigError"),
            ErrorKind::Io => write!(f, "IOError"),
            ErrorKind::FileNotFound => write!(f, "FileNotFoundError"),
            ErrorKind::Transport => write!(f, "TransportError"),
            ErrorKind::Command => write!(f, "CommandError"),
            ErrorKind::Timeout => write!(f, "TimeoutError"),
            ErrorKind::Verification => write!(f, "VerificationError"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Failed,
}

impl std::fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStatus::Success => write!(f, "success"),
            DeployStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of deploying to one node. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub node: String,
    pub ip: IpAddr,
    pub status: DeployStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorKind>,
    /// Human-readable detail; remote diagnostic output for failures.
    pub detail: String,
}

impl DeploymentResult {
    pub fn success(node: &NodeIdentity, detail: impl Into<String>) -> Self {
        Self {
            node: node.name.clone(),
            ip: node.ip,
            status: DeployStatus::Success,
            cause: None,
            detail: detail.into(),
        }
    }

    pub fn failed(node: &NodeIdentity, cause: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            node: node.name.clone(),
            ip: node.ip,
            status: DeployStatus::Failed,
            cause: Some(cause),
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeployStatus::Success
    }
}

/// Aggregate counts over a run's results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_cause: BTreeMap<ErrorKind, usize>,
}

impl DeploymentSummary {
    pub fn from_results(results: &[DeploymentResult]) -> Self {
        results
            .iter()
            .fold(DeploymentSummary::default(), |mut summary, result| {
                summary.total += 1;
                match result.cause {
                    None => summary.succeeded += 1,
                    Some(kind) => {
                        summary.failed += 1;
                        *summary.by_cause.entry(kind).or_default() += 1;
                    }
                }
                summary
            })
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for DeploymentSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} node(s): {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )?;
        for (kind, count) in &self.by_cause {
            write!(f, ", {} {}", count, kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeIdentity {
        NodeIdentity::new(name, "10.0.0.1".parse().unwrap())
    }

    #[test]
    fn summary_counts_by_cause() {
        let results = vec![
            DeploymentResult::success(&node("a"), "ok"),
            DeploymentResult::failed(&node("b"), ErrorKind::Transport, "connection refused"),
            DeploymentResult::failed(&node("c"), ErrorKind::Transport, "timed out"),
            DeploymentResult::failed(&node("d"), ErrorKind::FileNotFound, "missing d.crt"),
        ];
        let summary = DeploymentSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.by_cause[&ErrorKind::Transport], 2);
        assert!(!summary.all_succeeded());
        assert_eq!(
            summary.to_string(),
            "4 node(s): 1 succeeded, 3 failed, 1 FileNotFoundError, 2 TransportError"
        );
    }

    #[test]
    fn result_serializes_with_snake_case_cause() {
        let result = DeploymentResult::failed(&node("b"), ErrorKind::FileNotFound, "missing");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["cause"], "file_not_found");

        let ok = serde_json::to_value(DeploymentResult::success(&node("a"), "done")).unwrap();
        assert!(ok.get("cause").is_none());
    }
}
