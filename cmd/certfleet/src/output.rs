use serde::Serialize;

use pkg_pki::CertificateInfo;
use pkg_types::{DeploymentResult, DeploymentSummary};

#[derive(Debug, Serialize)]
pub struct DeployReport<'a> {
    pub run_id: String,
    pub profile: String,
    pub summary: DeploymentSummary,
    pub results: &'a [DeploymentResult],
}

pub fn render_results_table(results: &[DeploymentResult]) -> String {
    let mut out = format!(
        "{:<24} {:<40} {:<8} {:<18} {}\n",
        "NODE", "IP", "STATUS", "CAUSE", "DETAIL"
    );
    for result in results {
        let cause = result
            .cause
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<24} {:<40} {:<8} {:<18} {}\n",
            result.node,
            result.ip,
            result.status,
            cause,
            first_line(&result.detail)
        ));
    }
    if results.is_empty() {
        out.push_str("(no nodes)\n");
    }
    out
}

pub fn render_certificate(info: &CertificateInfo, chain: Option<&str>) -> String {
    let sans: Vec<String> = info
        .subject_alt_names
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut out = String::new();
    out.push_str(&format!("Subject:     {}\n", info.subject));
    out.push_str(&format!("Issuer:      {}\n", info.issuer));
    out.push_str(&format!("Serial:      {}\n", info.serial_hex()));
    out.push_str(&format!("Not before:  {}\n", info.not_before));
    out.push_str(&format!("Not after:   {}\n", info.not_after));
    out.push_str(&format!("CA:          {}\n", info.is_ca));
    if sans.is_empty() {
        out.push_str("SAN:         (none)\n");
    } else {
        out.push_str(&format!("SAN:         {}\n", sans.join(", ")));
    }
    if let Some(chain) = chain {
        out.push_str(&format!("Chain:       {}\n", chain));
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
