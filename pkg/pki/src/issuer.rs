use chrono::{DateTime, Utc};
use rcgen::{
    CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose, SanType,
};
use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::ca::{CertificateAuthority, to_chrono, write_file};
use crate::error::{PkiError, Result};
use crate::inspect::verify_chain;
use crate::keyenc;
use crate::serial::{SerialRegistry, trim_serial};
use pkg_constants::paths::{NODE_CERT_EXT, NODE_KEY_EXT};
use pkg_constants::pki;
use pkg_types::{FleetManifest, NodeIdentity, QuarantinedEntry};

/// A leaf certificate with its private key, both PEM-encoded.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub common_name: String,
    pub cert_pem: String,
    /// `PRIVATE KEY` PEM, or `ENCRYPTED PRIVATE KEY` when `key_encrypted`.
    pub key_pem: String,
    /// Serial with leading zero octets trimmed.
    pub serial: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_encrypted: bool,
}

/// One node's issued material.
#[derive(Debug, Clone)]
pub struct IssuedLeaf {
    pub node: NodeIdentity,
    pub certificate: IssuedCertificate,
}

/// Output of a full generation run.
#[derive(Debug, Clone, Default)]
pub struct IssuedMaterial {
    pub leaves: Vec<IssuedLeaf>,
    /// Manifest entries that were quarantined and received no certificate.
    pub skipped: Vec<QuarantinedEntry>,
}

/// Issues leaf certificates signed by a [`CertificateAuthority`].
///
/// One issuer corresponds to one generation run: it owns the serial registry
/// that guarantees uniqueness across everything it signs.
pub struct LeafIssuer<'a> {
    ca: &'a CertificateAuthority,
    serials: SerialRegistry,
    kdf_iterations: u32,
}

impl<'a> LeafIssuer<'a> {
    pub fn new(ca: &'a CertificateAuthority) -> Self {
        Self {
            ca,
            serials: SerialRegistry::new(),
            kdf_iterations: pki::KEY_PBKDF2_ITERATIONS,
        }
    }

    /// Override the PBKDF2 work factor used for encrypted keys.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    pub fn ca(&self) -> &CertificateAuthority {
        self.ca
    }

    /// Issue a per-node transport certificate.
    ///
    /// SAN is exactly `{DNS:<name>, IP:<ip>}`. With a passphrase the key is
    /// returned encrypted.
    pub fn issue_node(
        &mut self,
        node: &NodeIdentity,
        validity_days: u32,
        passphrase: Option<&str>,
    ) -> Result<IssuedCertificate> {
        debug!("Issuing certificate for node {}", node);
        let layout = self.ca.layout();
        for path in [layout.node_cert(&node.name), layout.node_key(&node.name)] {
            if layout.is_ca_artifact(&path) {
                return Err(PkiError::ReservedPath {
                    name: node.name.clone(),
                    path,
                });
            }
        }
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::OrganizationName, pki::NODE_ORGANIZATION);
        params
            .distinguished_name
            .push(DnType::CommonName, node.name.as_str());
        params.subject_alt_names = vec![
            SanType::DnsName(node.name.as_str().try_into()?),
            SanType::IpAddress(node.ip),
        ];
        self.sign(params, &node.name, validity_days, passphrase)
    }

    /// Issue the shared HTTP-layer certificate. Aliases that parse as IP
    /// addresses become IP SANs, the rest DNS SANs.
    pub fn issue_service_certificate(&mut self, aliases: &[String]) -> Result<IssuedCertificate> {
        if aliases.is_empty() {
            return Err(PkiError::InvalidSan("empty alias set".to_string()));
        }
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CountryName, pki::CA_COUNTRY);
        params
            .distinguished_name
            .push(DnType::OrganizationName, pki::CA_ORGANIZATION);
        params
            .distinguished_name
            .push(DnType::CommonName, pki::SERVICE_COMMON_NAME);
        params.subject_alt_names = aliases
            .iter()
            .map(|alias| service_san(alias))
            .collect::<Result<Vec<_>>>()?;

        let issued = self.sign(
            params,
            pki::SERVICE_COMMON_NAME,
            pki::SERVICE_VALIDITY_DAYS,
            None,
        )?;
        info!("Issued HTTP-layer certificate for {}", aliases.join(", "));
        Ok(issued)
    }

    fn sign(
        &mut self,
        mut params: CertificateParams,
        common_name: &str,
        validity_days: u32,
        passphrase: Option<&str>,
    ) -> Result<IssuedCertificate> {
        let now = time::OffsetDateTime::now_utc();
        let serial = self.serials.next();
        params.serial_number = Some(serial.clone());
        params.not_before = now;
        params.not_after = now + time::Duration::days(i64::from(validity_days));
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params.use_authority_key_identifier_extension = true;

        let (not_before, not_after) = (params.not_before, params.not_after);
        let key_pair = KeyPair::generate()?;
        let (ca_cert, ca_key) = self.ca.signer();
        let cert = params.signed_by(&key_pair, ca_cert, ca_key)?;

        let (key_pem, key_encrypted) = match passphrase {
            Some(passphrase) if !passphrase.is_empty() => (
                keyenc::encrypt_with_iterations(
                    &key_pair.serialize_der(),
                    passphrase,
                    self.kdf_iterations,
                )?,
                true,
            ),
            _ => (key_pair.serialize_pem(), false),
        };

        Ok(IssuedCertificate {
            common_name: common_name.to_string(),
            cert_pem: cert.pem(),
            key_pem,
            serial: trim_serial(&serial.to_bytes()).to_vec(),
            not_before: to_chrono(not_before),
            not_after: to_chrono(not_after),
            key_encrypted,
        })
    }

    /// Issue, verify and write a certificate for every manifest node.
    ///
    /// Everything is issued and chain-verified in memory before the first
    /// file is touched, so a failure leaves the directory holding only the CA.
    pub fn generate_all(
        &mut self,
        manifest: &FleetManifest,
        validity_days: u32,
        passphrase: Option<&str>,
    ) -> Result<IssuedMaterial> {
        for entry in manifest.quarantined() {
            warn!(
                "Skipping manifest entry #{} ({}): {}",
                entry.index,
                entry.name.as_deref().unwrap_or("<unnamed>"),
                entry.reason
            );
        }

        let mut leaves = Vec::with_capacity(manifest.len());
        for node in manifest {
            let certificate = self.issue_node(node, validity_days, passphrase)?;
            verify_chain(&certificate.cert_pem, self.ca.cert_pem())?;
            leaves.push(IssuedLeaf {
                node: node.clone(),
                certificate,
            });
        }

        remove_stale_leaves(self.ca)?;
        let layout = self.ca.layout();
        for leaf in &leaves {
            write_file(
                &layout.node_cert(&leaf.node.name),
                leaf.certificate.cert_pem.as_bytes(),
            )?;
            write_file(
                &layout.node_key(&leaf.node.name),
                leaf.certificate.key_pem.as_bytes(),
            )?;
        }
        info!(
            "Issued {} node certificate(s) into {}",
            leaves.len(),
            layout.root().display()
        );

        Ok(IssuedMaterial {
            leaves,
            skipped: manifest.quarantined().to_vec(),
        })
    }
}

/// Write the HTTP-layer triple (`http.crt`, `http.key`, `ca.crt`) under the
/// CA directory's `https/` subdirectory.
pub fn write_service_certificate(
    ca: &CertificateAuthority,
    certificate: &IssuedCertificate,
) -> Result<()> {
    let layout = ca.layout();
    write_file(&layout.http_cert(), certificate.cert_pem.as_bytes())?;
    write_file(&layout.http_key(), certificate.key_pem.as_bytes())?;
    write_file(&layout.http_ca(), ca.cert_pem().as_bytes())?;
    info!("Wrote HTTP-layer certificates to {}", layout.http_dir().display());
    Ok(())
}

/// Shorthand for a one-off run with a fresh [`LeafIssuer`].
pub fn generate_all(
    manifest: &FleetManifest,
    ca: &CertificateAuthority,
    validity_days: u32,
    passphrase: Option<&str>,
) -> Result<IssuedMaterial> {
    LeafIssuer::new(ca).generate_all(manifest, validity_days, passphrase)
}

fn service_san(alias: &str) -> Result<SanType> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(PkiError::InvalidSan(alias.to_string()));
    }
    if let Ok(ip) = alias.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    let name = alias
        .try_into()
        .map_err(|_| PkiError::InvalidSan(alias.to_string()))?;
    Ok(SanType::DnsName(name))
}

/// Remove leaf `.crt`/`.key` files from a previous run, keeping the CA.
fn remove_stale_leaves(ca: &CertificateAuthority) -> Result<()> {
    let layout = ca.layout();
    let unwritable = |source| PkiError::DirectoryUnwritable {
        path: layout.root().to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(layout.root()).map_err(unwritable)? {
        let path = entry.map_err(unwritable)?.path();
        let is_leaf = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == NODE_CERT_EXT || ext == NODE_KEY_EXT);
        if is_leaf && !layout.is_ca_artifact(&path) {
            std::fs::remove_file(&path).map_err(unwritable)?;
            debug!("Removed stale {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{SubjectAltName, decode_certificate, public_key_matches};
    use std::collections::HashSet;

    fn node(name: &str, ip: &str) -> NodeIdentity {
        NodeIdentity::new(name, ip.parse().unwrap())
    }

    fn fresh_ca() -> (tempfile::TempDir, CertificateAuthority) {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::regenerate(dir.path()).unwrap();
        (dir, ca)
    }

    #[test]
    fn node_certificate_chains_to_ca() {
        let (_dir, ca) = fresh_ca();
        let mut issuer = LeafIssuer::new(&ca);
        let issued = issuer
            .issue_node(&node("es-data-1", "10.0.0.2"), 825, None)
            .unwrap();

        let info = decode_certificate(&issued.cert_pem).unwrap();
        let ca_info = decode_certificate(ca.cert_pem()).unwrap();
        assert_eq!(info.issuer, ca_info.subject);
        assert_eq!(info.common_name.as_deref(), Some("es-data-1"));
        assert!(!info.is_ca);
        verify_chain(&issued.cert_pem, ca.cert_pem()).unwrap();
    }

    #[test]
    fn node_san_is_exactly_name_and_ip() {
        let (_dir, ca) = fresh_ca();
        let issued = LeafIssuer::new(&ca)
            .issue_node(&node("es-master-1", "10.0.0.1"), 825, None)
            .unwrap();
        let info = decode_certificate(&issued.cert_pem).unwrap();
        let sans: HashSet<_> = info.subject_alt_names.into_iter().collect();
        let expected: HashSet<_> = [
            SubjectAltName::Dns("es-master-1".into()),
            SubjectAltName::Ip("10.0.0.1".parse().unwrap()),
        ]
        .into_iter()
        .collect();
        assert_eq!(sans, expected);
    }

    #[test]
    fn validity_window_covers_issue_time() {
        let (_dir, ca) = fresh_ca();
        let issued = LeafIssuer::new(&ca)
            .issue_node(&node("es-1", "10.0.0.3"), 30, None)
            .unwrap();
        let now = Utc::now();
        assert!(issued.not_before <= now && now <= issued.not_after);
        assert_eq!((issued.not_after - issued.not_before).num_days(), 30);
    }

    #[test]
    fn decoded_fields_match_issued() {
        let (_dir, ca) = fresh_ca();
        let issued = LeafIssuer::new(&ca)
            .issue_node(&node("es-ingest-1", "fd00::5"), 825, None)
            .unwrap();
        let info = decode_certificate(&issued.cert_pem).unwrap();
        assert_eq!(info.serial, issued.serial);
        assert_eq!(info.not_before, issued.not_before);
        assert_eq!(info.not_after, issued.not_after);
        assert!(
            info.subject_alt_names
                .contains(&SubjectAltName::Ip("fd00::5".parse().unwrap()))
        );
    }

    #[test]
    fn serials_are_unique_across_many_issues() {
        let (_dir, ca) = fresh_ca();
        let mut issuer = LeafIssuer::new(&ca);
        let n = node("es-1", "10.0.0.1");
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let issued = issuer.issue_node(&n, 825, None).unwrap();
            assert!(seen.insert(issued.serial));
        }
    }

    #[test]
    fn previous_generation_no_longer_verifies() {
        let (dir, old_ca) = fresh_ca();
        let issued = LeafIssuer::new(&old_ca)
            .issue_node(&node("es-1", "10.0.0.1"), 825, None)
            .unwrap();
        let new_ca = CertificateAuthority::regenerate(dir.path()).unwrap();
        let err = verify_chain(&issued.cert_pem, new_ca.cert_pem()).unwrap_err();
        assert_eq!(err.kind(), pkg_types::ErrorKind::Verification);
    }

    #[test]
    fn encrypted_key_matches_certificate() {
        let (_dir, ca) = fresh_ca();
        let issued = LeafIssuer::new(&ca)
            .with_kdf_iterations(1_000)
            .issue_node(&node("es-1", "10.0.0.1"), 825, Some("changeit"))
            .unwrap();
        assert!(issued.key_encrypted);
        assert!(issued.key_pem.contains("ENCRYPTED PRIVATE KEY"));

        let der = keyenc::decrypt_private_key(&issued.key_pem, "changeit").unwrap();
        let key = KeyPair::try_from(der.as_slice()).unwrap();
        assert!(public_key_matches(&issued.cert_pem, &key.public_key_der()).unwrap());
        assert!(keyenc::decrypt_private_key(&issued.key_pem, "wrong").is_err());
    }

    #[test]
    fn empty_passphrase_leaves_key_plain() {
        let (_dir, ca) = fresh_ca();
        let issued = LeafIssuer::new(&ca)
            .issue_node(&node("es-1", "10.0.0.1"), 825, Some(""))
            .unwrap();
        assert!(!issued.key_encrypted);
        assert!(issued.key_pem.contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn service_certificate_uses_alias_set() {
        let (_dir, ca) = fresh_ca();
        let aliases = vec![
            "localhost".to_string(),
            "elasticsearch".to_string(),
            "127.0.0.1".to_string(),
        ];
        let issued = LeafIssuer::new(&ca)
            .issue_service_certificate(&aliases)
            .unwrap();
        let info = decode_certificate(&issued.cert_pem).unwrap();
        assert_eq!(info.common_name.as_deref(), Some("Elasticsearch HTTP Layer"));
        assert_eq!(
            info.subject_alt_names,
            vec![
                SubjectAltName::Dns("localhost".into()),
                SubjectAltName::Dns("elasticsearch".into()),
                SubjectAltName::Ip("127.0.0.1".parse().unwrap()),
            ]
        );
        assert!(!issued.key_encrypted);
        verify_chain(&issued.cert_pem, ca.cert_pem()).unwrap();

        write_service_certificate(&ca, &issued).unwrap();
        let layout = ca.layout();
        assert!(layout.http_cert().exists());
        assert!(layout.http_key().exists());
        assert_eq!(
            std::fs::read_to_string(layout.http_ca()).unwrap(),
            ca.cert_pem()
        );
    }

    #[test]
    fn service_certificate_rejects_empty_aliases() {
        let (_dir, ca) = fresh_ca();
        let mut issuer = LeafIssuer::new(&ca);
        assert!(matches!(
            issuer.issue_service_certificate(&[]),
            Err(PkiError::InvalidSan(_))
        ));
        assert!(matches!(
            issuer.issue_service_certificate(&["  ".to_string()]),
            Err(PkiError::InvalidSan(_))
        ));
    }

    #[test]
    fn generate_all_writes_every_node_and_reports_skipped() {
        let (dir, ca) = fresh_ca();
        std::fs::write(dir.path().join("retired-node.crt"), "old").unwrap();
        std::fs::write(dir.path().join("retired-node.key"), "old").unwrap();

        let manifest = FleetManifest::from_yaml_str(
            r#"
instances:
  - name: es-master-1
    ip: 10.0.0.1
  - name: es-data-1
    ip: 10.0.0.2
  - name: broken
    ip: not-an-ip
"#,
        )
        .unwrap();

        let material = generate_all(&manifest, &ca, 825, None).unwrap();
        assert_eq!(material.leaves.len(), 2);
        assert_eq!(material.skipped.len(), 1);
        assert_eq!(material.leaves[0].node.name, "es-master-1");

        let layout = ca.layout();
        for name in ["es-master-1", "es-data-1"] {
            let pem = std::fs::read_to_string(layout.node_cert(name)).unwrap();
            verify_chain(&pem, ca.cert_pem()).unwrap();
            assert!(layout.node_key(name).exists());
        }
        assert!(!dir.path().join("retired-node.crt").exists());
        assert!(!dir.path().join("retired-node.key").exists());
        assert!(layout.ca_cert().exists());
        assert!(layout.ca_key().exists());

        let serials: HashSet<_> = material
            .leaves
            .iter()
            .map(|leaf| leaf.certificate.serial.clone())
            .collect();
        assert_eq!(serials.len(), 2);
    }

    #[test]
    fn node_named_ca_never_replaces_ca_key() {
        let (dir, ca) = fresh_ca();
        let ca_key = std::fs::read(ca.layout().ca_key()).unwrap();

        let mut issuer = LeafIssuer::new(&ca);
        let err = issuer
            .issue_node(&node("ca", "10.0.0.9"), 825, None)
            .unwrap_err();
        assert!(matches!(err, PkiError::ReservedPath { .. }));
        assert_eq!(err.kind(), pkg_types::ErrorKind::Config);

        let manifest = FleetManifest::from_yaml_str(
            "instances:\n  - { name: ca, ip: 10.0.0.9 }\n  - { name: node-a, ip: 10.0.0.1 }\n",
        )
        .unwrap();
        let material = generate_all(&manifest, &ca, 825, None).unwrap();
        assert_eq!(material.leaves.len(), 1);
        assert_eq!(material.skipped[0].name.as_deref(), Some("ca"));

        assert_eq!(std::fs::read(ca.layout().ca_key()).unwrap(), ca_key);
        let reloaded = CertificateAuthority::load(dir.path()).unwrap();
        assert_eq!(reloaded.public_key_der(), ca.public_key_der());
    }
}
