use chrono::{DateTime, Utc};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PkiError, Result};
use crate::layout::CertDirLayout;
use crate::serial::SerialRegistry;
use pkg_constants::pki;

/// Fleet root Certificate Authority.
///
/// Self-signed; exactly one generation lives in a certificate directory at a
/// time. A new CA is only ever produced by [`CertificateAuthority::regenerate`]
/// (reset + bootstrap), so every node has to re-trust the CA after each run.
pub struct CertificateAuthority {
    layout: CertDirLayout,
    key_pair: KeyPair,
    cert: rcgen::Certificate,
    cert_pem: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl CertificateAuthority {
    /// Delete every certificate/key artifact in `dir` (top-level files and the
    /// HTTP-layer subdirectory), creating `dir` if it is absent.
    pub fn reset(dir: &Path) -> Result<()> {
        let layout = CertDirLayout::new(dir);
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| PkiError::DirectoryUnwritable {
                path: dir.to_path_buf(),
                source,
            })?;
            info!("Created certificate directory {}", dir.display());
            return Ok(());
        }

        info!("Cleaning old certificates in {}", dir.display());
        let unwritable = |source| PkiError::DirectoryUnwritable {
            path: dir.to_path_buf(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(unwritable)? {
            let path = entry.map_err(unwritable)?.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(unwritable)?;
                debug!("Removed {}", path.display());
            }
        }
        let http_dir = layout.http_dir();
        if http_dir.is_dir() {
            std::fs::remove_dir_all(&http_dir).map_err(unwritable)?;
            debug!("Removed {}", http_dir.display());
        }
        Ok(())
    }

    /// Generate a fresh root key and self-signed certificate and write
    /// `ca.pem` / `ca.key` into `dir`. Callers reset the directory first;
    /// [`CertificateAuthority::regenerate`] does both.
    pub fn bootstrap(dir: &Path) -> Result<Self> {
        Self::bootstrap_with_validity(dir, pki::CA_VALIDITY_DAYS)
    }

    pub fn bootstrap_with_validity(dir: &Path, validity_days: u32) -> Result<Self> {
        info!("Generating new fleet root CA");
        let layout = CertDirLayout::new(dir);

        let now = time::OffsetDateTime::now_utc();
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CountryName, pki::CA_COUNTRY);
        params
            .distinguished_name
            .push(DnType::OrganizationName, pki::CA_ORGANIZATION);
        params
            .distinguished_name
            .push(DnType::CommonName, pki::CA_COMMON_NAME);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.serial_number = Some(SerialRegistry::new().next());
        params.not_before = now;
        params.not_after = now + time::Duration::days(i64::from(validity_days));

        let (not_before, not_after) = (params.not_before, params.not_after);
        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;
        let cert_pem = cert.pem();

        write_file(&layout.ca_key(), key_pair.serialize_pem().as_bytes())?;
        write_file(&layout.ca_cert(), cert_pem.as_bytes())?;
        info!("Created new CA certificate: {}", layout.ca_cert().display());

        Ok(Self {
            not_before: to_chrono(not_before),
            not_after: to_chrono(not_after),
            layout,
            key_pair,
            cert,
            cert_pem,
        })
    }

    /// Wipe `dir` and bootstrap a new CA in it.
    pub fn regenerate(dir: &Path) -> Result<Self> {
        Self::reset(dir)?;
        Self::bootstrap(dir)
    }

    /// Load the CA previously bootstrapped into `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let layout = CertDirLayout::new(dir);
        let cert_path = layout.ca_cert();
        let key_path = layout.ca_key();
        for path in [&cert_path, &key_path] {
            if !path.exists() {
                return Err(PkiError::MissingCa(path.clone()));
            }
        }

        let cert_pem = read_file(&cert_path)?;
        let key_pem = read_file(&key_path)?;
        let key_pair = KeyPair::from_pem(&key_pem)?;
        let params = CertificateParams::from_ca_cert_pem(&cert_pem)?;
        if !matches!(params.is_ca, IsCa::Ca(_)) {
            return Err(PkiError::InvalidCertificate(format!(
                "{} is not a CA certificate",
                cert_path.display()
            )));
        }
        if !crate::inspect::public_key_matches(&cert_pem, &key_pair.public_key_der())? {
            return Err(PkiError::InvalidCertificate(format!(
                "{} does not match {}",
                key_path.display(),
                cert_path.display()
            )));
        }
        // Issued leaves only reference the subject DN and key, so a re-signed
        // copy serves as the in-memory issuer. ca.pem on disk stays authoritative.
        let (not_before, not_after) = (params.not_before, params.not_after);
        let cert = params.self_signed(&key_pair)?;

        info!("Loaded CA from {}", dir.display());
        Ok(Self {
            not_before: to_chrono(not_before),
            not_after: to_chrono(not_after),
            layout,
            key_pair,
            cert,
            cert_pem,
        })
    }

    /// The on-disk CA certificate PEM, distributed to every node.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn layout(&self) -> &CertDirLayout {
        &self.layout
    }

    pub fn dir(&self) -> &Path {
        self.layout.root()
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DER SubjectPublicKeyInfo of the CA key.
    pub fn public_key_der(&self) -> Vec<u8> {
        self.key_pair.public_key_der()
    }

    pub(crate) fn signer(&self) -> (&rcgen::Certificate, &KeyPair) {
        (&self.cert, &self.key_pair)
    }
}

pub(crate) fn to_chrono(at: time::OffsetDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0).unwrap_or_default()
}

pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PkiError::DirectoryUnwritable {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| PkiError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    #[cfg(unix)]
    if path.extension().is_some_and(|ext| ext == "key") {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(
            |source| PkiError::Write {
                path: path.to_path_buf(),
                source,
            },
        )?;
    }
    Ok(())
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| PkiError::Read {
        path: PathBuf::from(path),
        source,
    })
}
