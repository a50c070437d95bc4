//! Private PKI for the fleet: root CA lifecycle and leaf issuance.

pub mod ca;
pub mod error;
pub mod inspect;
pub mod issuer;
pub mod keyenc;
pub mod layout;
pub mod serial;

pub use ca::CertificateAuthority;
pub use error::{PkiError, Result};
pub use inspect::{CertificateInfo, SubjectAltName, decode_certificate, verify_chain};
pub use issuer::{
    IssuedCertificate, IssuedLeaf, IssuedMaterial, LeafIssuer, generate_all,
    write_service_certificate,
};
pub use layout::CertDirLayout;
