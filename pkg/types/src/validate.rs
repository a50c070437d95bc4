use anyhow::{Result, bail};
use pkg_constants::paths::RESERVED_NODE_NAMES;

/// Validate a fleet node name.
///
/// The name becomes the certificate CN, a DNS SAN and the stem of the local
/// `<name>.crt` / `<name>.key` files, so it must be a hostname-like string:
/// dot-separated labels of `[A-Za-z0-9_-]`, each 1-63 chars, no label starting
/// or ending with a hyphen, at most 253 chars overall. Names that would
/// collide with the CA or HTTP-layer files (`ca`, `http`, `https`) are refused
/// in any letter case.
pub fn validate_node_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if RESERVED_NODE_NAMES
        .iter()
        .any(|reserved| name.eq_ignore_ascii_case(reserved))
    {
        bail!("name '{}' is reserved for certificate-directory files", name);
    }
    if name.len() > 253 {
        bail!("name '{}' exceeds 253 characters (got {})", name, name.len());
    }
    for label in name.split('.') {
        if label.is_empty() {
            bail!("name '{}' contains an empty label", name);
        }
        if label.len() > 63 {
            bail!("name '{}' has a label longer than 63 characters", name);
        }
        if label.starts_with('-') || label.ends_with('-') {
            bail!("name '{}' must not start or end a label with a hyphen", name);
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!(
                "name '{}' must contain only letters, digits, hyphens and underscores [A-Za-z0-9_-]",
                name
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_node_name("node-a").is_ok());
        assert!(validate_node_name("es-master-1").is_ok());
        assert!(validate_node_name("DataHot01").is_ok());
        assert!(validate_node_name("es_data_2").is_ok());
        assert!(validate_node_name("es-1.dc1.example.com").is_ok());
        assert!(validate_node_name("a").is_ok());
        assert!(validate_node_name("ca-1").is_ok());
        assert!(validate_node_name("ca.internal").is_ok());
    }

    #[test]
    fn reserved_names() {
        for name in ["ca", "CA", "http", "Http", "https"] {
            let err = validate_node_name(name).unwrap_err();
            assert!(err.to_string().contains("reserved"), "{}", name);
        }
    }

    #[test]
    fn invalid_names() {
        assert!(validate_node_name("").is_err());
        assert!(validate_node_name("../etc/passwd").is_err());
        assert!(validate_node_name("node/a").is_err());
        assert!(validate_node_name("-leading").is_err());
        assert!(validate_node_name("trailing-").is_err());
        assert!(validate_node_name("double..dot").is_err());
        assert!(validate_node_name("space in name").is_err());
        assert!(validate_node_name(&"a".repeat(64)).is_err());
        assert!(validate_node_name(&["abc"; 70].join(".")).is_err());
    }
}
