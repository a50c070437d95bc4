use pkg_constants::pki::SERIAL_LEN;
use rand::RngCore;
use rcgen::SerialNumber;
use std::collections::HashSet;

/// Draw a certificate serial from the thread-local CSPRNG.
///
/// The top bit is cleared so the DER INTEGER stays positive without a
/// padding byte, and an all-zero draw is rejected (RFC 5280 requires a
/// positive, non-zero serial).
pub fn random_serial() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SERIAL_LEN];
    loop {
        rng.fill_bytes(&mut bytes);
        bytes[0] &= 0x7f;
        if bytes.iter().any(|b| *b != 0) {
            return bytes.to_vec();
        }
    }
}

/// Serials handed out during one generation run.
#[derive(Debug, Default)]
pub struct SerialRegistry {
    issued: HashSet<Vec<u8>>,
}

impl SerialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a serial not yet issued in this run.
    pub fn next(&mut self) -> SerialNumber {
        loop {
            let serial = random_serial();
            if self.issued.insert(serial.clone()) {
                return SerialNumber::from(serial);
            }
            tracing::warn!("Serial collision within generation run, drawing again");
        }
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Strip leading zero octets. DER integer encoding may drop or add them, so
/// serials are compared in this form.
pub fn trim_serial(serial: &[u8]) -> &[u8] {
    let start = serial
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(serial.len().saturating_sub(1));
    &serial[start..]
}

/// Lower-case colon-separated hex of the trimmed serial.
pub fn serial_hex(serial: &[u8]) -> String {
    trim_serial(serial)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_is_positive_and_full_length() {
        for _ in 0..256 {
            let serial = random_serial();
            assert_eq!(serial.len(), SERIAL_LEN);
            assert_eq!(serial[0] & 0x80, 0);
            assert!(serial.iter().any(|b| *b != 0));
        }
    }

    #[test]
    fn registry_never_repeats() {
        let mut registry = SerialRegistry::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(registry.next().to_bytes()));
        }
        assert_eq!(registry.len(), 10_000);
    }

    #[test]
    fn hex_format() {
        assert_eq!(serial_hex(&[0x0a, 0xff, 0x01]), "0a:ff:01");
        assert_eq!(serial_hex(&[0x00, 0x00, 0x85]), "85");
    }

    #[test]
    fn trim_keeps_last_zero() {
        assert_eq!(trim_serial(&[0, 0, 7]), &[7]);
        assert_eq!(trim_serial(&[0, 0]), &[0]);
        assert_eq!(trim_serial(&[]), &[] as &[u8]);
    }
}
