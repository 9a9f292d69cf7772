//! Certificate serial numbers.
//!
//! Serials come straight from the operating system CSPRNG. There is no registry
//! of issued serials, so uniqueness across runs is probabilistic.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::{CertChainError, Result};

/// Serial width in octets (160 bits, the RFC 5280 maximum).
pub const SERIAL_LEN: usize = 20;

/// Draws a fresh 160-bit serial.
///
/// The top bit is cleared so the INTEGER is positive, and the next bit is set
/// so the value never starts with a zero octet and always encodes in exactly
/// [`SERIAL_LEN`] octets.
pub fn random_serial() -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; SERIAL_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CertChainError::Sign(format!("serial number entropy: {e}")))?;
    bytes[0] = (bytes[0] & 0x7F) | 0x40;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_serials_are_positive_and_fixed_width() {
        for _ in 0..64 {
            let serial = random_serial().unwrap();
            assert_eq!(serial.len(), SERIAL_LEN);
            assert_eq!(serial[0] & 0x80, 0);
            assert_ne!(serial[0], 0);
        }
    }

    #[test]
    fn test_serials_are_pairwise_distinct() {
        let serials: HashSet<Vec<u8>> = (0..5000).map(|_| random_serial().unwrap()).collect();
        assert_eq!(serials.len(), 5000);
    }
}
