use crate::error::Result;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Convert a PEM‑encoded string to DER‑encoded bytes, checking the label.
pub fn pem_to_der(pem_str: &str, label: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    if pem.tag() != label {
        return Err(crate::error::CertChainError::Serialization(format!(
            "expected PEM label `{label}`, found `{}`",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

/// Parse every PEM block with the given label out of a concatenated file.
pub fn pem_blocks(pem_str: &str, label: &str) -> Result<Vec<Vec<u8>>> {
    Ok(pem::parse_many(pem_str)?
        .into_iter()
        .filter(|pem| pem.tag() == label)
        .map(|pem| pem.into_contents())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mismatch_is_rejected() {
        let pem = der_to_pem(&[1, 2, 3], CERTIFICATE_REQUEST_LABEL);
        assert!(pem_to_der(&pem, CERTIFICATE_LABEL).is_err());
        assert_eq!(pem_to_der(&pem, CERTIFICATE_REQUEST_LABEL).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pem_blocks_keeps_order() {
        let joined = [
            der_to_pem(&[1], CERTIFICATE_LABEL),
            der_to_pem(&[9], RSA_PRIVATE_KEY_LABEL),
            der_to_pem(&[2], CERTIFICATE_LABEL),
        ]
        .concat();
        let blocks = pem_blocks(&joined, CERTIFICATE_LABEL).unwrap();
        assert_eq!(blocks, vec![vec![1], vec![2]]);
    }
}
