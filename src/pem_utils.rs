use pem::{EncodeConfig, LineEnding, Pem};

use crate::error::{PkiError, Result};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// Convert DER-encoded data into PEM text with the provided label.
///
/// Base64 lines are wrapped at 64 columns and every line, including the
/// footer, ends in CRLF.
pub fn pem_encode(label: &str, der: &[u8]) -> Vec<u8> {
    let pem = Pem::new(label, der);
    let config = EncodeConfig::new()
        .set_line_ending(LineEnding::CRLF)
        .set_line_wrap(64);
    pem::encode_config(&pem, config).into_bytes()
}

/// Decode the first PEM block of `pem_str`, returning its label and payload.
pub fn pem_decode(pem_str: &str) -> Result<(String, Vec<u8>)> {
    let pem = pem::parse(pem_str)?;
    Ok((pem.tag().to_string(), pem.into_contents()))
}

/// Convert PEM text to DER bytes, requiring the block to carry `label`.
pub fn pem_to_der(pem_str: &str, label: &str) -> Result<Vec<u8>> {
    let (found, der) = pem_decode(pem_str)?;
    if found != label {
        return Err(PkiError::DecodingError(format!(
            "expected PEM label '{label}', found '{found}'"
        )));
    }
    Ok(der)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_and_wrapping() {
        let der: Vec<u8> = (0..=255u8).collect();
        let encoded = String::from_utf8(pem_encode("THINGY", &der)).unwrap();

        assert!(encoded.starts_with("-----BEGIN THINGY-----\r\n"));
        assert!(encoded.ends_with("-----END THINGY-----\r\n"));
        for line in encoded.split("\r\n").filter(|l| !l.starts_with("-----")) {
            assert!(line.len() <= 64);
        }
        assert!(!encoded.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_decode_returns_label_and_payload() {
        let encoded = pem_encode(CERTIFICATE_LABEL, b"\x30\x03\x02\x01\x01");
        let (label, der) = pem_decode(std::str::from_utf8(&encoded).unwrap()).unwrap();
        assert_eq!(label, CERTIFICATE_LABEL);
        assert_eq!(der, b"\x30\x03\x02\x01\x01");
    }

    #[test]
    fn test_empty_payload() {
        let encoded = String::from_utf8(pem_encode("X", &[])).unwrap();
        assert_eq!(encoded, "-----BEGIN X-----\r\n-----END X-----\r\n");
    }

    #[test]
    fn test_label_mismatch() {
        let encoded = pem_encode("X509 CRL", b"abc");
        let err = pem_to_der(std::str::from_utf8(&encoded).unwrap(), CERTIFICATE_LABEL);
        assert!(matches!(err, Err(PkiError::DecodingError(_))));
    }
}
