use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cert::extensions::{self, KeyIdDigest};
use crate::cert::params::CertificateRequest;
use crate::cert::{Certificate, SignatureAlgorithm, SignedCertificate};
use crate::config::{CrlBackend, PkiConfig};
use crate::crl::{self, CrlEntry, CrlRequest, ExternalCrlSigner};
use crate::error::{PkiError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::pem_utils;

/// The operations callers rely on to issue entitlement material.
///
/// Implementations are shared across threads; every call is independent.
pub trait PkiUtility: Send + Sync {
    /// Builds, signs and re-parses one entitlement certificate.
    fn issue_certificate(&self, request: &CertificateRequest) -> Result<SignedCertificate>;

    /// Produces a CRL for `entries`.
    ///
    /// `Ok(None)` means the configured path ran to completion without
    /// producing CRL bytes.
    fn issue_crl(&self, entries: &[CrlEntry], crl_number: u64) -> Result<Option<Vec<u8>>>;

    /// Frames DER bytes as PEM with CRLF line endings.
    fn pem_encode(&self, label: &str, der: &[u8]) -> Vec<u8> {
        pem_utils::pem_encode(label, der)
    }

    /// Textual form of an `extnValue` OCTET STRING.
    fn decode_extension_value(&self, value: &[u8]) -> Result<String> {
        extensions::decode_extension_value(value)
    }
}

/// [`PkiUtility`] backed by the RustCrypto X.509 stack.
///
/// The CRL path is chosen by [`PkiConfig::crl_backend`].
pub struct X509PkiUtility {
    config: PkiConfig,
    issuer: Arc<dyn Issuer>,
    external_signer: Option<Arc<dyn ExternalCrlSigner>>,
}

impl X509PkiUtility {
    /// Creates the utility, making sure the CRL work directory exists.
    ///
    /// Failure to create the directory is an `IoFailure` and leaves nothing
    /// usable behind.
    pub fn new(config: PkiConfig, issuer: Arc<dyn Issuer>) -> Result<Self> {
        std::fs::create_dir_all(&config.crl_work_dir).map_err(|e| {
            PkiError::IoFailure(format!(
                "Unable to create base dir for CRL generation {}: {e}",
                config.crl_work_dir.display()
            ))
        })?;
        info!(
            "PKI utility ready (CRL backend {:?}, work dir {})",
            config.crl_backend,
            config.crl_work_dir.display()
        );
        Ok(Self {
            config,
            issuer,
            external_signer: None,
        })
    }

    /// Hands index files to `signer` when the index-file backend runs.
    pub fn with_external_signer(mut self, signer: Arc<dyn ExternalCrlSigner>) -> Self {
        self.external_signer = Some(signer);
        self
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    pub fn issuer(&self) -> &dyn Issuer {
        self.issuer.as_ref()
    }

    fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_str(&self.config.signature_algorithm)
    }

    fn key_id_digest(&self) -> Result<KeyIdDigest> {
        KeyIdDigest::from_str(&self.config.key_id_digest)
    }

    /// PEM text of a certificate.
    pub fn certificate_pem(&self, certificate: &Certificate) -> Result<Vec<u8>> {
        certificate.to_pem()
    }

    /// PEM text of an RSA private key, labelled `RSA PRIVATE KEY`.
    pub fn private_key_pem(&self, key: &KeyPair) -> Result<Vec<u8>> {
        Ok(pem_utils::pem_encode(
            pem_utils::RSA_PRIVATE_KEY_LABEL,
            &key.to_pkcs1_der()?,
        ))
    }

    /// PEM text of a CRL under the configured label.
    pub fn crl_pem(&self, crl_der: &[u8]) -> Vec<u8> {
        pem_utils::pem_encode(&self.config.crl_pem_label, crl_der)
    }
}

impl PkiUtility for X509PkiUtility {
    fn issue_certificate(&self, request: &CertificateRequest) -> Result<SignedCertificate> {
        let algorithm = self.signature_algorithm()?;
        let digest = self.key_id_digest()?;
        debug!(
            "Issuing certificate serial {} for '{}'",
            request.serial_number, request.subject
        );
        self.issuer.issue(request, algorithm, digest)
    }

    fn issue_crl(&self, entries: &[CrlEntry], crl_number: u64) -> Result<Option<Vec<u8>>> {
        let request = CrlRequest::new(entries.to_vec(), crl_number);
        debug!(
            "Generating CRL {} with {} entries via {:?}",
            crl_number,
            entries.len(),
            self.config.crl_backend
        );

        match self.config.crl_backend {
            CrlBackend::IndexFile => crl::generate_with_index_file(
                &self.config.crl_work_dir,
                &request,
                self.external_signer.as_deref(),
            ),
            CrlBackend::Native => crl::build_signed_crl_now(
                self.issuer.as_ref(),
                &request,
                self.signature_algorithm()?,
                self.key_id_digest()?,
                self.config.crl_next_update_hours,
            )
            .map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateWithPrivateKey;
    use crate::cert::params::{DistinguishedName, Validity};

    fn issuer() -> Arc<dyn Issuer> {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = Certificate::new_self_signed(
            &DistinguishedName::parse("CN=pki test ca"),
            &key,
            &Validity::for_days(1),
            1,
            SignatureAlgorithm::Sha256WithECDSA,
        )
        .unwrap();
        Arc::new(CertificateWithPrivateKey { cert, key })
    }

    #[test]
    fn test_new_creates_work_dir() {
        let base = tempfile::tempdir().unwrap();
        let work_dir = base.path().join("a").join("b");
        let config = PkiConfig::default().with_crl_work_dir(&work_dir);
        X509PkiUtility::new(config, issuer()).unwrap();
        assert!(work_dir.is_dir());
    }

    #[test]
    fn test_new_fails_when_work_dir_is_a_file() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let config = PkiConfig::default().with_crl_work_dir(file.join("sub"));
        let err = X509PkiUtility::new(config, issuer()).err().unwrap();
        assert!(matches!(err, PkiError::IoFailure(_)));
    }

    #[test]
    fn test_default_algorithm_does_not_fit_ec_ca() {
        let base = tempfile::tempdir().unwrap();
        let config = PkiConfig::default().with_crl_work_dir(base.path());
        let pki = X509PkiUtility::new(config, issuer()).unwrap();
        let request = CertificateRequest::builder()
            .subject("CN=x")
            .validity(Validity::for_days(1))
            .subject_public_key(KeyPair::generate_ecdsa_p256().public_key())
            .serial_number(5)
            .build();
        let err = pki.issue_certificate(&request).unwrap_err();
        assert!(matches!(err, PkiError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_crl_pem_uses_configured_label() {
        let base = tempfile::tempdir().unwrap();
        let config = PkiConfig::default().with_crl_work_dir(base.path());
        let pki = X509PkiUtility::new(config, issuer()).unwrap();
        let pem = String::from_utf8(pki.crl_pem(b"crl")).unwrap();
        assert!(pem.starts_with("-----BEGIN THINGY-----\r\n"));
    }
}
