use std::path::Path;

use der::Encode;
use der::flagset::FlagSet;
use tracing::{debug, info};
use x509_cert::ext::pkix::SubjectAltName;

use crate::cert::extensions::{
    AuthorityKeyIdentifier, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyIdDigest, KeyUsage,
    KeyUsages, NetscapeCertType, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificateRequest, DistinguishedName, ExtensionParam};
use crate::cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm, SignedCertificate};
use crate::error::Result;
use crate::key::KeyPair;
use crate::pem_utils;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// Implementors supply the CA certificate and its private key; the default
/// methods build and sign entitlement certificates from them. Both accessors
/// may fail, so a source backed by files or a keystore can report load errors.
pub trait Issuer: Send + Sync {
    /// The CA certificate whose key signs issued certificates.
    fn ca_certificate(&self) -> Result<&Certificate>;

    /// The CA private key.
    fn signing_key(&self) -> Result<&KeyPair>;

    /// The AKI placed in issued certificates and CRLs.
    ///
    /// The directory name is the CA certificate's *issuer*, which for a
    /// self-signed root is its subject.
    fn authority_key_identifier(&self, digest: KeyIdDigest) -> Result<AuthorityKeyIdentifier> {
        let ca = self.ca_certificate()?;
        Ok(AuthorityKeyIdentifier {
            key_identifier: digest.key_identifier(&ca.public_key_der()?)?,
            authority_cert_issuer: ca.inner.tbs_certificate.issuer.clone(),
            authority_cert_serial_number: ca.serial_number_bytes().to_vec(),
        })
    }

    /// Issues an entitlement certificate for `request`.
    ///
    /// Extensions are emitted in a fixed order: Netscape cert type, key usage,
    /// AKI, SKI, extended key usage, the optional alternate name, then the
    /// request's text extensions and byte extensions as given.
    fn issue(
        &self,
        request: &CertificateRequest,
        algorithm: SignatureAlgorithm,
        digest: KeyIdDigest,
    ) -> Result<SignedCertificate> {
        let ca_key = self.signing_key()?;
        algorithm.ensure_compatible(ca_key)?;

        let ca = self.ca_certificate()?;
        let issuer = DistinguishedName::from_x509_name(&ca.inner.tbs_certificate.issuer);
        let subject = DistinguishedName::parse(&request.subject);

        let subject_public_key_info = request.subject_public_key.to_spki()?;
        let subject_key_id = digest.key_identifier(&subject_public_key_info.to_der()?)?;

        let key_usage: FlagSet<KeyUsages> = KeyUsages::DigitalSignature
            | KeyUsages::KeyEncipherment
            | KeyUsages::DataEncipherment;

        let mut extensions = vec![
            ExtensionParam::from_extension(
                &NetscapeCertType(NetscapeCertType::SSL_CLIENT | NetscapeCertType::SMIME),
                false,
            )?,
            ExtensionParam::from_extension(&KeyUsage(key_usage), false)?,
            ExtensionParam::from_extension(&self.authority_key_identifier(digest)?, false)?,
            ExtensionParam::from_extension(&SubjectKeyIdentifier(subject_key_id), false)?,
            ExtensionParam::from_extension(
                &ExtendedKeyUsage {
                    usage: vec![ExtendedKeyUsageOption::ClientAuth],
                },
                false,
            )?,
        ];

        if let Some(alt_name) = &request.alt_name {
            // Carried verbatim as the text "CN=<alt name>", not as GeneralNames.
            extensions.push(ExtensionParam {
                oid: <SubjectAltName as const_oid::AssociatedOid>::OID,
                critical: false,
                value: format!("CN={alt_name}").into_bytes(),
            });
        }

        for wrapper in request.extensions.iter().chain(&request.byte_extensions) {
            extensions.push(wrapper.to_extension_param()?);
        }

        debug!(
            "Signing certificate serial {} for '{}' with {} ({} extensions)",
            request.serial_number,
            subject,
            algorithm,
            extensions.len()
        );

        let tbs_cert = TbsCertificate {
            serial_number: request.serial_number,
            signature_algorithm: algorithm,
            issuer: issuer.as_x509_name()?,
            validity: request.validity.clone(),
            subject: subject.as_x509_name()?,
            subject_public_key_info,
            extensions,
        };

        let certificate = tbs_cert.sign(ca_key)?;
        let signed = SignedCertificate::from_der(certificate.to_der()?)?;

        info!("Issued certificate serial {}", request.serial_number);
        Ok(signed)
    }
}

impl CertificateWithPrivateKey {
    /// Loads CA material from PEM text.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        Ok(Self {
            cert: Certificate::from_pem(cert_pem)?,
            key: KeyPair::from_pem(key_pem)?,
        })
    }

    /// Loads CA material from a certificate PEM file and a private key PEM file.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();
        debug!(
            "Loading CA certificate from {} and key from {}",
            cert_path.display(),
            key_path.display()
        );
        let cert_pem = std::fs::read_to_string(cert_path)?;
        let key_pem = std::fs::read_to_string(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// PEM text of the private key as `RSA PRIVATE KEY`. RSA keys only.
    pub fn key_to_pem(&self) -> Result<Vec<u8>> {
        Ok(pem_utils::pem_encode(
            pem_utils::RSA_PRIVATE_KEY_LABEL,
            &self.key.to_pkcs1_der()?,
        ))
    }
}

/// Implementation of the `Issuer` trait for `CertificateWithPrivateKey`.
impl Issuer for CertificateWithPrivateKey {
    fn ca_certificate(&self) -> Result<&Certificate> {
        Ok(&self.cert)
    }

    fn signing_key(&self) -> Result<&KeyPair> {
        Ok(&self.key)
    }
}
