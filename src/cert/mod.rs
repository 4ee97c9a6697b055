pub mod extensions;
pub mod params;

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, AnyRef, OctetString};
use der::{Decode, Encode};
use der::flagset::FlagSet;
use extensions::{BasicConstraints, KeyIdDigest, KeyUsage, KeyUsages, SubjectKeyIdentifier};
use params::{DistinguishedName, ExtensionParam, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::pem_utils;
use crate::tbs_certificate::{TbsCertificate, from_x509_time};

/// Represents the supported signature algorithms for certificates and CRLs.
///
/// Parsed from the names used in configuration, e.g. `SHA256withRSA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-1 with RSA encryption.
    Sha1WithRSA,
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-256 with ECDSA over P-256.
    Sha256WithECDSA,
}

impl SignatureAlgorithm {
    /// Fails with `UnsupportedAlgorithm` when `key` cannot produce this signature.
    pub fn ensure_compatible(&self, key: &KeyPair) -> Result<()> {
        let compatible = matches!(
            (self, key),
            (
                SignatureAlgorithm::Sha1WithRSA | SignatureAlgorithm::Sha256WithRSA,
                KeyPair::Rsa { .. }
            ) | (SignatureAlgorithm::Sha256WithECDSA, KeyPair::EcdsaP256 { .. })
        );
        if compatible {
            Ok(())
        } else {
            Err(PkiError::UnsupportedAlgorithm(format!(
                "{self} cannot be used with a {} CA key",
                key.key_type()
            )))
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1WITHRSA" => Ok(SignatureAlgorithm::Sha1WithRSA),
            "SHA256WITHRSA" => Ok(SignatureAlgorithm::Sha256WithRSA),
            "SHA256WITHECDSA" => Ok(SignatureAlgorithm::Sha256WithECDSA),
            _ => Err(PkiError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::Sha1WithRSA => f.write_str("SHA1withRSA"),
            SignatureAlgorithm::Sha256WithRSA => f.write_str("SHA256withRSA"),
            SignatureAlgorithm::Sha256WithECDSA => f.write_str("SHA256withECDSA"),
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter; ECDSA ones carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let rsa_null = Some(Any::from(AnyRef::NULL));
        match value {
            SignatureAlgorithm::Sha1WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_1_WITH_RSA_ENCRYPTION,
                parameters: rsa_null,
            },
            SignatureAlgorithm::Sha256WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: rsa_null,
            },
            SignatureAlgorithm::Sha256WithECDSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let der = pem_utils::pem_to_der(pem_str, pem_utils::CERTIFICATE_LABEL)?;
        Self::from_der(&der)
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format with CRLF line endings.
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(pem_utils::pem_encode(pem_utils::CERTIFICATE_LABEL, &self.to_der()?))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Raw serial number bytes as encoded in the certificate.
    pub fn serial_number_bytes(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn serial_number(&self) -> Result<u64> {
        extensions::bytes_to_u64(self.serial_number_bytes())
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }

    /// DER encoded SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self
            .inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()?)
    }

    /// All extensions in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()
            .map(|extensions| {
                extensions
                    .iter()
                    .map(|ext| ExtensionParam {
                        oid: ext.extn_id,
                        critical: ext.critical,
                        value: ext.extn_value.as_bytes().to_vec(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The first extension with `oid`, if any.
    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<ExtensionParam> {
        self.extensions().into_iter().find(|ext| ext.oid == *oid)
    }

    /// The `extnValue` OCTET STRING of the extension, DER encoded.
    ///
    /// This is the form [`extensions::decode_extension_value`] expects.
    pub fn extension_value(&self, oid: &ObjectIdentifier) -> Result<Option<Vec<u8>>> {
        self.extension(oid)
            .map(|ext| Ok(OctetString::new(ext.value)?.to_der()?))
            .transpose()
    }

    /// Creates a new self-signed CA certificate.
    ///
    /// The certificate carries critical basic constraints (CA), critical key
    /// usage `keyCertSign | cRLSign` and a subject key identifier.
    pub fn new_self_signed(
        subject: &DistinguishedName,
        key: &KeyPair,
        validity: &Validity,
        serial_number: u64,
        algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        algorithm.ensure_compatible(key)?;

        let spki = key.as_spki()?;
        let key_id = KeyIdDigest::Sha1.key_identifier(&spki.to_der()?)?;
        let key_usage: FlagSet<KeyUsages> = KeyUsages::KeyCertSign | KeyUsages::CRLSign;

        let extensions = vec![
            ExtensionParam::from_extension(
                &BasicConstraints {
                    is_ca: true,
                    max_path_length: None,
                },
                true,
            )?,
            ExtensionParam::from_extension(&KeyUsage(key_usage), true)?,
            ExtensionParam::from_extension(&SubjectKeyIdentifier(key_id), false)?,
        ];

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: algorithm,
            issuer: subject.as_x509_name()?,
            validity: validity.clone(),
            subject: subject.as_x509_name()?,
            subject_public_key_info: spki,
            extensions,
        };

        tbs_cert.sign(key)
    }
}

/// The result of one issuance: DER bytes, PEM bytes and the parsed certificate.
#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub der: Vec<u8>,
    pub pem: Vec<u8>,
    pub certificate: Certificate,
}

impl SignedCertificate {
    /// Re-parses `der` so that only structurally valid certificates are returned.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let certificate = Certificate::from_der(&der)?;
        let pem = pem_utils::pem_encode(pem_utils::CERTIFICATE_LABEL, &der);
        Ok(Self {
            der,
            pem,
            certificate,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}
