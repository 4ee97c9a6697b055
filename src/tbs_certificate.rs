use std::time::SystemTime;

use der::asn1::{BitString, GeneralizedTime, OctetString, UtcTime};
use der::Encode;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::Time;

use crate::cert::extensions::u64_to_bytes;
use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::Result;
use crate::key::KeyPair;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 v3 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, already in DER order.
/// * `validity` - The certificate's validity period.
/// * `subject` - The subject name, already in DER order.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - Extensions in the order they are emitted.
pub struct TbsCertificate {
    pub serial_number: u64,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: to_serial_number(self.serial_number)?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }

    /// Signs the TBS structure with `key` and assembles the certificate.
    pub fn sign(&self, key: &KeyPair) -> Result<Certificate> {
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = key.sign_data(self.signature_algorithm, &tbs_certificate.to_der()?)?;
        let signature_algorithm: AlgorithmIdentifierOwned = self.signature_algorithm.into();

        Ok(Certificate {
            inner: CertificateInner {
                tbs_certificate,
                signature_algorithm,
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }
}

pub(crate) fn to_x509_extension(ext: &ExtensionParam) -> Result<x509_cert::ext::Extension> {
    Ok(x509_cert::ext::Extension {
        extn_id: ext.oid,
        critical: ext.critical,
        extn_value: OctetString::new(ext.value.clone())?,
    })
}

/// Serial numbers are positive INTEGERs in their minimal encoding.
pub(crate) fn to_serial_number(serial: u64) -> Result<SerialNumber> {
    let mut bytes = u64_to_bytes(serial);
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    Ok(SerialNumber::new(&bytes)?)
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5280 4.1.2.5).
pub(crate) fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let system_time = SystemTime::from(at);
    if at.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_system_time(system_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_system_time(
            system_time,
        )?))
    }
}

pub(crate) fn from_x509_time(time: &Time) -> OffsetDateTime {
    OffsetDateTime::from(time.to_system_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Decode;

    #[test]
    fn test_serial_number_is_positive_and_minimal() {
        assert_eq!(to_serial_number(1).unwrap().as_bytes(), &[0x01]);
        assert_eq!(to_serial_number(0x80).unwrap().as_bytes(), &[0x00, 0x80]);
        assert_eq!(
            to_serial_number(0x0102_0304).unwrap().as_bytes(),
            &[0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_time_switches_encoding_in_2050() {
        let before = OffsetDateTime::from_unix_timestamp(2_524_607_999).unwrap();
        let after = OffsetDateTime::from_unix_timestamp(2_524_608_000).unwrap();
        assert!(matches!(to_x509_time(before).unwrap(), Time::UtcTime(_)));
        assert!(matches!(to_x509_time(after).unwrap(), Time::GeneralTime(_)));
        assert_eq!(from_x509_time(&to_x509_time(after).unwrap()), after);
    }

    #[test]
    fn test_omits_empty_extensions() {
        let key = KeyPair::generate_ecdsa_p256();
        let name = crate::cert::params::DistinguishedName::parse("CN=empty")
            .as_x509_name()
            .unwrap();
        let tbs = TbsCertificate {
            serial_number: 7,
            signature_algorithm: SignatureAlgorithm::Sha256WithECDSA,
            issuer: name.clone(),
            validity: Validity::for_days(1),
            subject: name,
            subject_public_key_info: key.as_spki().unwrap(),
            extensions: Vec::new(),
        };
        let inner: TbsCertificateInner = TbsCertificateInner::from_der(&tbs.to_der().unwrap()).unwrap();
        assert!(inner.extensions.is_none());
        assert_eq!(inner.version, Version::V3);
    }
}
