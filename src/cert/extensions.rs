use std::fmt;
use std::str::FromStr;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode, Tag, Tagged,
    asn1::{AnyRef, BitString, ObjectIdentifier as DerOid, OctetString, Uint},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::ext::pkix::CrlReason;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PkiError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use entcert::cert::extensions::{SubjectKeyIdentifier, ToAndFromX509Extension};
/// let ski = SubjectKeyIdentifier(vec![1, 2, 3]);
/// let encoded = ski.to_x509_extension_value().unwrap();
/// let decoded = SubjectKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(ski, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Encodes `byte` as a named bit list, dropping trailing zero bits as DER requires.
fn named_bits(byte: u8) -> Result<BitString> {
    if byte == 0 {
        return Ok(BitString::new(0, Vec::new())?);
    }
    Ok(BitString::new(byte.trailing_zeros() as u8, vec![byte])?)
}

/// The Netscape certificate type extension.
///
/// Issued entitlement certificates always carry `sslClient | smime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetscapeCertType(pub u8);

impl NetscapeCertType {
    pub const SSL_CLIENT: u8 = 0x80;
    pub const SSL_SERVER: u8 = 0x40;
    pub const SMIME: u8 = 0x20;
    pub const OBJECT_SIGNING: u8 = 0x10;
}

impl ToAndFromX509Extension for NetscapeCertType {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.1");

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(named_bits(self.0)?.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let bits = BitString::from_der(extension)?;
        Ok(Self(bits.raw_bytes().first().copied().unwrap_or(0)))
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };
        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                other => Err(PkiError::InvalidInput(format!(
                    "Unsupported extended key usage option {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    EmailProtection,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
        }
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Encoded as a SEQUENCE of exactly three context tagged fields, in order:
/// `[0]` key identifier, `[1]` issuer general names, `[2]` issuer serial.
///
/// # Fields
/// * `key_identifier` - Digest of the CA public key bit string.
/// * `authority_cert_issuer` - The issuer name of the CA certificate.
/// * `authority_cert_serial_number` - The CA certificate serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    pub authority_cert_issuer: Name,
    pub authority_cert_serial_number: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        use x509_cert::ext::pkix::name::GeneralName;

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: Some(vec![GeneralName::DirectoryName(
                self.authority_cert_issuer.clone(),
            )]),
            authority_cert_serial_number: Some(x509_cert::serial_number::SerialNumber::new(
                self.authority_cert_serial_number.as_slice(),
            )?),
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        use x509_cert::ext::pkix::name::GeneralName;

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let missing = |field: &str| PkiError::DecodingError(format!("AKI without {field}"));

        let authority_cert_issuer = aki
            .authority_cert_issuer
            .as_ref()
            .and_then(|names| {
                names.iter().find_map(|name| match name {
                    GeneralName::DirectoryName(dn) => Some(dn.clone()),
                    _ => None,
                })
            })
            .ok_or_else(|| missing("directory name"))?;

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .ok_or_else(|| missing("key identifier"))?,
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec())
                .ok_or_else(|| missing("serial number"))?,
        })
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(OctetString::new(self.0.as_slice())?.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        Ok(Self(OctetString::from_der(extension)?.as_bytes().to_vec()))
    }
}

/// The CRL number extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlNumber(pub u64);

impl ToAndFromX509Extension for CrlNumber {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::CrlNumber::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let number = x509_cert::ext::pkix::CrlNumber(Uint::new(&u64_to_bytes(self.0))?);
        Ok(number.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let number = x509_cert::ext::pkix::CrlNumber::from_der(extension)?;
        Ok(Self(bytes_to_u64(number.0.as_bytes())?))
    }
}

/// The reason code carried by a CRL entry.
impl ToAndFromX509Extension for CrlReason {
    const OID: ObjectIdentifier = <CrlReason as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(self.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        Ok(CrlReason::from_der(extension)?)
    }
}

/// Minimal big-endian bytes of `value`, at least one octet long.
pub(crate) fn u64_to_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Interprets big-endian unsigned integer bytes, ignoring leading zeroes.
pub(crate) fn bytes_to_u64(bytes: &[u8]) -> Result<u64> {
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(PkiError::DecodingError(format!(
            "integer of {} bytes does not fit in 64 bits",
            significant.len()
        )));
    }
    Ok(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Digest used to derive key identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIdDigest {
    Sha1,
    Sha256,
}

impl KeyIdDigest {
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            KeyIdDigest::Sha1 => Sha1::digest(data).to_vec(),
            KeyIdDigest::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    /// Key identifier of a DER encoded SubjectPublicKeyInfo.
    ///
    /// The SPKI SEQUENCE is parsed and its second element, the public key
    /// BIT STRING, is hashed without the unused-bits octet.
    pub fn key_identifier(&self, spki_der: &[u8]) -> Result<Vec<u8>> {
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der)?;
        Ok(self.digest(spki.subject_public_key.raw_bytes()))
    }
}

impl FromStr for KeyIdDigest {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(KeyIdDigest::Sha1),
            "SHA256" => Ok(KeyIdDigest::Sha256),
            _ => Err(PkiError::ProviderUnavailable(format!("no digest named '{s}'"))),
        }
    }
}

impl fmt::Display for KeyIdDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIdDigest::Sha1 => f.write_str("SHA1"),
            KeyIdDigest::Sha256 => f.write_str("SHA256"),
        }
    }
}

/// Renders the textual form of an extension value as read from a certificate.
///
/// `value` is the DER `OCTET STRING` wrapping the extension payload. One level
/// of octet-string framing is removed and the inner ASN.1 value is rendered:
/// strings as their text, integers in decimal, OIDs dotted, booleans as
/// `TRUE`/`FALSE`, octet strings as `#` plus hex, anything else as `#` plus
/// the hex of its encoding. Malformed input is an error.
pub fn decode_extension_value(value: &[u8]) -> Result<String> {
    let outer = OctetString::from_der(value)?;
    let inner = AnyRef::from_der(outer.as_bytes())?;

    let text = match inner.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::VisibleString
        | Tag::TeletexString => String::from_utf8(inner.value().to_vec())
            .map_err(|e| PkiError::DecodingError(e.to_string()))?,
        Tag::Integer => render_integer(inner.value()),
        Tag::ObjectIdentifier => DerOid::from_bytes(inner.value())
            .map_err(|e| PkiError::DecodingError(e.to_string()))?
            .to_string(),
        Tag::Boolean => match inner.value() {
            [0x00] => "FALSE".to_string(),
            [_] => "TRUE".to_string(),
            _ => return Err(PkiError::DecodingError("malformed BOOLEAN".to_string())),
        },
        Tag::Null => "NULL".to_string(),
        Tag::OctetString => format!("#{}", hex::encode(inner.value())),
        _ => format!("#{}", hex::encode(outer.as_bytes())),
    };
    Ok(text)
}

fn render_integer(bytes: &[u8]) -> String {
    if bytes.is_empty() || bytes.len() > 16 {
        return format!("#{}", hex::encode(bytes));
    }
    let negative = bytes[0] & 0x80 != 0;
    let initial: i128 = if negative { -1 } else { 0 };
    bytes
        .iter()
        .fold(initial, |acc, b| (acc << 8) | i128::from(*b))
        .to_string()
}
