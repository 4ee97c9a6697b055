use std::fmt;
use std::str::FromStr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Encode;
use der::{Tag, Tagged};
use der::asn1::{OctetString, Utf8StringRef};
use time::Duration;
use time::OffsetDateTime;
use tracing::warn;
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
use crate::error::{PkiError, Result};
use crate::key::PublicKey;

/// Parameters for issuing one entitlement certificate.
///
/// # Fields
/// * `subject` - The subject DN string, e.g. `CN=<consumer uuid>`.
/// * `validity` - The `notBefore`/`notAfter` window.
/// * `subject_public_key` - The requesting consumer's public key.
/// * `serial_number` - Caller supplied, unique per CA. Limited to 64 bits; the
///   encoding adds a leading zero byte when the high bit is set.
/// * `alt_name` - Optional alternate name, emitted as `CN=<alt_name>`.
/// * `extensions` - Caller supplied extensions, emitted first, in order.
/// * `byte_extensions` - Caller supplied extensions, emitted after `extensions`, in order.
#[derive(Clone, Debug, Builder)]
pub struct CertificateRequest {
    #[builder(into)]
    pub subject: String,
    pub validity: Validity,
    pub subject_public_key: PublicKey,
    pub serial_number: u64,
    #[builder(into)]
    pub alt_name: Option<String>,
    #[builder(default)]
    pub extensions: Vec<ExtensionWrapper>,
    #[builder(default)]
    pub byte_extensions: Vec<ExtensionWrapper>,
}

/// RDN attribute types recognised by the DN codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DnAttribute {
    CommonName,
    OrganizationalUnit,
    Organization,
    Country,
    Locality,
    State,
}

impl DnAttribute {
    /// The label written when rendering a DN.
    pub fn label(&self) -> &'static str {
        match self {
            DnAttribute::CommonName => "CN",
            DnAttribute::OrganizationalUnit => "OU",
            DnAttribute::Organization => "O",
            DnAttribute::Country => "C",
            DnAttribute::Locality => "L",
            DnAttribute::State => "ST",
        }
    }

    /// Matches an RDN type code case-insensitively. `ST` is accepted as well as `S`.
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "CN" => Some(DnAttribute::CommonName),
            "OU" => Some(DnAttribute::OrganizationalUnit),
            "O" => Some(DnAttribute::Organization),
            "C" => Some(DnAttribute::Country),
            "L" => Some(DnAttribute::Locality),
            "S" | "ST" => Some(DnAttribute::State),
            _ => None,
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DnAttribute::CommonName => ObjectIdentifier::new_unwrap("2.5.4.3"),
            DnAttribute::OrganizationalUnit => ObjectIdentifier::new_unwrap("2.5.4.11"),
            DnAttribute::Organization => ObjectIdentifier::new_unwrap("2.5.4.10"),
            DnAttribute::Country => ObjectIdentifier::new_unwrap("2.5.4.6"),
            DnAttribute::Locality => ObjectIdentifier::new_unwrap("2.5.4.7"),
            DnAttribute::State => ObjectIdentifier::new_unwrap("2.5.4.8"),
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            DnAttribute::CommonName,
            DnAttribute::OrganizationalUnit,
            DnAttribute::Organization,
            DnAttribute::Country,
            DnAttribute::Locality,
            DnAttribute::State,
        ]
        .into_iter()
        .find(|attr| attr.oid() == *oid)
    }
}

/// A distinguished name as an ordered list of recognised components.
///
/// Components are kept in the order they appear in the string form
/// (most specific first, as in `CN=foo,O=bar,C=US`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    components: Vec<(DnAttribute, String)>,
}

impl DistinguishedName {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component.
    pub fn with(mut self, attribute: DnAttribute, value: impl Into<String>) -> Self {
        self.components.push((attribute, value.into()));
        self
    }

    /// Parses a DN string leniently.
    ///
    /// RDNs are separated by `,` or `;`, multi-valued RDNs by `+`. Values may
    /// be quoted or backslash-escaped. Unrecognised attribute types and
    /// malformed RDNs are skipped, never reported as errors.
    pub fn parse(dn: &str) -> Self {
        let mut components = Vec::new();

        for rdn in split_unescaped(dn, &[',', ';']) {
            for atv in split_unescaped(&rdn, &['+']) {
                if atv.trim().is_empty() {
                    continue;
                }
                let Some((code, raw_value)) = atv.split_once('=') else {
                    warn!("Skipping malformed RDN '{}' in DN '{}'", atv.trim(), dn);
                    continue;
                };
                match DnAttribute::from_type_code(code) {
                    Some(attribute) => components.push((attribute, unescape_value(raw_value))),
                    None => warn!("Skipping unrecognised RDN type '{}' in DN '{}'", code.trim(), dn),
                }
            }
        }

        Self { components }
    }

    pub fn components(&self) -> &[(DnAttribute, String)] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All values recorded for `attribute`, in encounter order.
    pub fn values(&self, attribute: DnAttribute) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(attr, _)| *attr == attribute)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn common_name(&self) -> Option<&str> {
        self.values(DnAttribute::CommonName).first().copied()
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// # Returns
    /// An `x509_cert::name::DistinguishedName` object.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        if self.components.is_empty() {
            return Ok(RdnSequence(Vec::new()));
        }
        RdnSequence::from_str(&self.to_string())
            .map_err(|e| PkiError::EncodingError(format!("DN '{self}': {e}")))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes of other types are dropped, matching [`DistinguishedName::parse`].
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut components = Vec::new();

        // DER order is least specific first; the string form is the reverse.
        for rdn in x509dn.0.iter().rev() {
            for attr in rdn.0.iter() {
                let Some(attribute) = DnAttribute::from_oid(&attr.oid) else {
                    continue;
                };
                match attr.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
                        let value = String::from_utf8_lossy(attr.value.value()).into_owned();
                        components.push((attribute, value));
                    }
                    other => warn!("Skipping {} component with {:?} value", attribute.label(), other),
                }
            }
        }

        Self { components }
    }
}

impl FromStr for DistinguishedName {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attribute, value)) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", attribute.label(), escape_value(value))?;
        }
        Ok(())
    }
}

fn split_unescaped(input: &str, separators: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == '"' {
            current.push(c);
            quoted = !quoted;
        } else if !quoted && separators.contains(&c) {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn unescape_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return trimmed[1..trimmed.len() - 1].replace("\\\"", "\"");
    }

    let mut out = Vec::with_capacity(trimmed.len());
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok());
            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(bytes[i + 1]);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && (c == '#' || c == ' ');
        let trailing = i == last && c == ' ';
        if leading || trailing || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
/// Both bounds are encoded with one second precision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }
}

/// Value carried by an [`ExtensionWrapper`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtensionValue {
    /// Encoded as a DER `UTF8String`.
    Text(String),
    /// Encoded as a DER `OCTET STRING` wrapping the raw bytes.
    Bytes(Vec<u8>),
}

/// A caller-supplied extension: OID, criticality and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionWrapper {
    oid: String,
    critical: bool,
    value: ExtensionValue,
}

impl ExtensionWrapper {
    pub fn new(oid: impl Into<String>, critical: bool, value: ExtensionValue) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value,
        }
    }

    /// A non-critical text extension.
    pub fn text(oid: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(oid, false, ExtensionValue::Text(value.into()))
    }

    /// A non-critical byte extension.
    pub fn bytes(oid: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(oid, false, ExtensionValue::Bytes(value.into()))
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn value(&self) -> &ExtensionValue {
        &self.value
    }

    /// The text value, if this is a text extension.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ExtensionValue::Text(text) => Some(text),
            ExtensionValue::Bytes(_) => None,
        }
    }

    /// Encodes the wrapper into the form placed in the certificate.
    pub fn to_extension_param(&self) -> Result<ExtensionParam> {
        let oid = crate::oid::validate_oid(&self.oid)?;
        let value = match &self.value {
            ExtensionValue::Text(text) => Utf8StringRef::new(text)?.to_der()?,
            ExtensionValue::Bytes(bytes) => OctetString::new(bytes.as_slice())?.to_der()?,
        };
        Ok(ExtensionParam {
            oid,
            critical: self.critical,
            value,
        })
    }
}

/// Represents an encoded X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The bytes placed inside the `extnValue` OCTET STRING.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}
