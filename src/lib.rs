//! # entcert - Entitlement Certificates and CRLs in Pure Rust
//!
//! entcert issues X.509v3 entitlement certificates that carry subscription
//! facts (product, quantity, validity window, content access) as vendor
//! extensions, so an offline client can check what it is entitled to
//! without asking the server. It also produces certificate revocation lists.
//! Everything is built on the RustCrypto libraries.
//!
//! ## Supported Key Types
//!
//! - **RSA**: CA keys signing with `SHA1withRSA` or `SHA256withRSA`
//! - **ECDSA**: P-256 CA keys signing with `SHA256withECDSA`
//!
//! ## Key Features
//!
//! - **Vendor OID namespace**: semantic keys resolved to dotted OIDs via [`oid::OidTable`]
//! - **Extension builder**: consumers, subscriptions, entitlements, products and content
//!   rendered as text extensions
//! - **Fixed extension layout**: Netscape cert type, key usage, AKI, SKI and EKU in a
//!   stable order ahead of caller extensions
//! - **CRLs**: an OpenSSL index file for an external signer, or an in-process v2 CRL
//! - **PEM**: CRLF framed output for certificates, RSA keys and CRLs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use entcert::{
//!     cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm},
//!     cert::params::{CertificateRequest, DistinguishedName, Validity},
//!     config::PkiConfig,
//!     extension_builder::X509ExtensionBuilder,
//!     key::KeyPair,
//!     model::Consumer,
//!     oid::OidTable,
//!     pki::{PkiUtility, X509PkiUtility},
//! };
//!
//! # fn main() -> Result<(), entcert::error::PkiError> {
//! // Bootstrap a CA
//! let ca_key = KeyPair::generate_rsa(2048)?;
//! let ca_cert = Certificate::new_self_signed(
//!     &DistinguishedName::parse("CN=Entitlement CA,O=Example"),
//!     &ca_key,
//!     &Validity::for_days(3650),
//!     1,
//!     SignatureAlgorithm::Sha256WithRSA,
//! )?;
//! let issuer = Arc::new(CertificateWithPrivateKey { cert: ca_cert, key: ca_key });
//! let pki = X509PkiUtility::new(PkiConfig::default(), issuer)?;
//!
//! // Translate domain facts into extensions
//! let oids = OidTable::default();
//! let builder = X509ExtensionBuilder::new(&oids);
//! let consumer = Consumer::builder().uuid("5f1c2ad0-4c2f-4d4e-9a0b-3c3f6c1d2e7a").build();
//!
//! let consumer_key = KeyPair::generate_rsa(2048)?;
//! let request = CertificateRequest::builder()
//!     .subject(format!("CN={}", consumer.uuid))
//!     .validity(Validity::for_days(365))
//!     .subject_public_key(consumer_key.public_key())
//!     .serial_number(1001)
//!     .extensions(builder.consumer_extensions(&consumer))
//!     .build();
//!
//! let signed = pki.issue_certificate(&request)?;
//! println!("{}", String::from_utf8_lossy(&signed.pem));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::PkiError`]:
//!
//! ```rust
//! use entcert::{cert::SignatureAlgorithm, error::PkiError};
//!
//! match "MD5withRSA".parse::<SignatureAlgorithm>() {
//!     Ok(alg) => println!("Using {alg}"),
//!     Err(PkiError::UnsupportedAlgorithm(name)) => println!("Unsupported: {name}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`oid`]: Vendor OID namespace table
//! - [`model`]: Input records describing consumers, subscriptions and products
//! - [`extension_builder`]: Domain facts to extension wrappers
//! - [`key`]: Key generation, import and signing
//! - [`cert`]: Certificates, extensions and the DN codec
//! - [`issuer`]: CA material and the issuance algorithm
//! - [`crl`]: Revocation index files and native CRLs
//! - [`pki`]: The capability set exposed to callers
//! - [`pem_utils`]: PEM framing
//! - [`config`]: Configuration loaded from TOML
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure assembly

pub mod cert;
pub mod config;
pub mod crl;
pub mod error;
pub mod extension_builder;
pub mod issuer;
pub mod key;
pub mod model;
pub mod oid;
pub mod pem_utils;
pub mod pki;
pub mod tbs_certificate;
