//! Error type shared by every module of the crate.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PkiError>;

/// Represents errors that can occur while issuing certificates and CRLs.
///
/// Every failure reaches the caller as one of these kinds; no partial
/// certificate or CRL is ever returned alongside an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkiError {
    /// The configured signature algorithm is unknown or does not match the CA key.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Error while building or encoding an ASN.1 structure.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error while decoding PEM or DER input.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// A required digest implementation is not available.
    #[error("Crypto provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Filesystem or external process failure.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A namespace or field key is absent from the OID table.
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error related to key material.
    #[error("Key error: {0}")]
    KeyError(String),

    /// The signing operation itself failed.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::EncodingError(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for PkiError {
    fn from(err: x509_cert::spki::Error) -> Self {
        PkiError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::KeyError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::KeyError(err.to_string())
    }
}

impl From<pkcs8::Error> for PkiError {
    fn from(err: pkcs8::Error) -> Self {
        PkiError::KeyError(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for PkiError {
    fn from(err: std::io::Error) -> Self {
        PkiError::IoFailure(err.to_string())
    }
}

impl From<toml::de::Error> for PkiError {
    fn from(err: toml::de::Error) -> Self {
        PkiError::ConfigError(err.to_string())
    }
}
