//! Configuration surface consumed by the PKI utility.
//!
//! Values can be built in code or loaded from a TOML document:
//!
//! ```toml
//! crl_work_dir = "/var/lib/entcert/crl"
//! signature_algorithm = "SHA256withRSA"
//! crl_backend = "index-file"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// CRL generation paths selectable through configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrlBackend {
    /// Write the revocation index file for an external signer; no CRL bytes are returned.
    #[default]
    IndexFile,
    /// Build and sign the CRL in process.
    Native,
}

/// Settings for certificate and CRL issuance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Base directory for CRL work. Created when the utility is constructed.
    pub crl_work_dir: PathBuf,
    /// Signature algorithm name, e.g. `SHA256withRSA`. Resolved on every issuance.
    pub signature_algorithm: String,
    /// Digest used for authority and subject key identifiers.
    pub key_id_digest: String,
    pub crl_backend: CrlBackend,
    /// PEM label used when framing CRLs.
    pub crl_pem_label: String,
    pub crl_next_update_hours: i64,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            crl_work_dir: std::env::temp_dir().join("entcert-crl"),
            signature_algorithm: "SHA256withRSA".to_string(),
            key_id_digest: "SHA1".to_string(),
            crl_backend: CrlBackend::IndexFile,
            // Label carried over unchanged; RFC 7468 names this "X509 CRL".
            crl_pem_label: "THINGY".to_string(),
            crl_next_update_hours: 24,
        }
    }
}

impl PkiConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_crl_work_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.crl_work_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_signature_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.signature_algorithm = algorithm.into();
        self
    }

    pub fn with_key_id_digest(mut self, digest: impl Into<String>) -> Self {
        self.key_id_digest = digest.into();
        self
    }

    pub fn with_crl_backend(mut self, backend: CrlBackend) -> Self {
        self.crl_backend = backend;
        self
    }

    pub fn with_crl_pem_label(mut self, label: impl Into<String>) -> Self {
        self.crl_pem_label = label.into();
        self
    }
}
