//! Certificate revocation lists.
//!
//! Two paths produce revocation data. The index-file path writes an
//! OpenSSL-style `certindex` into a private temporary directory and hands it
//! to an optional [`ExternalCrlSigner`]; the directory is removed when the
//! call returns, whatever the outcome. The native path builds and signs a v2
//! CRL in process.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bon::Builder;
use der::Encode;
use der::asn1::BitString;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::CrlReason;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{CrlNumber, KeyIdDigest};
use crate::cert::params::ExtensionParam;
use crate::error::Result;
use crate::issuer::Issuer;
use crate::tbs_certificate::{to_serial_number, to_x509_extension, to_x509_time};

/// Name of the index file inside a CRL work directory.
pub const INDEX_FILENAME: &str = "certindex";

/// Prefix of every CRL work directory created under the base directory.
pub const WORK_DIR_PREFIX: &str = "CRL";

/// One revoked certificate.
#[derive(Clone, Debug, Builder)]
pub struct CrlEntry {
    /// Serial of the revoked certificate; limited to 64 bits like issued serials.
    pub serial_number: u64,
    pub revocation_date: OffsetDateTime,
    /// Subject DN of the revoked certificate, as written to the index file.
    #[builder(into)]
    pub subject: String,
    #[builder(default = CrlReason::PrivilegeWithdrawn)]
    pub reason: CrlReason,
}

/// Entries and number of one CRL generation.
///
/// The issuing CA is supplied separately through an [`Issuer`].
#[derive(Clone, Debug, Default)]
pub struct CrlRequest {
    pub entries: Vec<CrlEntry>,
    pub crl_number: u64,
}

impl CrlRequest {
    pub fn new(entries: Vec<CrlEntry>, crl_number: u64) -> Self {
        Self {
            entries,
            crl_number,
        }
    }
}

/// Formats the index line for `entry`.
///
/// The revocation time is written as Unix epoch seconds followed by `Z`.
/// Columns are separated by three spaces.
pub fn index_line(entry: &CrlEntry) -> String {
    format!(
        "R   {}Z   {}   {}",
        entry.revocation_date.unix_timestamp(),
        entry.serial_number,
        entry.subject
    )
}

/// Writes one [`index_line`] per entry to `path`, each ending in `\n`.
pub fn write_index_file(path: &Path, entries: &[CrlEntry]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(writer, "{}", index_line(entry))?;
    }
    writer.flush()?;
    Ok(())
}

/// A uniquely named directory for one CRL generation.
///
/// The directory and everything in it are deleted on drop.
#[derive(Debug)]
pub struct CrlWorkDir {
    dir: TempDir,
}

impl CrlWorkDir {
    /// Creates a fresh `CRL*` directory under `base`.
    pub fn create(base: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(base)?;
        debug!("Created CRL work dir {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join(INDEX_FILENAME)
    }

    /// Writes the index file for `entries` and returns its path.
    pub fn write_index(&self, entries: &[CrlEntry]) -> Result<PathBuf> {
        let path = self.index_path();
        write_index_file(&path, entries)?;
        debug!("Wrote {} CRL index entries to {}", entries.len(), path.display());
        Ok(path)
    }
}

impl Drop for CrlWorkDir {
    fn drop(&mut self) {
        debug!("Removing CRL work dir {}", self.dir.path().display());
    }
}

/// Turns a prepared index file into CRL bytes, e.g. by running `openssl ca -gencrl`.
///
/// Called while the work directory still exists. Returning `Ok(None)` means
/// no CRL was produced.
pub trait ExternalCrlSigner: Send + Sync {
    fn sign(&self, work_dir: &Path, index_file: &Path, crl_number: u64) -> Result<Option<Vec<u8>>>;
}

/// Runs the index-file path for `request` under `base_dir`.
///
/// Without a signer no CRL is produced and `Ok(None)` is returned once the
/// index has been written.
pub fn generate_with_index_file(
    base_dir: &Path,
    request: &CrlRequest,
    signer: Option<&dyn ExternalCrlSigner>,
) -> Result<Option<Vec<u8>>> {
    let work_dir = CrlWorkDir::create(base_dir)?;
    let index = work_dir.write_index(&request.entries)?;

    let Some(signer) = signer else {
        warn!(
            "No external CRL signer configured; CRL {} not produced",
            request.crl_number
        );
        return Ok(None);
    };

    let crl = signer.sign(work_dir.path(), &index, request.crl_number)?;
    info!(
        "External signer finished CRL {} ({} entries)",
        request.crl_number,
        request.entries.len()
    );
    Ok(crl)
}

/// Builds and signs a v2 CRL, returning its DER encoding.
///
/// The issuer name is the CA certificate's issuer. Each entry carries a
/// reason code; the list carries the authority key identifier and CRL number.
pub fn build_signed_crl(
    issuer: &dyn Issuer,
    request: &CrlRequest,
    algorithm: SignatureAlgorithm,
    digest: KeyIdDigest,
    this_update: OffsetDateTime,
    next_update: OffsetDateTime,
) -> Result<Vec<u8>> {
    let ca_key = issuer.signing_key()?;
    algorithm.ensure_compatible(ca_key)?;
    let ca = issuer.ca_certificate()?;

    let revoked = request
        .entries
        .iter()
        .map(|entry| {
            let reason = ExtensionParam::from_extension(&entry.reason, false)?;
            Ok(RevokedCert {
                serial_number: to_serial_number(entry.serial_number)?,
                revocation_date: to_x509_time(entry.revocation_date)?,
                crl_entry_extensions: Some(vec![to_x509_extension(&reason)?]),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let crl_extensions = vec![
        to_x509_extension(&ExtensionParam::from_extension(
            &issuer.authority_key_identifier(digest)?,
            false,
        )?)?,
        to_x509_extension(&ExtensionParam::from_extension(
            &CrlNumber(request.crl_number),
            false,
        )?)?,
    ];

    let signature_algorithm: AlgorithmIdentifierOwned = algorithm.into();
    let tbs_cert_list = TbsCertList {
        version: x509_cert::Version::V2,
        signature: signature_algorithm.clone(),
        issuer: ca.inner.tbs_certificate.issuer.clone(),
        this_update: to_x509_time(this_update)?,
        next_update: Some(to_x509_time(next_update)?),
        revoked_certificates: (!revoked.is_empty()).then_some(revoked),
        crl_extensions: Some(crl_extensions),
    };

    let signature = ca_key.sign_data(algorithm, &tbs_cert_list.to_der()?)?;
    let crl = CertificateList {
        tbs_cert_list,
        signature_algorithm,
        signature: BitString::from_bytes(&signature)?,
    };

    info!(
        "Signed CRL {} with {} entries",
        request.crl_number,
        request.entries.len()
    );
    Ok(crl.to_der()?)
}

/// [`build_signed_crl`] with `thisUpdate` now and `nextUpdate` after `validity_hours`.
pub fn build_signed_crl_now(
    issuer: &dyn Issuer,
    request: &CrlRequest,
    algorithm: SignatureAlgorithm,
    digest: KeyIdDigest,
    validity_hours: i64,
) -> Result<Vec<u8>> {
    let now = OffsetDateTime::now_utc();
    build_signed_crl(
        issuer,
        request,
        algorithm,
        digest,
        now,
        now + Duration::hours(validity_hours),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(serial: u64, secs: i64, subject: &str) -> CrlEntry {
        CrlEntry::builder()
            .serial_number(serial)
            .revocation_date(OffsetDateTime::from_unix_timestamp(secs).unwrap())
            .subject(subject)
            .build()
    }

    #[test]
    fn test_index_line_format() {
        let line = index_line(&entry(123, 1_300_000_000, "CN=consumer"));
        assert_eq!(line, "R   1300000000Z   123   CN=consumer");
    }

    #[test]
    fn test_default_reason_is_privilege_withdrawn() {
        assert_eq!(entry(1, 0, "CN=x").reason, CrlReason::PrivilegeWithdrawn);
    }

    #[test]
    fn test_work_dir_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let work_dir = CrlWorkDir::create(base.path()).unwrap();
        let path = work_dir.path().to_path_buf();
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(WORK_DIR_PREFIX)
        );

        let index = work_dir
            .write_index(&[entry(1, 10, "CN=a"), entry(2, 20, "CN=b")])
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&index).unwrap(),
            "R   10Z   1   CN=a\nR   20Z   2   CN=b\n"
        );

        drop(work_dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_entry_list_writes_empty_index() {
        let base = tempfile::tempdir().unwrap();
        let work_dir = CrlWorkDir::create(base.path()).unwrap();
        let index = work_dir.write_index(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(index).unwrap(), "");
    }

    #[test]
    fn test_missing_base_dir_is_io_failure() {
        let base = tempfile::tempdir().unwrap();
        let missing = base.path().join("nope");
        let err = CrlWorkDir::create(&missing).unwrap_err();
        assert!(matches!(err, crate::error::PkiError::IoFailure(_)));
    }
}
