mod util;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use der::{Decode, Encode};
use entcert::cert::SignatureAlgorithm;
use entcert::cert::extensions::{AuthorityKeyIdentifier, CrlNumber, ToAndFromX509Extension};
use entcert::config::{CrlBackend, PkiConfig};
use entcert::crl::{CrlEntry, ExternalCrlSigner, INDEX_FILENAME, WORK_DIR_PREFIX};
use entcert::error::{PkiError, Result};
use entcert::pki::{PkiUtility, X509PkiUtility};
use time::OffsetDateTime;
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::CrlReason;

fn entries() -> Vec<CrlEntry> {
    vec![
        CrlEntry::builder()
            .serial_number(1001)
            .revocation_date(OffsetDateTime::from_unix_timestamp(1_300_000_000).unwrap())
            .subject("CN=consumer-1")
            .build(),
        CrlEntry::builder()
            .serial_number(1002)
            .revocation_date(OffsetDateTime::from_unix_timestamp(1_300_000_060).unwrap())
            .subject("CN=consumer-2,O=Example")
            .reason(CrlReason::KeyCompromise)
            .build(),
    ]
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// Records what it was handed and returns a canned CRL.
#[derive(Default)]
struct RecordingSigner {
    seen: Mutex<Vec<(PathBuf, String)>>,
}

impl ExternalCrlSigner for RecordingSigner {
    fn sign(&self, work_dir: &Path, index_file: &Path, crl_number: u64) -> Result<Option<Vec<u8>>> {
        assert!(work_dir.is_dir());
        assert_eq!(index_file, work_dir.join(INDEX_FILENAME));
        let index = std::fs::read_to_string(index_file)?;
        self.seen
            .lock()
            .unwrap()
            .push((work_dir.to_path_buf(), index));
        Ok(Some(crl_number.to_be_bytes().to_vec()))
    }
}

struct FailingSigner {
    work_dir: Mutex<Option<PathBuf>>,
}

impl ExternalCrlSigner for FailingSigner {
    fn sign(&self, work_dir: &Path, _index_file: &Path, _crl_number: u64) -> Result<Option<Vec<u8>>> {
        *self.work_dir.lock().unwrap() = Some(work_dir.to_path_buf());
        Err(PkiError::IoFailure("openssl ca -gencrl exited with status 1".to_string()))
    }
}

#[test]
fn index_file_backend_returns_no_crl_by_default() {
    let base = tempfile::tempdir().unwrap();
    let (pki, _ca) = util::ec_pki(base.path());

    assert_eq!(pki.config().crl_backend, CrlBackend::IndexFile);
    assert_eq!(pki.issue_crl(&entries(), 1).unwrap(), None);
    assert!(dir_is_empty(base.path()));
}

#[test]
fn external_signer_receives_index_file() {
    let base = tempfile::tempdir().unwrap();
    let signer = Arc::new(RecordingSigner::default());
    let (pki, _ca) = util::ec_pki(base.path());
    let pki = pki.with_external_signer(signer.clone());

    let crl = pki.issue_crl(&entries(), 42).unwrap();
    assert_eq!(crl, Some(42u64.to_be_bytes().to_vec()));

    let seen = signer.seen.lock().unwrap();
    let (work_dir, index) = &seen[0];
    assert_eq!(work_dir.parent().unwrap(), base.path());
    assert!(
        work_dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORK_DIR_PREFIX)
    );
    assert_eq!(
        index,
        "R   1300000000Z   1001   CN=consumer-1\nR   1300000060Z   1002   CN=consumer-2,O=Example\n"
    );
    assert!(!work_dir.exists());
}

#[test]
fn work_dir_removed_when_signer_fails() {
    let base = tempfile::tempdir().unwrap();
    let signer = Arc::new(FailingSigner {
        work_dir: Mutex::new(None),
    });
    let (pki, _ca) = util::ec_pki(base.path());
    let pki = pki.with_external_signer(signer.clone());

    let err = pki.issue_crl(&entries(), 3).unwrap_err();
    assert!(matches!(err, PkiError::IoFailure(_)));

    let work_dir = signer.work_dir.lock().unwrap().clone().unwrap();
    assert!(!work_dir.exists());
    assert!(dir_is_empty(base.path()));
}

#[test]
fn concurrent_index_generations_use_distinct_dirs() {
    let base = tempfile::tempdir().unwrap();
    let signer = Arc::new(RecordingSigner::default());
    let (pki, _ca) = util::ec_pki(base.path());
    let pki = pki.with_external_signer(signer.clone());

    std::thread::scope(|scope| {
        for number in 0..32u64 {
            let pki = &pki;
            scope.spawn(move || {
                assert!(pki.issue_crl(&entries(), number).unwrap().is_some());
            });
        }
    });

    let seen = signer.seen.lock().unwrap();
    let dirs: HashSet<&PathBuf> = seen.iter().map(|(dir, _)| dir).collect();
    assert_eq!(dirs.len(), 32);
    assert!(dir_is_empty(base.path()));
}

#[test]
fn native_backend_signs_v2_crl() {
    let base = tempfile::tempdir().unwrap();
    let ca = Arc::new(util::generate_ec_ca());
    let config = PkiConfig::default()
        .with_crl_work_dir(base.path())
        .with_signature_algorithm("SHA256withECDSA")
        .with_crl_backend(CrlBackend::Native);
    let pki = X509PkiUtility::new(config, ca.clone()).unwrap();

    let der = pki.issue_crl(&entries(), 0x80).unwrap().unwrap();
    let crl = CertificateList::from_der(&der).unwrap();
    let tbs = &crl.tbs_cert_list;

    assert_eq!(tbs.version, x509_cert::Version::V2);
    assert_eq!(tbs.issuer, ca.cert.inner.tbs_certificate.issuer);
    let this_update = tbs.this_update.to_unix_duration().as_secs();
    let next_update = tbs.next_update.as_ref().unwrap().to_unix_duration().as_secs();
    assert_eq!(next_update - this_update, 24 * 3600);

    let revoked = tbs.revoked_certificates.as_ref().unwrap();
    assert_eq!(revoked.len(), 2);
    assert_eq!(revoked[0].serial_number.as_bytes(), &[0x03, 0xe9]);
    assert_eq!(
        revoked[0].revocation_date.to_unix_duration().as_secs(),
        1_300_000_000
    );
    let reasons: Vec<CrlReason> = revoked
        .iter()
        .map(|entry| {
            let ext = &entry.crl_entry_extensions.as_ref().unwrap()[0];
            CrlReason::from_der(ext.extn_value.as_bytes()).unwrap()
        })
        .collect();
    assert_eq!(
        reasons,
        vec![CrlReason::PrivilegeWithdrawn, CrlReason::KeyCompromise]
    );

    let extensions = tbs.crl_extensions.as_ref().unwrap();
    assert_eq!(extensions[0].extn_id, AuthorityKeyIdentifier::OID);
    let aki = AuthorityKeyIdentifier::from_x509_extension_value(extensions[0].extn_value.as_bytes())
        .unwrap();
    assert_eq!(aki.authority_cert_serial_number, vec![0x12, 0x34]);
    assert_eq!(extensions[1].extn_id, CrlNumber::OID);
    assert_eq!(
        CrlNumber::from_x509_extension_value(extensions[1].extn_value.as_bytes()).unwrap(),
        CrlNumber(0x80)
    );

    util::verify(
        &ca,
        SignatureAlgorithm::Sha256WithECDSA,
        &tbs.to_der().unwrap(),
        crl.signature.raw_bytes(),
    );
    assert!(dir_is_empty(base.path()));
}

#[test]
fn native_backend_with_no_entries_omits_revoked_list() {
    let base = tempfile::tempdir().unwrap();
    let ca = Arc::new(util::generate_rsa_ca());
    let config = PkiConfig::default()
        .with_crl_work_dir(base.path())
        .with_crl_backend(CrlBackend::Native);
    let pki = X509PkiUtility::new(config, ca.clone()).unwrap();

    let der = pki.issue_crl(&[], 1).unwrap().unwrap();
    let crl = CertificateList::from_der(&der).unwrap();
    assert!(crl.tbs_cert_list.revoked_certificates.is_none());
    util::verify(
        &ca,
        SignatureAlgorithm::Sha256WithRSA,
        &crl.tbs_cert_list.to_der().unwrap(),
        crl.signature.raw_bytes(),
    );
}

#[test]
fn native_backend_rejects_mismatched_algorithm() {
    let base = tempfile::tempdir().unwrap();
    let ca = Arc::new(util::generate_ec_ca());
    let config = PkiConfig::default()
        .with_crl_work_dir(base.path())
        .with_crl_backend(CrlBackend::Native);
    let pki = X509PkiUtility::new(config, ca).unwrap();

    assert!(matches!(
        pki.issue_crl(&entries(), 1),
        Err(PkiError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn crl_pem_uses_placeholder_label() {
    let base = tempfile::tempdir().unwrap();
    let (pki, _ca) = util::ec_pki(base.path());
    let pem = pki.crl_pem(b"\x30\x00");
    let text = std::str::from_utf8(&pem).unwrap();
    assert!(text.starts_with("-----BEGIN THINGY-----\r\n"));
    assert!(text.ends_with("-----END THINGY-----\r\n"));
    assert_eq!(util::pem_body(&pem), b"\x30\x00");

    let config = PkiConfig::default()
        .with_crl_work_dir(base.path())
        .with_crl_pem_label("X509 CRL");
    let pki = X509PkiUtility::new(config, Arc::new(util::generate_ec_ca())).unwrap();
    assert!(
        String::from_utf8(pki.crl_pem(b"\x30\x00"))
            .unwrap()
            .starts_with("-----BEGIN X509 CRL-----\r\n")
    );
}
