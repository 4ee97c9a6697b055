#![allow(dead_code)]

use std::sync::Arc;

use der::Encode;
use entcert::cert::params::{DistinguishedName, Validity};
use entcert::cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm};
use entcert::config::PkiConfig;
use entcert::key::{KeyPair, PublicKey};
use entcert::pki::X509PkiUtility;
use rsa::signature::Verifier;
use time::{Duration, OffsetDateTime};

pub const CA_DN: &str = "CN=entitlement-ca.local,O=Example,C=US";

fn ca_validity() -> Validity {
    let not_before = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    Validity::new(not_before, not_before + Duration::days(3650))
}

pub fn generate_rsa_ca() -> CertificateWithPrivateKey {
    // Small keys keep the suite fast; size is irrelevant to the encodings under test.
    let ca_key = KeyPair::generate_rsa(1024).unwrap();
    let cert = Certificate::new_self_signed(
        &DistinguishedName::parse(CA_DN),
        &ca_key,
        &ca_validity(),
        0x1234,
        SignatureAlgorithm::Sha256WithRSA,
    )
    .unwrap();
    CertificateWithPrivateKey { cert, key: ca_key }
}

pub fn generate_ec_ca() -> CertificateWithPrivateKey {
    let ca_key = KeyPair::generate_ecdsa_p256();
    let cert = Certificate::new_self_signed(
        &DistinguishedName::parse(CA_DN),
        &ca_key,
        &ca_validity(),
        0x1234,
        SignatureAlgorithm::Sha256WithECDSA,
    )
    .unwrap();
    CertificateWithPrivateKey { cert, key: ca_key }
}

/// A utility over an ECDSA CA with its work dir inside `base`.
pub fn ec_pki(base: &std::path::Path) -> (X509PkiUtility, Arc<CertificateWithPrivateKey>) {
    let ca = Arc::new(generate_ec_ca());
    let config = PkiConfig::default()
        .with_crl_work_dir(base)
        .with_signature_algorithm("SHA256withECDSA");
    (X509PkiUtility::new(config, ca.clone()).unwrap(), ca)
}

/// Verifies `signature` over `data` with the CA's public key.
pub fn verify(ca: &CertificateWithPrivateKey, algorithm: SignatureAlgorithm, data: &[u8], signature: &[u8]) {
    match (ca.key.public_key(), algorithm) {
        (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRSA) => {
            let verifier = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(public);
            let signature = rsa::pkcs1v15::Signature::try_from(signature).unwrap();
            verifier.verify(data, &signature).unwrap();
        }
        (PublicKey::Rsa(public), SignatureAlgorithm::Sha1WithRSA) => {
            let verifier = rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(public);
            let signature = rsa::pkcs1v15::Signature::try_from(signature).unwrap();
            verifier.verify(data, &signature).unwrap();
        }
        (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithECDSA) => {
            let signature = p256::ecdsa::Signature::from_der(signature).unwrap();
            verifying_key.verify(data, &signature).unwrap();
        }
        (_, algorithm) => panic!("{algorithm} does not match the CA key"),
    }
}

/// Verifies a certificate's signature against the CA that issued it.
pub fn verify_certificate(ca: &CertificateWithPrivateKey, cert: &Certificate, algorithm: SignatureAlgorithm) {
    let tbs = cert.inner.tbs_certificate.to_der().unwrap();
    verify(ca, algorithm, &tbs, cert.inner.signature.raw_bytes());
}

/// Strips PEM armour and CRLFs, returning the decoded body.
pub fn pem_body(pem: &[u8]) -> Vec<u8> {
    use base64::Engine;

    let text = std::str::from_utf8(pem).unwrap();
    let body: String = text
        .split("\r\n")
        .filter(|line| !line.starts_with("-----") && !line.is_empty())
        .collect();
    base64::engine::general_purpose::STANDARD.decode(body).unwrap()
}
