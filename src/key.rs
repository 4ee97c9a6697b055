use der::{Decode, Encode};
use p256::ecdsa::{
    DerSignature as P256DerSignature, SigningKey as P256SigningKey,
    VerifyingKey as P256VerifyingKey,
};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
    pkcs1v15::SigningKey as RsaSigningKey,
    signature::{SignatureEncoding, Signer},
};
use sha1::Sha1;
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{PkiError, Result};

/// Supported key types for certificate operations.
#[derive(Clone, Debug)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(Self::from_rsa_private(private))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    fn from_rsa_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    /// Imports a private key from PEM.
    ///
    /// Accepts PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) framing.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        match block.tag() {
            "RSA PRIVATE KEY" => Ok(Self::from_rsa_private(RsaPrivateKey::from_pkcs1_der(
                block.contents(),
            )?)),
            "PRIVATE KEY" => Self::import_from_pkcs8_der(block.contents()),
            other => Err(PkiError::DecodingError(format!(
                "unsupported private key PEM label '{other}'"
            ))),
        }
    }

    /// Imports an RSA or P-256 private key from PKCS#8 DER.
    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(private) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(Self::from_rsa_private(private));
        }
        let signing_key = P256SigningKey::from_pkcs8_der(der)?;
        let verifying_key = signing_key.verifying_key().to_owned();
        Ok(KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        })
    }

    /// PKCS#1 DER of an RSA private key, the payload of an `RSA PRIVATE KEY` PEM block.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => Ok(private.to_pkcs1_der()?.as_bytes().to_vec()),
            KeyPair::EcdsaP256 { .. } => Err(PkiError::KeyError(
                "PKCS#1 encoding is only defined for RSA keys".to_string(),
            )),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
        }
    }

    /// SubjectPublicKeyInfo of the public half.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data` with the given algorithm.
    ///
    /// Fails with `UnsupportedAlgorithm` when the algorithm does not match the key type.
    pub fn sign_data(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        let signing_error = |e: rsa::signature::Error| PkiError::SigningError(e.to_string());
        match (self, algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha1WithRSA) => {
                let signing_key = RsaSigningKey::<Sha1>::new(private.as_ref().clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRSA) => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, SignatureAlgorithm::Sha256WithECDSA) => {
                let signature: P256DerSignature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_vec())
            }
            (_, algorithm) => Err(PkiError::UnsupportedAlgorithm(format!(
                "{algorithm} cannot be used with a {} key",
                self.key_type()
            ))),
        }
    }

    pub fn key_type(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } => "ECDSA P-256",
        }
    }
}

/// Public key of a certificate subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => SubjectPublicKeyInfoOwned::from_key(*verifying_key)?,
        };
        Ok(spki)
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_spki()?.to_der()?)
    }

    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        Self::from_spki_der(&spki.to_der()?)
    }

    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        // Reject anything that is not SPKI before trying key types.
        SubjectPublicKeyInfoOwned::from_der(der)?;
        if let Ok(public) = RsaPublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Rsa(public));
        }
        let verifying_key = P256VerifyingKey::from_public_key_der(der)
            .map_err(|e| PkiError::KeyError(format!("unsupported public key: {e}")))?;
        Ok(PublicKey::EcdsaP256(verifying_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdsa_spki_round_trip() {
        let key = KeyPair::generate_ecdsa_p256();
        let der = key.public_key().to_spki_der().unwrap();
        assert_eq!(PublicKey::from_spki_der(&der).unwrap(), key.public_key());
    }

    #[test]
    fn test_rsa_pkcs1_pem_import() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let der = key.to_pkcs1_der().unwrap();
        let pem_str = pem::encode(&pem::Pem::new("RSA PRIVATE KEY", der));
        let imported = KeyPair::from_pem(&pem_str).unwrap();
        assert_eq!(imported.public_key(), key.public_key());
    }

    #[test]
    fn test_algorithm_key_mismatch() {
        let key = KeyPair::generate_ecdsa_p256();
        let err = key
            .sign_data(SignatureAlgorithm::Sha256WithRSA, b"data")
            .unwrap_err();
        assert!(matches!(err, PkiError::UnsupportedAlgorithm(_)));
        assert!(key.to_pkcs1_der().is_err());
    }

    #[test]
    fn test_sign_data_produces_signature() {
        let key = KeyPair::generate_ecdsa_p256();
        let signature = key
            .sign_data(SignatureAlgorithm::Sha256WithECDSA, b"data")
            .unwrap();
        // DER encoded ECDSA signature is a SEQUENCE.
        assert_eq!(signature[0], 0x30);
    }
}
