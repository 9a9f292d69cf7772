pub mod extensions;
pub mod params;

use der::asn1::AnyRef;
use der::{Any, Decode, Encode};
use rsa::Pkcs1v15Sign;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha384, Sha512};
use time::OffsetDateTime;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertChainError, Result};
use crate::key::PublicKey;
use crate::pem_utils;
use crate::policy::ExtensionSet;
use params::{DistinguishedName, ExtensionParam, Validity};

/// Represents the supported signature algorithms for certificates.
///
/// All of them are RSA PKCS#1 v1.5 signatures; they differ only in the digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    #[default]
    #[serde(rename = "sha256")]
    Sha256WithRsa,
    /// SHA-384 with RSA encryption.
    #[serde(rename = "sha384")]
    Sha384WithRsa,
    /// SHA-512 with RSA encryption.
    #[serde(rename = "sha512")]
    Sha512WithRsa,
}

impl SignatureAlgorithm {
    pub(crate) fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            SignatureAlgorithm::Sha256WithRsa => Sha256::digest(data).to_vec(),
            SignatureAlgorithm::Sha384WithRsa => Sha384::digest(data).to_vec(),
            SignatureAlgorithm::Sha512WithRsa => Sha512::digest(data).to_vec(),
        }
    }

    pub(crate) fn padding(self) -> Pkcs1v15Sign {
        match self {
            SignatureAlgorithm::Sha256WithRsa => Pkcs1v15Sign::new::<Sha256>(),
            SignatureAlgorithm::Sha384WithRsa => Pkcs1v15Sign::new::<Sha384>(),
            SignatureAlgorithm::Sha512WithRsa => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    pub fn from_oid(oid: der::oid::ObjectIdentifier) -> Result<Self> {
        match oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRsa)
            }
            const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha384WithRsa)
            }
            const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha512WithRsa)
            }
            other => Err(CertChainError::Serialization(format!(
                "Unsupported signature algorithm {other}"
            ))),
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RFC 4055 requires explicit NULL parameters for the RSA algorithms.
    fn from(value: SignatureAlgorithm) -> Self {
        let oid = match value {
            SignatureAlgorithm::Sha256WithRsa => {
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::Sha384WithRsa => {
                const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::Sha512WithRsa => {
                const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION
            }
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: Some(Any::from(AnyRef::NULL)),
        }
    }
}

/// Represents a signed X.509 certificate.
///
/// Immutable once signed; every accessor decodes from the inner structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: x509_cert::Certificate,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertChainError::Serialization(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, pem_utils::CERTIFICATE_LABEL))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(der)?;
        Ok(Self { inner })
    }

    pub fn from_pem(pem_str: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(pem_str, pem_utils::CERTIFICATE_LABEL)?)
    }

    /// Serial number bytes as encoded (big-endian, positive).
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    /// Serial number as colon-separated hex, the way `openssl x509` prints it.
    pub fn serial_hex(&self) -> String {
        self.serial_number()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Encoded subject name, for exact issuer/subject comparisons.
    pub fn subject_name(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_certificate.subject
    }

    /// Encoded issuer name, for exact issuer/subject comparisons.
    pub fn issuer_name(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn validity(&self) -> Result<Validity> {
        let validity = &self.inner.tbs_certificate.validity;
        Ok(Validity {
            not_before: to_offset_date_time(validity.not_before)?,
            not_after: to_offset_date_time(validity.not_after)?,
        })
    }

    pub fn extension_params(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from_x509)
            .collect()
    }

    pub fn extensions(&self) -> Result<ExtensionSet> {
        ExtensionSet::from_extensions(&self.extension_params())
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    /// Issuer name equals subject name.
    pub fn is_self_issued(&self) -> bool {
        self.issuer_name() == self.subject_name()
    }

    /// Verifies the signature over the TBS bytes with `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        if self.inner.tbs_certificate.signature.oid != self.inner.signature_algorithm.oid {
            return Err(CertChainError::Sign(
                "inner and outer signature algorithms differ".to_string(),
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer_key.verify(algorithm, &tbs, self.signature())
    }
}

fn to_offset_date_time(time: x509_cert::time::Time) -> Result<OffsetDateTime> {
    let secs = time.to_unix_duration().as_secs();
    let secs = i64::try_from(secs).map_err(|e| CertChainError::Serialization(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| CertChainError::Serialization(e.to_string()))
}
