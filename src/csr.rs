//! PKCS#10 certificate signing requests.

use const_oid::AssociatedOid;
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{AltName, SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::error::{CertChainError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;

/// Requests are always signed with SHA-256.
const REQUEST_SIGNATURE_ALGORITHM: SignatureAlgorithm = SignatureAlgorithm::Sha256WithRsa;

/// A signed certificate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    pub inner: CertReq,
}

impl CertificateSigningRequest {
    /// Builds and self-signs a request for `subject`.
    ///
    /// Non-empty `alt_names` travel as a non-critical subjectAltName inside a
    /// PKCS#9 extensionRequest attribute.
    pub fn build(
        subject: &DistinguishedName,
        key_pair: &KeyPair,
        alt_names: &[AltName],
    ) -> Result<Self> {
        let mut attributes = SetOfVec::new();
        if !alt_names.is_empty() {
            attributes.insert(extension_request(alt_names)?)?;
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.to_x509_name()?,
            public_key: key_pair.public_key().to_spki()?,
            attributes,
        };
        let info_der = info.to_der()?;
        let signature = key_pair
            .sign(REQUEST_SIGNATURE_ALGORITHM, &info_der)
            .map_err(|e| CertChainError::CsrSign(e.to_string()))?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: REQUEST_SIGNATURE_ALGORITHM.into(),
                signature: BitString::from_bytes(&signature)
                    .map_err(|e| CertChainError::CsrSign(e.to_string()))?,
            },
        })
    }

    /// Checks the self-signature against the embedded public key.
    pub fn verify(&self) -> Result<()> {
        let algorithm = SignatureAlgorithm::from_oid(self.inner.algorithm.oid)
            .map_err(|e| CertChainError::CsrSign(e.to_string()))?;
        let public_key = self
            .public_key()
            .map_err(|e| CertChainError::CsrSign(e.to_string()))?;
        let info_der = self.inner.info.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertChainError::CsrSign("signature BIT STRING has unused bits".to_string())
        })?;
        public_key
            .verify(algorithm, &info_der, signature)
            .map_err(|_| CertChainError::CsrSign("request self-signature does not verify".to_string()))
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(&self.inner.info.public_key)
    }

    /// Alternative names requested through the extensionRequest attribute.
    pub fn alt_names(&self) -> Result<Vec<AltName>> {
        let mut names = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let request = ExtensionReq::from_der(&value.to_der()?)?;
                for extension in request.0.iter() {
                    if extension.extn_id == SubjectAltName::OID {
                        let param = ExtensionParam::from_x509(extension);
                        names.extend(param.to_extension::<SubjectAltName>()?.names);
                    }
                }
            }
        }
        Ok(names)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            pem_utils::CERTIFICATE_REQUEST_LABEL,
        ))
    }

    pub fn from_pem(pem_str: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(
            pem_str,
            pem_utils::CERTIFICATE_REQUEST_LABEL,
        )?)
    }
}

fn extension_request(alt_names: &[AltName]) -> Result<Attribute> {
    let san = SubjectAltName {
        names: alt_names.to_vec(),
    };
    let request = ExtensionReq(vec![ExtensionParam::from_extension(&san, false)?.to_x509()?]);
    let mut values = SetOfVec::new();
    values.insert(Any::encode_from(&request)?)?;
    Ok(Attribute {
        oid: ExtensionReq::OID,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::NameFields;
    use crate::key::test_keys;

    fn subject() -> DistinguishedName {
        DistinguishedName::build(
            &NameFields::builder()
                .country("BR".to_string())
                .organization("Elder".to_string())
                .common_name("localhost".to_string())
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_and_verify() {
        let key = test_keys::key(2);
        let names = vec![AltName::dns("localhost"), AltName::parse("127.0.0.1").unwrap()];
        let csr = CertificateSigningRequest::build(&subject(), key, &names).unwrap();

        csr.verify().unwrap();
        assert_eq!(csr.subject().unwrap(), subject());
        assert_eq!(&csr.public_key().unwrap(), key.public_key());
        assert_eq!(csr.alt_names().unwrap(), names);
    }

    #[test]
    fn test_request_without_alt_names_has_no_attributes() {
        let csr = CertificateSigningRequest::build(&subject(), test_keys::key(1), &[]).unwrap();
        assert!(csr.inner.info.attributes.is_empty());
        assert!(csr.alt_names().unwrap().is_empty());
        csr.verify().unwrap();
    }

    #[test]
    fn test_pem_round_trip() {
        let csr = CertificateSigningRequest::build(&subject(), test_keys::key(2), &[]).unwrap();
        let pem = csr.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        let parsed = CertificateSigningRequest::from_pem(&pem).unwrap();
        assert_eq!(parsed, csr);
        parsed.verify().unwrap();
    }

    #[test]
    fn test_tampered_request_is_rejected() {
        let mut csr = CertificateSigningRequest::build(&subject(), test_keys::key(2), &[]).unwrap();
        csr.inner.info.subject = DistinguishedName::build(
            &NameFields::builder()
                .common_name("attacker".to_string())
                .build(),
        )
        .unwrap()
        .to_x509_name()
        .unwrap();
        assert!(matches!(csr.verify(), Err(CertChainError::CsrSign(_))));
    }

    #[test]
    fn test_foreign_key_substitution_is_rejected() {
        let mut csr = CertificateSigningRequest::build(&subject(), test_keys::key(2), &[]).unwrap();
        csr.inner.info.public_key = test_keys::key(3).public_key().to_spki().unwrap();
        assert!(matches!(csr.verify(), Err(CertChainError::CsrSign(_))));
    }
}
