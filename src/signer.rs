//! Certificate signing.

use der::Encode;
use der::asn1::BitString;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;

use crate::cert::params::{DistinguishedName, ValidityPolicy};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::csr::CertificateSigningRequest;
use crate::error::{CertChainError, Result};
use crate::issuer::Issuer;
use crate::key::PublicKey;
use crate::policy::{ExtensionSet, Role};
use crate::serial;
use crate::tbs_certificate::TbsCertificate;

/// Signs certificates with an issuer's key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateSigner {
    algorithm: SignatureAlgorithm,
}

impl CertificateSigner {
    pub fn new(algorithm: SignatureAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs a certificate of `role` valid from now.
    pub fn sign(
        &self,
        role: Role,
        subject: &DistinguishedName,
        subject_public_key: &PublicKey,
        issuer: &dyn Issuer,
        extensions: &ExtensionSet,
        validity: &ValidityPolicy,
    ) -> Result<Certificate> {
        self.sign_at(
            role,
            subject,
            subject_public_key,
            issuer,
            extensions,
            validity,
            OffsetDateTime::now_utc(),
        )
    }

    /// Signs a certificate whose validity window is anchored at `issued_at`.
    ///
    /// # Errors
    /// * [`CertChainError::KeyMismatch`] if the issuer's private key does not
    ///   belong to the issuer's certificate.
    /// * [`CertChainError::PolicyViolation`] if `extensions` is not legal for
    ///   `role`, if only one of "root" and "self-issued" holds, or if the key
    ///   identifiers do not name the issuer and subject keys.
    /// * [`CertChainError::Sign`] if the signature primitive fails.
    pub fn sign_at(
        &self,
        role: Role,
        subject: &DistinguishedName,
        subject_public_key: &PublicKey,
        issuer: &dyn Issuer,
        extensions: &ExtensionSet,
        validity: &ValidityPolicy,
        issued_at: OffsetDateTime,
    ) -> Result<Certificate> {
        if !issuer.signing_key().matches(issuer.public_key()) {
            return Err(CertChainError::KeyMismatch {
                issuer: issuer.issuer_name().to_string(),
            });
        }
        extensions.validate(role)?;
        if (role == Role::Root) != (issuer.issuer_name() == subject) {
            return Err(CertChainError::policy(
                role,
                "only the root certificate is self-issued",
            ));
        }
        if extensions.authority_key_id != issuer.public_key().key_identifier()? {
            return Err(CertChainError::policy(
                role,
                "authority key identifier does not match the issuer key",
            ));
        }
        if extensions.subject_key_id != subject_public_key.key_identifier()? {
            return Err(CertChainError::policy(
                role,
                "subject key identifier does not match the subject key",
            ));
        }

        let window = validity.window(issued_at)?;
        let tbs = TbsCertificate {
            serial_number: serial::random_serial()?,
            signature_algorithm: self.algorithm,
            issuer: issuer.issuer_name(),
            validity: window,
            subject,
            subject_public_key,
            extensions: extensions.to_params()?,
        };
        let tbs_certificate = tbs.to_tbs_certificate_inner()?;
        let tbs_der = tbs_certificate
            .to_der()
            .map_err(|e| CertChainError::Sign(e.to_string()))?;
        let signature = issuer.signing_key().sign(self.algorithm, &tbs_der)?;

        let certificate = Certificate {
            inner: CertificateInner {
                tbs_certificate,
                signature_algorithm: self.algorithm.into(),
                signature: BitString::from_bytes(&signature)
                    .map_err(|e| CertChainError::Sign(e.to_string()))?,
            },
        };
        tracing::debug!(
            serial = %certificate.serial_hex(),
            %subject,
            issuer = %issuer.issuer_name(),
            not_after = %window.not_after,
            "Signed certificate"
        );
        Ok(certificate)
    }

    /// Signs the subject and key of a verified request.
    ///
    /// A request whose self-signature does not verify is rejected with
    /// [`CertChainError::CsrSign`] before anything else is checked.
    pub fn sign_request(
        &self,
        role: Role,
        request: &CertificateSigningRequest,
        issuer: &dyn Issuer,
        extensions: &ExtensionSet,
        validity: &ValidityPolicy,
    ) -> Result<Certificate> {
        request.verify()?;
        let subject = request.subject()?;
        let public_key = request.public_key()?;
        self.sign(role, &subject, &public_key, issuer, extensions, validity)
    }
}
