use std::time::Duration;

use der::asn1::{GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{CertChainError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity window.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions for the certificate.
pub struct TbsCertificate<'a> {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: &'a DistinguishedName,
    pub validity: Validity,
    pub subject: &'a DistinguishedName,
    pub subject_public_key: &'a PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate<'_> {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_number)?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.to_x509_name()?,
            validity,
            subject: self.subject.to_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 section 4.1.2.5).
fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let secs = u64::try_from(instant.unix_timestamp()).map_err(|_| {
        CertChainError::Sign(format!("{instant} is before the Unix epoch"))
    })?;
    let since_epoch = Duration::from_secs(secs);
    Ok(if instant.year() < 2050 {
        x509_cert::time::Time::UtcTime(UtcTime::from_unix_duration(since_epoch)?)
    } else {
        x509_cert::time::Time::GeneralTime(GeneralizedTime::from_unix_duration(since_epoch)?)
    })
}
