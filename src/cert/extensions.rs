use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::CertChainError;

/// DER codec for the `extnValue` of one X.509 extension.
///
/// # Example
/// ```
/// use certchain::cert::extensions::{AltName, SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![AltName::dns("example.com")] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// `extnID` of the extension.
    const OID: ObjectIdentifier;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError>;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError>
    where
        Self: Sized;
}

/// One subject alternative name: a DNS name or an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AltName {
    Dns(String),
    Ip(IpAddr),
}

impl AltName {
    pub fn dns(name: &str) -> Self {
        AltName::Dns(name.to_string())
    }

    /// Parses an IP literal as [`AltName::Ip`] and anything else as a DNS name.
    pub fn parse(host: &str) -> Result<Self, CertChainError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(CertChainError::InvalidAltName(
                "alternative names must not be empty".to_string(),
            ));
        }
        Ok(match host.parse::<IpAddr>() {
            Ok(ip) => AltName::Ip(ip),
            Err(_) => AltName::Dns(host.to_string()),
        })
    }

    fn to_general_name(&self) -> Result<GeneralName, CertChainError> {
        match self {
            AltName::Dns(name) => Ia5String::new(name)
                .map(GeneralName::DnsName)
                .map_err(|e| CertChainError::InvalidAltName(format!("{name}: {e}"))),
            AltName::Ip(IpAddr::V4(ip)) => Ok(GeneralName::IpAddress(OctetString::new(
                ip.octets().to_vec(),
            )?)),
            AltName::Ip(IpAddr::V6(ip)) => Ok(GeneralName::IpAddress(OctetString::new(
                ip.octets().to_vec(),
            )?)),
        }
    }

    fn from_general_name(name: &GeneralName) -> Result<Self, CertChainError> {
        match name {
            GeneralName::DnsName(dns) => Ok(AltName::Dns(dns.to_string())),
            GeneralName::IpAddress(octets) => {
                let ip = match octets.as_bytes() {
                    &[a, b, c, d] => IpAddr::from([a, b, c, d]),
                    bytes => <[u8; 16]>::try_from(bytes).map(IpAddr::from).map_err(|_| {
                        CertChainError::Serialization(format!(
                            "{}-byte IP address in subject alternative name",
                            bytes.len()
                        ))
                    })?,
                };
                Ok(AltName::Ip(ip))
            }
            _ => Err(CertChainError::Serialization(
                "Unsupported general name type".to_string(),
            )),
        }
    }
}

impl FromStr for AltName {
    type Err = CertChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AltName::parse(s)
    }
}

impl fmt::Display for AltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltName::Dns(name) => f.write_str(name),
            AltName::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// Subject alternative names, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<AltName>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(AltName::to_general_name)
                .collect::<Result<Vec<_>, _>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(AltName::from_general_name)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }
}

/// `cA` flag and `pathLenConstraint`. The default value is an end entity and
/// encodes as an empty sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CertChainError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    pub fn contains(&self, usage: KeyUsages) -> bool {
        self.0.contains(usage)
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(
            self.usage.iter().copied().map(Into::into).collect(),
        );
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        Ok(Self {
            usage: eku.0.into_iter().map(ExtendedKeyUsageOption::from).collect(),
        })
    }
}

/// A key purpose in the Extended Key Usage extension. Purposes other than
/// the TLS ones are carried through as [`ExtendedKeyUsageOption::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    Other(ObjectIdentifier),
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            other => ExtendedKeyUsageOption::Other(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(
            self.key_identifier.as_slice(),
        )?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: ski.0.as_bytes().to_vec(),
        })
    }
}

/// Only the `keyIdentifier` form is written. Issuer name and serial are
/// ignored when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertChainError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertChainError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}
