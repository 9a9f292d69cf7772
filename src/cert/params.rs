use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::{Any, Tag, Tagged};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CertChainError, Result};

/// Attribute types recognised in a distinguished name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameAttribute {
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
    CommonName,
}

impl NameAttribute {
    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            NameAttribute::Country => ObjectIdentifier::new_unwrap("2.5.4.6"),
            NameAttribute::State => ObjectIdentifier::new_unwrap("2.5.4.8"),
            NameAttribute::Locality => ObjectIdentifier::new_unwrap("2.5.4.7"),
            NameAttribute::Organization => ObjectIdentifier::new_unwrap("2.5.4.10"),
            NameAttribute::OrganizationalUnit => ObjectIdentifier::new_unwrap("2.5.4.11"),
            NameAttribute::CommonName => ObjectIdentifier::new_unwrap("2.5.4.3"),
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        [
            NameAttribute::Country,
            NameAttribute::State,
            NameAttribute::Locality,
            NameAttribute::Organization,
            NameAttribute::OrganizationalUnit,
            NameAttribute::CommonName,
        ]
        .into_iter()
        .find(|attr| attr.oid() == oid)
    }

    /// RFC 4514 short name.
    pub const fn short_name(self) -> &'static str {
        match self {
            NameAttribute::Country => "C",
            NameAttribute::State => "ST",
            NameAttribute::Locality => "L",
            NameAttribute::Organization => "O",
            NameAttribute::OrganizationalUnit => "OU",
            NameAttribute::CommonName => "CN",
        }
    }

    /// X.520 requires countryName to be a PrintableString.
    fn string_tag(self) -> Tag {
        match self {
            NameAttribute::Country => Tag::PrintableString,
            _ => Tag::Utf8String,
        }
    }
}

/// Distinguished name input.
///
/// # Fields
/// * `country` - The country (C), a two-letter ISO code.
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organizational_unit` - The organizational unit (OU).
/// * `common_name` - The common name (CN). Must not be empty when a name is built.
#[derive(Clone, Debug, Builder, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NameFields {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    #[builder(default)]
    pub common_name: String,
}

/// An ordered distinguished name.
///
/// Attribute order is kept exactly as given; it is significant for the DER
/// encoding and therefore for issuer/subject matching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    attributes: Vec<(NameAttribute, String)>,
}

impl DistinguishedName {
    /// Builds a name in the canonical C, ST, L, O, OU, CN order. Absent or
    /// empty optional fields are left out.
    ///
    /// # Errors
    /// [`CertChainError::NameBuild`] when the common name is blank or the
    /// country is not a two-letter code.
    pub fn build(fields: &NameFields) -> Result<Self> {
        if fields.common_name.trim().is_empty() {
            return Err(CertChainError::NameBuild(
                "common name must not be empty".to_string(),
            ));
        }
        if let Some(country) = fields.country.as_deref().filter(|c| !c.is_empty()) {
            if country.chars().count() != 2 || !country.is_ascii() {
                return Err(CertChainError::NameBuild(format!(
                    "country `{country}` is not a two-letter code"
                )));
            }
        }

        let optional = [
            (NameAttribute::Country, &fields.country),
            (NameAttribute::State, &fields.state),
            (NameAttribute::Locality, &fields.locality),
            (NameAttribute::Organization, &fields.organization),
            (NameAttribute::OrganizationalUnit, &fields.organizational_unit),
        ];
        let mut attributes: Vec<_> = optional
            .into_iter()
            .filter_map(|(attr, value)| {
                value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (attr, v.clone()))
            })
            .collect();
        attributes.push((NameAttribute::CommonName, fields.common_name.clone()));
        Ok(Self { attributes })
    }

    /// Uses the attributes verbatim, in the order given.
    pub fn from_attributes(attributes: Vec<(NameAttribute, String)>) -> Result<Self> {
        let has_cn = attributes
            .iter()
            .any(|(attr, v)| *attr == NameAttribute::CommonName && !v.trim().is_empty());
        if !has_cn {
            return Err(CertChainError::NameBuild(
                "common name must not be empty".to_string(),
            ));
        }
        Ok(Self { attributes })
    }

    pub fn attributes(&self) -> &[(NameAttribute, String)] {
        &self.attributes
    }

    pub fn get(&self, attr: NameAttribute) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, v)| v.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(NameAttribute::CommonName)
    }

    /// Converts the distinguished name to an X.509-compatible format, one
    /// attribute per RDN.
    pub fn to_x509_name(&self) -> Result<x509_cert::name::Name> {
        let rdns = self
            .attributes
            .iter()
            .map(|(attr, value)| {
                let atv = AttributeTypeAndValue {
                    oid: attr.oid(),
                    value: Any::new(attr.string_tag(), value.as_bytes())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    pub fn from_x509_name(name: &x509_cert::name::Name) -> Result<Self> {
        let mut attributes = Vec::new();
        for rdn in name.0.iter() {
            for atv in rdn.0.iter() {
                let attr = NameAttribute::from_oid(atv.oid).ok_or_else(|| {
                    CertChainError::Serialization(format!(
                        "unsupported name attribute {}",
                        atv.oid
                    ))
                })?;
                let value = match atv.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
                        std::str::from_utf8(atv.value.value())
                            .map_err(|e| CertChainError::Serialization(e.to_string()))?
                    }
                    tag => {
                        return Err(CertChainError::Serialization(format!(
                            "unsupported string type {tag} for {}",
                            attr.short_name()
                        )));
                    }
                };
                attributes.push((attr, value.to_string()));
            }
        }
        Ok(Self { attributes })
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attr, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", attr.short_name(), value)?;
        }
        Ok(())
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }
}

/// How long issued certificates stay valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityPolicy {
    /// Lifetime counted from the issuance instant.
    pub period: Duration,
    /// How far `notBefore` is backdated to absorb clock drift.
    pub clock_skew: Duration,
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self::for_days(730)
    }
}

impl ValidityPolicy {
    pub const DEFAULT_CLOCK_SKEW: Duration = Duration::days(1);

    /// Saturates instead of overflowing; an out-of-range period is
    /// rejected by [`ValidityPolicy::window`].
    pub fn for_days(days: i64) -> Self {
        Self {
            period: days_saturating(days),
            clock_skew: Self::DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_clock_skew_days(self, days: i64) -> Self {
        self.with_clock_skew(days_saturating(days))
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// The window for a certificate issued at `issued_at`. The instant is
    /// truncated to whole seconds, the precision X.509 times carry.
    pub fn window(&self, issued_at: OffsetDateTime) -> Result<Validity> {
        if self.period <= Duration::ZERO {
            return Err(CertChainError::Sign(
                "validity period must be positive".to_string(),
            ));
        }
        if self.clock_skew < Duration::ZERO {
            return Err(CertChainError::Sign(
                "clock skew tolerance must not be negative".to_string(),
            ));
        }
        let issued_at = issued_at
            .replace_nanosecond(0)
            .map_err(|e| CertChainError::Sign(e.to_string()))?;
        let not_before = issued_at.checked_sub(self.clock_skew).ok_or_else(|| {
            CertChainError::Sign(format!(
                "notBefore {issued_at} minus {} is out of range",
                self.clock_skew
            ))
        })?;
        let not_after = issued_at.checked_add(self.period).ok_or_else(|| {
            CertChainError::Sign(format!(
                "notAfter {issued_at} plus {} is past 9999-12-31",
                self.period
            ))
        })?;
        Ok(Validity {
            not_before,
            not_after,
        })
    }
}

fn days_saturating(days: i64) -> Duration {
    Duration::seconds(days.saturating_mul(86_400))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }

    pub fn from_x509(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elder_root() -> NameFields {
        NameFields::builder()
            .country("BR".to_string())
            .state("São Paulo".to_string())
            .locality("Sao Paulo".to_string())
            .organization("Elder".to_string())
            .organizational_unit("Root CA".to_string())
            .common_name("ElderRootCA".to_string())
            .build()
    }

    #[test]
    fn test_build_uses_canonical_order() {
        let dn = DistinguishedName::build(&elder_root()).unwrap();
        let order: Vec<_> = dn.attributes().iter().map(|(a, _)| *a).collect();
        assert_eq!(
            order,
            vec![
                NameAttribute::Country,
                NameAttribute::State,
                NameAttribute::Locality,
                NameAttribute::Organization,
                NameAttribute::OrganizationalUnit,
                NameAttribute::CommonName,
            ]
        );
        assert_eq!(
            dn.to_string(),
            "C=BR, ST=São Paulo, L=Sao Paulo, O=Elder, OU=Root CA, CN=ElderRootCA"
        );
    }

    #[test]
    fn test_build_skips_missing_unit() {
        let fields = NameFields {
            organizational_unit: None,
            common_name: "localhost".to_string(),
            ..elder_root()
        };
        let dn = DistinguishedName::build(&fields).unwrap();
        assert_eq!(dn.get(NameAttribute::OrganizationalUnit), None);
        assert_eq!(dn.common_name(), Some("localhost"));
    }

    #[test]
    fn test_empty_common_name_is_rejected() {
        let fields = NameFields {
            common_name: "  ".to_string(),
            ..elder_root()
        };
        assert!(matches!(
            DistinguishedName::build(&fields),
            Err(CertChainError::NameBuild(_))
        ));
        assert!(DistinguishedName::from_attributes(vec![(NameAttribute::Country, "BR".into())]).is_err());
    }

    #[test]
    fn test_bad_country_is_rejected() {
        let fields = NameFields {
            country: Some("Brazil".to_string()),
            ..elder_root()
        };
        assert!(DistinguishedName::build(&fields).is_err());
    }

    #[test]
    fn test_x509_name_round_trip_keeps_order() {
        let dn = DistinguishedName::from_attributes(vec![
            (NameAttribute::CommonName, "first".to_string()),
            (NameAttribute::Organization, "Elder".to_string()),
        ])
        .unwrap();
        let name = dn.to_x509_name().unwrap();
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), dn);

        let full = DistinguishedName::build(&elder_root()).unwrap();
        let name = full.to_x509_name().unwrap();
        assert_eq!(name.0[0].0.iter().next().unwrap().value.tag(), Tag::PrintableString);
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), full);
    }

    #[test]
    fn test_validity_window_backdates_by_skew() {
        let issued_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
            + Duration::milliseconds(250);
        let policy = ValidityPolicy::for_days(730);
        let validity = policy.window(issued_at).unwrap();
        assert!(validity.not_before < issued_at && issued_at < validity.not_after);
        assert_eq!(validity.duration(), Duration::days(731));
        assert_eq!(validity.not_before.nanosecond(), 0);
    }

    #[test]
    fn test_validity_window_rejects_empty_period() {
        let policy = ValidityPolicy::for_days(0);
        assert!(policy.window(OffsetDateTime::now_utc()).is_err());
    }

    #[test]
    fn test_validity_window_out_of_range_is_an_error() {
        let issued_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        for policy in [
            ValidityPolicy::for_days(3_000_000),
            ValidityPolicy::for_days(i64::MAX),
            ValidityPolicy::for_days(30).with_clock_skew_days(i64::MAX),
        ] {
            assert!(matches!(
                policy.window(issued_at),
                Err(CertChainError::Sign(_))
            ));
        }
    }
}
