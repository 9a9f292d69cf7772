//! TOML configuration.
//!
//! Every field is optional. An empty file reproduces the Elder deployment:
//! a `ElderRootCA` root, an `ElderIntermediateCA` intermediate and a
//! `localhost` server certificate under `pki/`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AltName;
use crate::cert::params::{NameFields, ValidityPolicy};
use crate::error::{CertChainError, Result};
use crate::policy::Role;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkiConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_clock_skew_days")]
    pub clock_skew_days: i64,
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
    #[serde(default)]
    pub root: ProfileConfig,
    #[serde(default)]
    pub intermediate: ProfileConfig,
    #[serde(default)]
    pub leaf: ProfileConfig,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            clock_skew_days: default_clock_skew_days(),
            signature_algorithm: SignatureAlgorithm::default(),
            root: ProfileConfig::default(),
            intermediate: ProfileConfig::default(),
            leaf: ProfileConfig::default(),
        }
    }
}

/// Days from 0001-01-01 to 9999-12-31. No X.509 time can be further apart.
const MAX_DAYS: i64 = 3_652_058;

fn default_output_dir() -> PathBuf {
    PathBuf::from("pki")
}

fn default_clock_skew_days() -> i64 {
    1
}

/// Per-role overrides. Anything left out falls back to the role default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub key_bits: Option<usize>,
    pub validity_days: Option<i64>,
    pub path_length: Option<u8>,
    pub alt_names: Option<Vec<String>>,
    pub subject: Option<NameFields>,
}

/// Everything needed to issue the certificate of one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaProfile {
    pub role: Role,
    pub subject: NameFields,
    pub key_bits: usize,
    pub validity_days: i64,
    /// For an intermediate, `None` means "one below the root".
    pub path_length: Option<u8>,
    pub alt_names: Vec<AltName>,
}

impl CaProfile {
    /// Built-in profile for `role`.
    pub fn default_for(role: Role) -> Self {
        let elder = |ou: Option<&str>, cn: &str| NameFields {
            country: Some("BR".to_string()),
            state: Some("São Paulo".to_string()),
            locality: Some("Sao Paulo".to_string()),
            organization: Some("Elder".to_string()),
            organizational_unit: ou.map(str::to_string),
            common_name: cn.to_string(),
        };
        match role {
            Role::Root => CaProfile {
                role,
                subject: elder(Some("Root CA"), "ElderRootCA"),
                key_bits: 4096,
                validity_days: 730,
                path_length: Some(1),
                alt_names: Vec::new(),
            },
            Role::Intermediate => CaProfile {
                role,
                subject: elder(Some("Intermediate CA"), "ElderIntermediateCA"),
                key_bits: 4096,
                validity_days: 730,
                path_length: None,
                alt_names: Vec::new(),
            },
            Role::Leaf => CaProfile {
                role,
                subject: elder(None, "localhost"),
                key_bits: 2048,
                validity_days: 730,
                path_length: None,
                alt_names: vec![
                    AltName::dns("localhost"),
                    AltName::Ip([127, 0, 0, 1].into()),
                ],
            },
        }
    }
}

impl PkiConfig {
    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CertChainError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
            .map_err(|e| CertChainError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PkiConfig =
            toml::from_str(text).map_err(|e| CertChainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0..=MAX_DAYS).contains(&self.clock_skew_days) {
            return Err(CertChainError::Config(format!(
                "clock_skew_days must be between 0 and {MAX_DAYS}"
            )));
        }
        for role in Role::ALL {
            if let Some(days) = self.overrides(role).validity_days {
                if !(1..=MAX_DAYS).contains(&days) {
                    return Err(CertChainError::Config(format!(
                        "[{role}] validity_days must be between 1 and {MAX_DAYS}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn overrides(&self, role: Role) -> &ProfileConfig {
        match role {
            Role::Root => &self.root,
            Role::Intermediate => &self.intermediate,
            Role::Leaf => &self.leaf,
        }
    }

    /// The effective profile for `role`: built-in defaults overlaid with the
    /// configured values, field by field.
    pub fn profile(&self, role: Role) -> Result<CaProfile> {
        let overrides = self.overrides(role);
        let mut profile = CaProfile::default_for(role);

        if let Some(bits) = overrides.key_bits {
            profile.key_bits = bits;
        }
        if let Some(days) = overrides.validity_days {
            profile.validity_days = days;
        }
        if overrides.path_length.is_some() {
            profile.path_length = overrides.path_length;
        }
        if let Some(names) = &overrides.alt_names {
            profile.alt_names = names
                .iter()
                .map(|name| AltName::parse(name))
                .collect::<Result<_>>()?;
        }
        if let Some(subject) = &overrides.subject {
            let base = &mut profile.subject;
            let pick = |value: &Option<String>, fallback: &mut Option<String>| {
                if value.is_some() {
                    *fallback = value.clone();
                }
            };
            pick(&subject.country, &mut base.country);
            pick(&subject.state, &mut base.state);
            pick(&subject.locality, &mut base.locality);
            pick(&subject.organization, &mut base.organization);
            pick(&subject.organizational_unit, &mut base.organizational_unit);
            if !subject.common_name.is_empty() {
                base.common_name = subject.common_name.clone();
            }
        }
        Ok(profile)
    }

    pub fn validity_policy(&self, profile: &CaProfile) -> ValidityPolicy {
        ValidityPolicy::for_days(profile.validity_days).with_clock_skew_days(self.clock_skew_days)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn test_empty_file_matches_defaults() {
        let config = PkiConfig::from_toml("").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("pki"));
        assert_eq!(config.clock_skew_days, 1);
        assert_eq!(config.signature_algorithm, SignatureAlgorithm::Sha256WithRsa);

        let root = config.profile(Role::Root).unwrap();
        assert_eq!(root.subject.common_name, "ElderRootCA");
        assert_eq!(root.subject.organizational_unit.as_deref(), Some("Root CA"));
        assert_eq!(root.subject.state.as_deref(), Some("São Paulo"));
        assert_eq!(root.key_bits, 4096);
        assert_eq!(root.path_length, Some(1));

        let intermediate = config.profile(Role::Intermediate).unwrap();
        assert_eq!(intermediate.subject.common_name, "ElderIntermediateCA");
        assert_eq!(intermediate.path_length, None);

        let leaf = config.profile(Role::Leaf).unwrap();
        assert_eq!(leaf.subject.common_name, "localhost");
        assert_eq!(leaf.subject.organizational_unit, None);
        assert_eq!(leaf.key_bits, 2048);
        assert_eq!(
            leaf.alt_names,
            vec![AltName::dns("localhost"), AltName::parse("127.0.0.1").unwrap()]
        );
    }

    #[test]
    fn test_overrides_are_merged_per_field() {
        let config = PkiConfig::from_toml(
            r#"
            output_dir = "/tmp/pki"
            signature_algorithm = "sha384"

            [leaf]
            key_bits = 3072
            alt_names = ["api.example.com", "::1"]

            [leaf.subject]
            common_name = "api.example.com"
            organization = "Example"
            "#,
        )
        .unwrap();
        assert_eq!(config.signature_algorithm, SignatureAlgorithm::Sha384WithRsa);

        let leaf = config.profile(Role::Leaf).unwrap();
        assert_eq!(leaf.key_bits, 3072);
        assert_eq!(leaf.validity_days, 730);
        assert_eq!(leaf.subject.common_name, "api.example.com");
        assert_eq!(leaf.subject.organization.as_deref(), Some("Example"));
        assert_eq!(leaf.subject.country.as_deref(), Some("BR"));
        assert_eq!(
            leaf.alt_names,
            vec![AltName::dns("api.example.com"), AltName::Ip("::1".parse().unwrap())]
        );
    }

    #[test]
    fn test_empty_subject_field_drops_the_attribute() {
        let config =
            PkiConfig::from_toml("[root.subject]\norganizational_unit = \"\"").unwrap();
        let root = config.profile(Role::Root).unwrap();
        assert_eq!(root.subject.common_name, "ElderRootCA");
        let name = crate::cert::params::DistinguishedName::build(&root.subject).unwrap();
        assert_eq!(
            name.to_string(),
            "C=BR, ST=São Paulo, L=Sao Paulo, O=Elder, CN=ElderRootCA"
        );
    }

    #[test]
    fn test_validity_policy_uses_clock_skew() {
        let config = PkiConfig::from_toml("clock_skew_days = 0\n[root]\nvalidity_days = 10").unwrap();
        let policy = config.validity_policy(&config.profile(Role::Root).unwrap());
        assert_eq!(policy.period, Duration::days(10));
        assert_eq!(policy.clock_skew, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for text in [
            "clock_skew_days = -1",
            "clock_skew_days = 9223372036854775807",
            "[leaf]\nvalidity_days = 100000000000000",
            "[intermediate]\nvalidity_days = 0",
            "signature_algorithm = \"md5\"",
            "unknown = true",
            "[root]\nkey_size = 4096",
            "[leaf.subject]\ncn = \"localhost\"",
        ] {
            assert!(
                matches!(PkiConfig::from_toml(text), Err(CertChainError::Config(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_bad_alt_name_surfaces_at_profile_time() {
        let config = PkiConfig::from_toml("[leaf]\nalt_names = [\"\"]").unwrap();
        assert!(matches!(
            config.profile(Role::Leaf),
            Err(CertChainError::InvalidAltName(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let err = PkiConfig::load(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CertChainError::Config(_)));
    }
}
