//! Role-indexed extension policy.
//!
//! Each [`Role`] maps to a fixed [`RolePolicy`] row. [`ExtensionPolicy::derive`]
//! turns a row plus the key material into a complete [`ExtensionSet`], and
//! [`ExtensionSet::validate`] checks a whole set against its role before
//! anything is signed:
//!
//! | Role         | CA    | pathLen          | keyUsage                          | EKU        | SAN       |
//! |--------------|-------|------------------|-----------------------------------|------------|-----------|
//! | Root         | true  | caller supplied  | keyCertSign, cRLSign              | none       | forbidden |
//! | Intermediate | true  | issuer's minus 1 | keyCertSign, cRLSign              | none       | forbidden |
//! | Leaf         | false | absent           | digitalSignature, keyEncipherment | serverAuth | required  |

use std::fmt;


use crate::cert::extensions::{
    AltName, AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption,
    FlagSet, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::cert::params::ExtensionParam;
use crate::error::{CertChainError, Result};
use crate::key::PublicKey;

/// Position of a certificate in the three-tier chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Root,
    Intermediate,
    Leaf,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Root, Role::Intermediate, Role::Leaf];

    /// The role whose key signs certificates of this role.
    pub fn issuer_role(self) -> Role {
        match self {
            Role::Root => Role::Root,
            Role::Intermediate => Role::Root,
            Role::Leaf => Role::Intermediate,
        }
    }

    pub fn policy(self) -> RolePolicy {
        match self {
            Role::Root | Role::Intermediate => RolePolicy {
                is_ca: true,
                key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign,
                extended_key_usage: &[],
                alt_names: AltNameRule::Forbidden,
            },
            Role::Leaf => RolePolicy {
                is_ca: false,
                key_usage: KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
                extended_key_usage: &[ExtendedKeyUsageOption::ServerAuth],
                alt_names: AltNameRule::Required,
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Root => "root",
            Role::Intermediate => "intermediate",
            Role::Leaf => "leaf",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AltNameRule {
    Required,
    Forbidden,
}

/// One row of the policy table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RolePolicy {
    pub is_ca: bool,
    pub key_usage: FlagSet<KeyUsages>,
    pub extended_key_usage: &'static [ExtendedKeyUsageOption],
    pub alt_names: AltNameRule,
}

/// The complete extension set of one certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    pub basic_constraints: BasicConstraints,
    pub key_usage: KeyUsage,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_alt_names: Vec<AltName>,
    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,
}

impl ExtensionSet {
    /// Checks the whole set against the row for `role`.
    pub fn validate(&self, role: Role) -> Result<()> {
        let policy = role.policy();
        let violation = |reason: &str| Err(CertChainError::policy(role, reason));

        if self.basic_constraints.is_ca != policy.is_ca {
            return violation(if policy.is_ca {
                "certificate authorities must set basicConstraints CA:TRUE"
            } else {
                "end-entity certificates must not set basicConstraints CA:TRUE"
            });
        }
        let cert_sign = self.key_usage.contains(KeyUsages::KeyCertSign);
        let crl_sign = self.key_usage.contains(KeyUsages::CRLSign);
        if self.basic_constraints.is_ca {
            if !cert_sign || !crl_sign {
                return violation("CA:TRUE requires both keyCertSign and cRLSign");
            }
        } else {
            if cert_sign {
                return violation("keyCertSign is only legal on certificate authorities");
            }
            if crl_sign {
                return violation("cRLSign is only legal on certificate authorities");
            }
            if self.basic_constraints.max_path_length.is_some() {
                return violation("path length constraint requires CA:TRUE");
            }
        }
        if !self.key_usage.0.contains(policy.key_usage) {
            return violation("key usage is missing bits required for the role");
        }
        for usage in policy.extended_key_usage {
            if !self.extended_key_usage.contains(usage) {
                return violation("extended key usage is missing a required purpose");
            }
        }
        if policy.is_ca && !self.extended_key_usage.is_empty() {
            return violation("certificate authorities carry no extended key usage");
        }
        match policy.alt_names {
            AltNameRule::Required if self.subject_alt_names.is_empty() => {
                return violation("at least one subject alternative name is required");
            }
            AltNameRule::Forbidden if !self.subject_alt_names.is_empty() => {
                return violation("subject alternative names are not allowed");
            }
            _ => {}
        }
        if self.subject_key_id.is_empty() || self.authority_key_id.is_empty() {
            return violation("subject and authority key identifiers are required");
        }
        Ok(())
    }

    /// Encodes the set in the order and with the criticality it is signed with.
    pub fn to_params(&self) -> Result<Vec<ExtensionParam>> {
        let mut params = vec![
            ExtensionParam::from_extension(&self.basic_constraints, true)?,
            ExtensionParam::from_extension(&self.key_usage, true)?,
        ];
        if !self.extended_key_usage.is_empty() {
            let eku = ExtendedKeyUsage {
                usage: self.extended_key_usage.clone(),
            };
            params.push(ExtensionParam::from_extension(&eku, false)?);
        }
        if !self.subject_alt_names.is_empty() {
            let san = SubjectAltName {
                names: self.subject_alt_names.clone(),
            };
            params.push(ExtensionParam::from_extension(&san, false)?);
        }
        let aki = AuthorityKeyIdentifier {
            key_identifier: self.authority_key_id.clone(),
        };
        let ski = SubjectKeyIdentifier {
            key_identifier: self.subject_key_id.clone(),
        };
        params.push(ExtensionParam::from_extension(&aki, false)?);
        params.push(ExtensionParam::from_extension(&ski, false)?);
        Ok(params)
    }

    /// Reads a set back from encoded extensions. Unknown extensions are skipped.
    pub fn from_extensions(params: &[ExtensionParam]) -> Result<Self> {
        let mut set = ExtensionSet::default();
        for param in params {
            if param.oid == BasicConstraints::OID {
                set.basic_constraints = param.to_extension()?;
            } else if param.oid == KeyUsage::OID {
                set.key_usage = param.to_extension()?;
            } else if param.oid == ExtendedKeyUsage::OID {
                set.extended_key_usage = param.to_extension::<ExtendedKeyUsage>()?.usage;
            } else if param.oid == SubjectAltName::OID {
                set.subject_alt_names = param.to_extension::<SubjectAltName>()?.names;
            } else if param.oid == SubjectKeyIdentifier::OID {
                set.subject_key_id = param.to_extension::<SubjectKeyIdentifier>()?.key_identifier;
            } else if param.oid == AuthorityKeyIdentifier::OID {
                set.authority_key_id =
                    param.to_extension::<AuthorityKeyIdentifier>()?.key_identifier;
            }
        }
        Ok(set)
    }
}

/// Derives extension sets from the role table.
pub struct ExtensionPolicy;

impl ExtensionPolicy {
    /// Builds and validates the extension set for a certificate of `role`.
    ///
    /// For a root, `issuer_public_key` is the subject's own key and the
    /// authority key identifier therefore equals the subject key identifier.
    pub fn derive(
        role: Role,
        issuer_public_key: &PublicKey,
        subject_public_key: &PublicKey,
        alt_names: &[AltName],
        path_length: Option<u8>,
    ) -> Result<ExtensionSet> {
        let policy = role.policy();
        if role == Role::Root && issuer_public_key != subject_public_key {
            return Err(CertChainError::policy(
                role,
                "a root certificate must be issued by its own key",
            ));
        }
        if !policy.is_ca && path_length.is_some() {
            return Err(CertChainError::policy(
                role,
                "path length constraint requires CA:TRUE",
            ));
        }
        let set = ExtensionSet {
            basic_constraints: BasicConstraints {
                is_ca: policy.is_ca,
                max_path_length: path_length,
            },
            key_usage: KeyUsage(policy.key_usage),
            extended_key_usage: policy.extended_key_usage.to_vec(),
            subject_alt_names: alt_names.to_vec(),
            subject_key_id: subject_public_key.key_identifier()?,
            authority_key_id: issuer_public_key.key_identifier()?,
        };
        set.validate(role)?;
        Ok(set)
    }

    /// Path length for a CA issued below a CA with `issuer_path_len`.
    ///
    /// The constraint must strictly decrease down the chain. An unconstrained
    /// issuer passes `requested` through unchanged.
    pub fn child_path_length(
        role: Role,
        issuer_path_len: Option<u8>,
        requested: Option<u8>,
    ) -> Result<Option<u8>> {
        match (issuer_path_len, requested) {
            (Some(0), _) => Err(CertChainError::policy(
                role,
                "issuer has pathLen 0 and may not sign certificate authorities",
            )),
            (Some(max), Some(req)) if req >= max => Err(CertChainError::policy(
                role,
                format!("requested pathLen {req} is not below the issuer's pathLen {max}"),
            )),
            (Some(_), Some(req)) => Ok(Some(req)),
            (Some(max), None) => Ok(Some(max - 1)),
            (None, requested) => Ok(requested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::test_keys;

    fn leaf_names() -> Vec<AltName> {
        vec![AltName::dns("localhost"), AltName::parse("127.0.0.1").unwrap()]
    }

    #[test]
    fn test_root_is_self_referential() {
        let key = test_keys::key(0).public_key();
        let set = ExtensionPolicy::derive(Role::Root, key, key, &[], Some(1)).unwrap();
        assert_eq!(
            set.basic_constraints,
            BasicConstraints {
                is_ca: true,
                max_path_length: Some(1)
            }
        );
        assert!(set.key_usage.contains(KeyUsages::KeyCertSign));
        assert!(set.key_usage.contains(KeyUsages::CRLSign));
        assert_eq!(set.authority_key_id, set.subject_key_id);
    }

    #[test]
    fn test_root_must_sign_itself() {
        let a = test_keys::key(0).public_key();
        let b = test_keys::key(1).public_key();
        assert!(ExtensionPolicy::derive(Role::Root, a, b, &[], Some(1)).is_err());
    }

    #[test]
    fn test_intermediate_uses_issuer_key_for_aki() {
        let root = test_keys::key(0).public_key();
        let intermediate = test_keys::key(1).public_key();
        let set =
            ExtensionPolicy::derive(Role::Intermediate, root, intermediate, &[], Some(0)).unwrap();
        assert_eq!(set.authority_key_id, root.key_identifier().unwrap());
        assert_eq!(set.subject_key_id, intermediate.key_identifier().unwrap());
        assert!(set.basic_constraints.is_ca);
        assert!(set.subject_alt_names.is_empty());
    }

    #[test]
    fn test_leaf_policy() {
        let issuer = test_keys::key(1).public_key();
        let subject = test_keys::key(2).public_key();
        let set = ExtensionPolicy::derive(Role::Leaf, issuer, subject, &leaf_names(), None).unwrap();
        assert!(!set.basic_constraints.is_ca);
        assert_eq!(set.basic_constraints.max_path_length, None);
        assert_eq!(
            set.key_usage,
            KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
        );
        assert_eq!(set.extended_key_usage, vec![ExtendedKeyUsageOption::ServerAuth]);
        assert_eq!(set.subject_alt_names, leaf_names());
    }

    #[test]
    fn test_leaf_without_alt_names_is_rejected() {
        let issuer = test_keys::key(1).public_key();
        let subject = test_keys::key(2).public_key();
        let err = ExtensionPolicy::derive(Role::Leaf, issuer, subject, &[], None).unwrap_err();
        assert!(matches!(
            err,
            CertChainError::PolicyViolation {
                role: Role::Leaf,
                ..
            }
        ));
    }

    #[test]
    fn test_ca_with_alt_names_is_rejected() {
        let key = test_keys::key(0).public_key();
        assert!(ExtensionPolicy::derive(Role::Root, key, key, &leaf_names(), Some(1)).is_err());
    }

    #[test]
    fn test_leaf_with_path_length_is_rejected() {
        let issuer = test_keys::key(1).public_key();
        let subject = test_keys::key(2).public_key();
        assert!(
            ExtensionPolicy::derive(Role::Leaf, issuer, subject, &leaf_names(), Some(0)).is_err()
        );
    }

    #[test]
    fn test_validate_rejects_inconsistent_sets() {
        let issuer = test_keys::key(1).public_key();
        let subject = test_keys::key(2).public_key();
        let leaf = ExtensionPolicy::derive(Role::Leaf, issuer, subject, &leaf_names(), None).unwrap();

        let mut cert_sign = leaf.clone();
        cert_sign.key_usage.0 |= KeyUsages::KeyCertSign;
        assert!(cert_sign.validate(Role::Leaf).is_err());

        let mut ca_leaf = leaf.clone();
        ca_leaf.basic_constraints.is_ca = true;
        assert!(ca_leaf.validate(Role::Leaf).is_err());

        let mut no_eku = leaf.clone();
        no_eku.extended_key_usage.clear();
        assert!(no_eku.validate(Role::Leaf).is_err());

        let root_key = test_keys::key(0).public_key();
        let mut ca = ExtensionPolicy::derive(Role::Root, root_key, root_key, &[], Some(1)).unwrap();
        ca.key_usage = KeyUsage(KeyUsages::CRLSign.into());
        assert!(ca.validate(Role::Root).is_err());
        ca.key_usage = KeyUsage(FlagSet::default());
        assert!(ca.validate(Role::Root).is_err());
    }

    #[test]
    fn test_params_round_trip() {
        let issuer = test_keys::key(1).public_key();
        let subject = test_keys::key(2).public_key();
        let set = ExtensionPolicy::derive(Role::Leaf, issuer, subject, &leaf_names(), None).unwrap();
        let params = set.to_params().unwrap();
        assert!(params[0].critical && params[1].critical);
        assert!(params[2..].iter().all(|p| !p.critical));
        assert_eq!(ExtensionSet::from_extensions(&params).unwrap(), set);
    }

    #[test]
    fn test_child_path_length() {
        let r = Role::Intermediate;
        assert_eq!(ExtensionPolicy::child_path_length(r, Some(1), None).unwrap(), Some(0));
        assert_eq!(ExtensionPolicy::child_path_length(r, Some(3), Some(1)).unwrap(), Some(1));
        assert_eq!(ExtensionPolicy::child_path_length(r, None, Some(4)).unwrap(), Some(4));
        assert_eq!(ExtensionPolicy::child_path_length(r, None, None).unwrap(), None);
        assert!(ExtensionPolicy::child_path_length(r, Some(0), None).is_err());
        assert!(ExtensionPolicy::child_path_length(r, Some(1), Some(1)).is_err());
    }
}
