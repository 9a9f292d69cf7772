//! Trust chain assembly.

use crate::cert::Certificate;
use crate::error::{CertChainError, Result};
use crate::pem_utils;

/// Leaf, intermediate and root, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    pub leaf: Certificate,
    pub intermediate: Certificate,
    pub root: Certificate,
}

impl CertificateChain {
    /// Builds a chain after checking that adjacent names link up.
    pub fn new(leaf: Certificate, intermediate: Certificate, root: Certificate) -> Result<Self> {
        check_link("leaf -> intermediate", &leaf, &intermediate)?;
        check_link("intermediate -> root", &intermediate, &root)?;
        Ok(Self {
            leaf,
            intermediate,
            root,
        })
    }

    pub fn certificates(&self) -> [&Certificate; 3] {
        [&self.leaf, &self.intermediate, &self.root]
    }

    /// Concatenated PEM blocks: leaf, intermediate, root.
    pub fn to_pem(&self) -> Result<String> {
        let mut out = String::new();
        for cert in self.certificates() {
            out.push_str(&cert.to_pem()?);
        }
        Ok(out)
    }

    /// Verifies every signature along the chain, including the root's
    /// self-signature.
    pub fn verify(&self) -> Result<()> {
        let root_key = self.root.public_key()?;
        if !self.root.is_self_issued() {
            return Err(CertChainError::ChainConsistency {
                link: "root",
                issuer: display_issuer(&self.root),
                subject: display_subject(&self.root),
            });
        }
        self.root.verify_signature(&root_key)?;
        self.intermediate.verify_signature(&root_key)?;
        self.leaf
            .verify_signature(&self.intermediate.public_key()?)?;
        Ok(())
    }
}

/// Checks the chain links and returns the PEM chain file contents.
pub fn assemble(
    leaf: &Certificate,
    intermediate: &Certificate,
    root: &Certificate,
) -> Result<Vec<u8>> {
    let chain = CertificateChain::new(leaf.clone(), intermediate.clone(), root.clone())?;
    Ok(chain.to_pem()?.into_bytes())
}

/// Parses a PEM chain file back into its certificates, in file order.
pub fn split_pem(pem_str: &str) -> Result<Vec<Certificate>> {
    pem_utils::pem_blocks(pem_str, pem_utils::CERTIFICATE_LABEL)?
        .iter()
        .map(|der| Certificate::from_der(der))
        .collect()
}

fn check_link(link: &'static str, child: &Certificate, parent: &Certificate) -> Result<()> {
    if child.issuer_name() == parent.subject_name() {
        return Ok(());
    }
    Err(CertChainError::ChainConsistency {
        link,
        issuer: display_issuer(child),
        subject: display_subject(parent),
    })
}

fn display_issuer(cert: &Certificate) -> String {
    cert.issuer()
        .map(|dn| dn.to_string())
        .unwrap_or_else(|_| cert.issuer_name().to_string())
}

fn display_subject(cert: &Certificate) -> String {
    cert.subject()
        .map(|dn| dn.to_string())
        .unwrap_or_else(|_| cert.subject_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::AltName;
    use crate::cert::params::{DistinguishedName, NameFields, ValidityPolicy};
    use crate::issuer::KeyIssuer;
    use crate::key::{KeyPair, test_keys};
    use crate::policy::{ExtensionPolicy, Role};
    use crate::signer::CertificateSigner;

    fn name(common_name: &str) -> DistinguishedName {
        DistinguishedName::build(
            &NameFields::builder()
                .organization("Elder".to_string())
                .common_name(common_name.to_string())
                .build(),
        )
        .unwrap()
    }

    fn issue(
        role: Role,
        subject: &DistinguishedName,
        subject_key: &KeyPair,
        issuer_name: &DistinguishedName,
        issuer_key: &KeyPair,
    ) -> Certificate {
        let (alt_names, path_length) = match role {
            Role::Leaf => (vec![AltName::dns("localhost")], None),
            Role::Intermediate => (vec![], Some(0)),
            Role::Root => (vec![], Some(1)),
        };
        let extensions = ExtensionPolicy::derive(
            role,
            issuer_key.public_key(),
            subject_key.public_key(),
            &alt_names,
            path_length,
        )
        .unwrap();
        CertificateSigner::default()
            .sign(
                role,
                subject,
                subject_key.public_key(),
                &KeyIssuer::new(issuer_name, issuer_key, None),
                &extensions,
                &ValidityPolicy::default(),
            )
            .unwrap()
    }

    fn chain() -> (Certificate, Certificate, Certificate) {
        let (root_key, intermediate_key, leaf_key) =
            (test_keys::key(0), test_keys::key(1), test_keys::key(2));
        let (root_name, intermediate_name, leaf_name) =
            (name("Root"), name("Intermediate"), name("localhost"));
        let root = issue(Role::Root, &root_name, root_key, &root_name, root_key);
        let intermediate = issue(
            Role::Intermediate,
            &intermediate_name,
            intermediate_key,
            &root_name,
            root_key,
        );
        let leaf = issue(
            Role::Leaf,
            &leaf_name,
            leaf_key,
            &intermediate_name,
            intermediate_key,
        );
        (leaf, intermediate, root)
    }

    #[test]
    fn test_assemble_orders_leaf_first() {
        let (leaf, intermediate, root) = chain();
        let pem = String::from_utf8(assemble(&leaf, &intermediate, &root).unwrap()).unwrap();
        let parsed = split_pem(&pem).unwrap();
        assert_eq!(parsed, vec![leaf, intermediate, root]);
    }

    #[test]
    fn test_chain_verifies() {
        let (leaf, intermediate, root) = chain();
        CertificateChain::new(leaf, intermediate, root)
            .unwrap()
            .verify()
            .unwrap();
    }

    #[test]
    fn test_swapped_certificates_break_the_chain() {
        let (leaf, intermediate, root) = chain();
        let err = assemble(&leaf, &root, &intermediate).unwrap_err();
        assert!(matches!(
            err,
            CertChainError::ChainConsistency {
                link: "leaf -> intermediate",
                ..
            }
        ));
        let err = assemble(&intermediate, &intermediate, &root).unwrap_err();
        assert!(matches!(err, CertChainError::ChainConsistency { .. }));
    }

    #[test]
    fn test_verify_detects_wrong_signer() {
        let (leaf, intermediate, _) = chain();
        let forged_root = issue(
            Role::Root,
            &name("Root"),
            test_keys::key(3),
            &name("Root"),
            test_keys::key(3),
        );
        let chain = CertificateChain::new(leaf, intermediate, forged_root).unwrap();
        assert!(chain.verify().is_err());
    }
}
