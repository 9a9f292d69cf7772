use crate::cert::Certificate;
use crate::cert::extensions::KeyUsages;
use crate::cert::params::DistinguishedName;
use crate::error::{CertChainError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::policy::Role;
use crate::storage::{Artifact, ArtifactStore};

/// Represents an entity capable of issuing certificates.
///
/// The signer only ever sees this trait; whether the issuer is the subject
/// itself (a root) or a CA loaded from storage does not matter to it.
pub trait Issuer {
    /// Returns the distinguished name written into the issuer field.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the public key the issuer's certificate vouches for.
    ///
    /// For a loaded CA this comes from the certificate, not from the private
    /// key, so that a mismatched pair can be detected before signing.
    fn public_key(&self) -> &PublicKey;

    /// The issuer's own basicConstraints pathLen, if any.
    fn path_len_constraint(&self) -> Option<u8>;
}

/// An issuer held in memory as a name and a key pair.
///
/// The pipeline uses it to self-sign the root, passing the root's own
/// subject and key. Any other name and key can be paired the same way.
#[derive(Debug)]
pub struct KeyIssuer<'a> {
    name: &'a DistinguishedName,
    key: &'a KeyPair,
    path_length: Option<u8>,
}

impl<'a> KeyIssuer<'a> {
    pub fn new(name: &'a DistinguishedName, key: &'a KeyPair, path_length: Option<u8>) -> Self {
        Self {
            name,
            key,
            path_length,
        }
    }
}

impl Issuer for KeyIssuer<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    fn path_len_constraint(&self) -> Option<u8> {
        self.path_length
    }
}

/// A CA certificate together with its private key.
#[derive(Debug)]
pub struct LoadedIssuer {
    role: Role,
    certificate: Certificate,
    key: KeyPair,
    name: DistinguishedName,
    public: PublicKey,
    path_length: Option<u8>,
}

impl LoadedIssuer {
    /// Pairs a CA certificate with a private key.
    ///
    /// Fails with [`CertChainError::IssuerLoad`] when the certificate cannot be
    /// read or is not a CA. The key is not compared with the certificate here.
    pub fn new(role: Role, certificate: Certificate, key: KeyPair) -> Result<Self> {
        let artifact = Artifact::Certificate(role);
        let load_error = |reason: String| CertChainError::IssuerLoad {
            artifact: artifact.to_string(),
            reason,
        };

        let name = certificate.subject().map_err(|e| load_error(e.to_string()))?;
        let public = certificate
            .public_key()
            .map_err(|e| load_error(e.to_string()))?;
        let extensions = certificate
            .extensions()
            .map_err(|e| load_error(e.to_string()))?;
        if !extensions.basic_constraints.is_ca {
            return Err(load_error(format!(
                "`{name}` is not a certificate authority"
            )));
        }
        if !extensions.key_usage.contains(KeyUsages::KeyCertSign) {
            return Err(load_error(format!(
                "`{name}` may not sign certificates (keyCertSign missing)"
            )));
        }

        Ok(Self {
            role,
            certificate,
            key,
            name,
            public,
            path_length: extensions.basic_constraints.max_path_length,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl Issuer for LoadedIssuer {
    fn issuer_name(&self) -> &DistinguishedName {
        &self.name
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn public_key(&self) -> &PublicKey {
        &self.public
    }

    fn path_len_constraint(&self) -> Option<u8> {
        self.path_length
    }
}

/// Loads the private key and certificate stored for `role`.
///
/// Missing or malformed material fails with [`CertChainError::IssuerLoad`].
pub fn load_issuer(store: &impl ArtifactStore, role: Role) -> Result<LoadedIssuer> {
    let key_pem = read_text(store, Artifact::Key(role))?;
    let key = KeyPair::from_pem(&key_pem).map_err(|e| CertChainError::IssuerLoad {
        artifact: Artifact::Key(role).to_string(),
        reason: e.to_string(),
    })?;

    let cert_pem = read_text(store, Artifact::Certificate(role))?;
    let certificate = Certificate::from_pem(&cert_pem).map_err(|e| CertChainError::IssuerLoad {
        artifact: Artifact::Certificate(role).to_string(),
        reason: e.to_string(),
    })?;

    LoadedIssuer::new(role, certificate, key)
}

/// Reads a PEM artifact written by a previous stage.
pub(crate) fn read_text(store: &impl ArtifactStore, artifact: Artifact) -> Result<String> {
    let load_error = |reason: String| CertChainError::IssuerLoad {
        artifact: artifact.to_string(),
        reason,
    };
    let bytes = store.load(artifact).map_err(|e| load_error(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| load_error(e.to_string()))
}
