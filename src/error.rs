//! Error types for the issuance engine and the pipeline.

use thiserror::Error;

use crate::policy::Role;

/// Result type used throughout the issuance engine.
pub type Result<T, E = CertChainError> = std::result::Result<T, E>;

/// Represents errors that can occur while issuing a certificate chain.
///
/// Every variant is fatal for the current run. Nothing in the engine retries.
#[derive(Debug, Error, Clone)]
pub enum CertChainError {
    /// Key generation failed or the requested size is below the safety floor.
    #[error("Key generation error: {0}")]
    KeyGen(String),

    /// The distinguished name input is invalid.
    #[error("Invalid distinguished name: {0}")]
    NameBuild(String),

    /// A subject alternative name cannot be encoded.
    #[error("Invalid subject alternative name: {0}")]
    InvalidAltName(String),

    /// The certificate signing request could not be signed, or its
    /// self-signature does not verify.
    #[error("Certificate request signing error: {0}")]
    CsrSign(String),

    /// Issuer material is missing or corrupt.
    #[error("Failed to load issuer {artifact}: {reason}")]
    IssuerLoad { artifact: String, reason: String },

    /// The issuer private key does not belong to the issuer certificate.
    #[error("Private key of issuer `{issuer}` does not match its certificate public key")]
    KeyMismatch { issuer: String },

    /// The extension set is illegal for the declared role.
    #[error("Extension policy violated for {role} certificate: {reason}")]
    PolicyViolation { role: Role, reason: String },

    /// The certificate signing operation failed.
    #[error("Certificate signing error: {0}")]
    Sign(String),

    /// Adjacent certificates in a chain do not link up.
    #[error("Broken chain link {link}: issuer `{issuer}` does not match subject `{subject}`")]
    ChainConsistency {
        link: &'static str,
        issuer: String,
        subject: String,
    },

    /// Encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The persistence adapter failed to read or write an artifact.
    #[error("Storage error for {artifact}: {reason}")]
    Storage { artifact: String, reason: String },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CertChainError {
    pub(crate) fn policy(role: Role, reason: impl Into<String>) -> Self {
        CertChainError::PolicyViolation {
            role,
            reason: reason.into(),
        }
    }
}

impl From<der::Error> for CertChainError {
    fn from(err: der::Error) -> Self {
        CertChainError::Serialization(err.to_string())
    }
}

impl From<pem::PemError> for CertChainError {
    fn from(err: pem::PemError) -> Self {
        CertChainError::Serialization(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CertChainError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CertChainError::Serialization(err.to_string())
    }
}

impl From<pkcs8::Error> for CertChainError {
    fn from(err: pkcs8::Error) -> Self {
        CertChainError::Serialization(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CertChainError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CertChainError::Serialization(err.to_string())
    }
}

/// The pipeline step during which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Profile,
    GenerateKey,
    BuildName,
    BuildRequest,
    LoadIssuer,
    DerivePolicy,
    Sign,
    AssembleChain,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Profile => "profile resolution",
            Stage::GenerateKey => "key generation",
            Stage::BuildName => "name building",
            Stage::BuildRequest => "request building",
            Stage::LoadIssuer => "issuer loading",
            Stage::DerivePolicy => "extension policy",
            Stage::Sign => "signing",
            Stage::AssembleChain => "chain assembly",
            Stage::Persist => "persistence",
        };
        f.write_str(name)
    }
}

/// A [`CertChainError`] tagged with the role and stage it happened in.
#[derive(Debug, Error, Clone)]
#[error("{role} certificate failed during {stage}")]
pub struct PipelineError {
    pub role: Role,
    pub stage: Stage,
    #[source]
    pub source: CertChainError,
}

/// Attaches pipeline context to a fallible engine call.
pub(crate) trait StageContext<T> {
    fn stage(self, role: Role, stage: Stage) -> std::result::Result<T, PipelineError>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, role: Role, stage: Stage) -> std::result::Result<T, PipelineError> {
        self.map_err(|source| PipelineError {
            role,
            stage,
            source,
        })
    }
}
