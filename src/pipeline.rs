//! Issuance pipeline.
//!
//! Runs the engine stages for one role at a time and hands every artifact to
//! an [`ArtifactStore`]. Later stages read their issuer back from the store,
//! so `root`, `intermediate` and `server` can also run as separate
//! invocations.

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::chain::CertificateChain;
use crate::config::{CaProfile, PkiConfig};
use crate::csr::CertificateSigningRequest;
use crate::error::{PipelineError, Stage, StageContext};
use crate::issuer::{self, Issuer, KeyIssuer};
use crate::key::KeyPair;
use crate::policy::{ExtensionPolicy, Role};
use crate::signer::CertificateSigner;
use crate::storage::{Artifact, ArtifactStore};

type StageResult<T> = std::result::Result<T, PipelineError>;

/// The output of one stage.
#[derive(Debug)]
pub struct IssuedCertificate {
    pub role: Role,
    pub key: KeyPair,
    /// Absent for the self-signed root.
    pub request: Option<CertificateSigningRequest>,
    pub certificate: Certificate,
}

/// All three stages of a full run.
#[derive(Debug)]
pub struct IssuedChain {
    pub root: IssuedCertificate,
    pub intermediate: IssuedCertificate,
    pub leaf: IssuedCertificate,
}

pub struct Pipeline<S: ArtifactStore> {
    config: PkiConfig,
    store: S,
    signer: CertificateSigner,
}

impl<S: ArtifactStore> Pipeline<S> {
    pub fn new(config: PkiConfig, store: S) -> Self {
        let signer = CertificateSigner::new(config.signature_algorithm);
        Self {
            config,
            store,
            signer,
        }
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues root, intermediate and leaf in sequence. Stops at the first
    /// failure; artifacts of completed stages stay in the store.
    pub fn run(&self) -> StageResult<IssuedChain> {
        let root = self.issue_root()?;
        let intermediate = self.issue_intermediate()?;
        let leaf = self.issue_leaf()?;
        tracing::info!(
            leaf = %leaf.certificate.serial_hex(),
            intermediate = %intermediate.certificate.serial_hex(),
            root = %root.certificate.serial_hex(),
            "Certificate chain complete"
        );
        Ok(IssuedChain {
            root,
            intermediate,
            leaf,
        })
    }

    /// Generates and self-signs the root CA.
    pub fn issue_root(&self) -> StageResult<IssuedCertificate> {
        let role = Role::Root;
        let _span = tracing::info_span!("issue", %role).entered();

        let (profile, key, subject) = self.prepare(role)?;
        let extensions = ExtensionPolicy::derive(
            role,
            key.public_key(),
            key.public_key(),
            &profile.alt_names,
            profile.path_length,
        )
        .stage(role, Stage::DerivePolicy)?;

        let issuer = KeyIssuer::new(&subject, &key, profile.path_length);
        let certificate = self
            .signer
            .sign(
                role,
                &subject,
                key.public_key(),
                &issuer,
                &extensions,
                &self.config.validity_policy(&profile),
            )
            .stage(role, Stage::Sign)?;

        let issued = IssuedCertificate {
            role,
            key,
            request: None,
            certificate,
        };
        self.persist(&issued)?;
        Ok(issued)
    }

    /// Issues the intermediate CA from a request signed by the stored root.
    pub fn issue_intermediate(&self) -> StageResult<IssuedCertificate> {
        let issued = self.issue_from_request(Role::Intermediate)?;
        let _span = tracing::info_span!("issue", role = %issued.role).entered();
        self.persist(&issued)?;
        Ok(issued)
    }

    /// Issues the server certificate and writes the chain file.
    ///
    /// Nothing of the server stage is stored unless the new certificate
    /// chains up to the stored intermediate and root.
    pub fn issue_leaf(&self) -> StageResult<IssuedCertificate> {
        let role = Role::Leaf;
        let issued = self.issue_from_request(role)?;
        let _span = tracing::info_span!("issue", %role).entered();

        let intermediate = self.load_certificate(role, Role::Intermediate)?;
        let root = self.load_certificate(role, Role::Root)?;
        let chain = CertificateChain::new(issued.certificate.clone(), intermediate, root)
            .stage(role, Stage::AssembleChain)?;
        chain.verify().stage(role, Stage::AssembleChain)?;
        let pem = chain.to_pem().stage(role, Stage::AssembleChain)?;
        self.persist(&issued)?;
        self.store
            .save(Artifact::Chain, pem.as_bytes())
            .stage(role, Stage::Persist)?;
        tracing::info!("Wrote certificate chain");
        Ok(issued)
    }

    /// Builds, signs and returns the certificate of `role` without storing it.
    fn issue_from_request(&self, role: Role) -> StageResult<IssuedCertificate> {
        let _span = tracing::info_span!("issue", %role).entered();

        let (profile, key, subject) = self.prepare(role)?;
        let request = CertificateSigningRequest::build(&subject, &key, &profile.alt_names)
            .stage(role, Stage::BuildRequest)?;

        let issuer_role = role.issuer_role();
        let issuer =
            issuer::load_issuer(&self.store, issuer_role).stage(role, Stage::LoadIssuer)?;
        tracing::debug!(issuer = %issuer.issuer_name(), "Loaded issuer");

        let path_length = if role.policy().is_ca {
            ExtensionPolicy::child_path_length(
                role,
                issuer.path_len_constraint(),
                profile.path_length,
            )
            .stage(role, Stage::DerivePolicy)?
        } else {
            profile.path_length
        };
        let extensions = ExtensionPolicy::derive(
            role,
            issuer.public_key(),
            key.public_key(),
            &profile.alt_names,
            path_length,
        )
        .stage(role, Stage::DerivePolicy)?;

        let certificate = self
            .signer
            .sign_request(
                role,
                &request,
                &issuer,
                &extensions,
                &self.config.validity_policy(&profile),
            )
            .stage(role, Stage::Sign)?;

        Ok(IssuedCertificate {
            role,
            key,
            request: Some(request),
            certificate,
        })
    }

    /// Profile, fresh key pair and subject name for `role`.
    fn prepare(&self, role: Role) -> StageResult<(CaProfile, KeyPair, DistinguishedName)> {
        let profile = self.config.profile(role).stage(role, Stage::Profile)?;
        tracing::info!(bits = profile.key_bits, "Generating key pair");
        let key = KeyPair::generate(profile.key_bits).stage(role, Stage::GenerateKey)?;
        let subject =
            DistinguishedName::build(&profile.subject).stage(role, Stage::BuildName)?;
        Ok((profile, key, subject))
    }

    fn load_certificate(&self, role: Role, of: Role) -> StageResult<Certificate> {
        issuer::read_text(&self.store, Artifact::Certificate(of))
            .and_then(|pem| Certificate::from_pem(&pem))
            .stage(role, Stage::AssembleChain)
    }

    /// Persists key, request and certificate, in that order.
    fn persist(&self, issued: &IssuedCertificate) -> StageResult<()> {
        let role = issued.role;
        let key_pem = issued.key.to_pkcs1_pem().stage(role, Stage::Persist)?;
        self.store
            .save(Artifact::Key(role), key_pem.as_bytes())
            .stage(role, Stage::Persist)?;
        if let Some(request) = &issued.request {
            let pem = request.to_pem().stage(role, Stage::Persist)?;
            self.store
                .save(Artifact::Request(role), pem.as_bytes())
                .stage(role, Stage::Persist)?;
        }
        let certificate = &issued.certificate;
        let cert_pem = certificate.to_pem().stage(role, Stage::Persist)?;
        self.store
            .save(Artifact::Certificate(role), cert_pem.as_bytes())
            .stage(role, Stage::Persist)?;

        tracing::info!(
            serial = %certificate.serial_hex(),
            subject = %certificate.subject().map(|dn| dn.to_string()).unwrap_or_default(),
            "Issued certificate"
        );
        Ok(())
    }
}
