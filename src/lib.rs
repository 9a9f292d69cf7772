//! # certchain - Three-Tier X.509 Chain Issuance
//!
//! certchain issues a complete TLS trust chain with the RustCrypto libraries:
//! a self-signed root CA, an intermediate CA signed by the root, and a server
//! certificate signed by the intermediate. There is no dependency on ring or
//! OpenSSL.
//!
//! ## Keys and Signatures
//!
//! - **RSA** keys of at least 2048 bits (the defaults are 4096 for the CAs and
//!   2048 for the server)
//! - **PKCS#1 v1.5** signatures with SHA-256 (default), SHA-384 or SHA-512
//!
//! ## Extension Policy
//!
//! Every certificate gets its extensions from a fixed role table (see
//! [`policy`]). A root or intermediate is a CA allowed to sign certificates
//! and CRLs; the server certificate is an end entity for `serverAuth` and must
//! carry at least one subject alternative name. Path lengths shrink down the
//! chain. The whole set is validated before anything is signed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certchain::{config::PkiConfig, pipeline::Pipeline, storage::FileStore};
//!
//! # fn main() -> Result<(), certchain::error::PipelineError> {
//! let config = PkiConfig::default();
//! let store = FileStore::new(&config.output_dir);
//! let chain = Pipeline::new(config, store).run()?;
//!
//! println!("server serial {}", chain.leaf.certificate.serial_hex());
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing Without the Pipeline
//!
//! ```rust,no_run
//! use certchain::{
//!     cert::params::{DistinguishedName, NameFields, ValidityPolicy},
//!     issuer::KeyIssuer,
//!     key::KeyPair,
//!     policy::{ExtensionPolicy, Role},
//!     signer::CertificateSigner,
//! };
//!
//! # fn main() -> Result<(), certchain::error::CertChainError> {
//! let key = KeyPair::generate(4096)?;
//! let subject = DistinguishedName::build(
//!     &NameFields::builder()
//!         .organization("Example Corp".to_string())
//!         .common_name("Example Root".to_string())
//!         .build(),
//! )?;
//! let extensions =
//!     ExtensionPolicy::derive(Role::Root, key.public_key(), key.public_key(), &[], Some(1))?;
//! let root = CertificateSigner::default().sign(
//!     Role::Root,
//!     &subject,
//!     key.public_key(),
//!     &KeyIssuer::new(&subject, &key, Some(1)),
//!     &extensions,
//!     &ValidityPolicy::for_days(365),
//! )?;
//! println!("{}", root.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Engine calls return [`error::CertChainError`]. The pipeline wraps it in
//! [`error::PipelineError`], which also names the role and the stage that
//! failed:
//!
//! ```rust
//! use certchain::{cert::Certificate, error::CertChainError};
//!
//! match Certificate::from_pem("invalid pem data") {
//!     Ok(_) => println!("Certificate parsed"),
//!     Err(CertChainError::Serialization(msg)) => println!("Failed to decode: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: RSA key generation, PEM import/export and signing
//! - [`cert`]: Certificates, names, validity and X.509 extensions
//! - [`csr`]: PKCS#10 certificate signing requests
//! - [`policy`]: Role table and extension set validation
//! - [`issuer`]: Issuer trait and loading CA material from storage
//! - [`signer`]: Certificate signing
//! - [`chain`]: Chain assembly and verification
//! - [`storage`]: Artifact persistence
//! - [`config`]: TOML configuration
//! - [`pipeline`]: The root → intermediate → server sequence
//! - [`error`]: Error types

pub mod cert;
pub mod chain;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod pipeline;
pub mod policy;
pub mod serial;
pub mod signer;
pub mod storage;
pub mod tbs_certificate;
