//! Persistence adapter.
//!
//! The engine only sees [`ArtifactStore`]; the filesystem layout lives in
//! [`FileStore`] and tests use [`MemoryStore`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CertChainError, Result};
use crate::policy::Role;

/// A logical artifact produced or consumed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    Key(Role),
    Request(Role),
    Certificate(Role),
    Chain,
}

impl Artifact {
    /// Private keys get restrictive permissions.
    pub fn is_secret(self) -> bool {
        matches!(self, Artifact::Key(_))
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Key(role) => write!(f, "{role} private key"),
            Artifact::Request(role) => write!(f, "{role} certificate request"),
            Artifact::Certificate(role) => write!(f, "{role} certificate"),
            Artifact::Chain => f.write_str("certificate chain"),
        }
    }
}

/// Load/save boundary consumed by the pipeline.
pub trait ArtifactStore {
    /// Returns the stored bytes, or [`CertChainError::Storage`] when absent.
    fn load(&self, artifact: Artifact) -> Result<Vec<u8>>;

    fn save(&self, artifact: Artifact, contents: &[u8]) -> Result<()>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn load(&self, artifact: Artifact) -> Result<Vec<u8>> {
        (**self).load(artifact)
    }

    fn save(&self, artifact: Artifact, contents: &[u8]) -> Result<()> {
        (**self).save(artifact, contents)
    }
}

fn storage_error(artifact: Artifact, reason: impl fmt::Display) -> CertChainError {
    CertChainError::Storage {
        artifact: artifact.to_string(),
        reason: reason.to_string(),
    }
}

/// Stores artifacts under a base directory:
///
/// ```text
/// root/root_ca.key              root/root_ca.pem
/// intermediate/intermediate_ca.key
/// intermediate/intermediate_ca.csr
/// intermediate/intermediate_ca.pem
/// server/server.key  server/server.csr  server/server.crt  server/chain.pem
/// ```
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path_for(&self, artifact: Artifact) -> PathBuf {
        let (dir, file) = match artifact {
            Artifact::Key(Role::Root) => ("root", "root_ca.key"),
            Artifact::Request(Role::Root) => ("root", "root_ca.csr"),
            Artifact::Certificate(Role::Root) => ("root", "root_ca.pem"),
            Artifact::Key(Role::Intermediate) => ("intermediate", "intermediate_ca.key"),
            Artifact::Request(Role::Intermediate) => ("intermediate", "intermediate_ca.csr"),
            Artifact::Certificate(Role::Intermediate) => ("intermediate", "intermediate_ca.pem"),
            Artifact::Key(Role::Leaf) => ("server", "server.key"),
            Artifact::Request(Role::Leaf) => ("server", "server.csr"),
            Artifact::Certificate(Role::Leaf) => ("server", "server.crt"),
            Artifact::Chain => ("server", "chain.pem"),
        };
        self.base.join(dir).join(file)
    }
}

impl ArtifactStore for FileStore {
    fn load(&self, artifact: Artifact) -> Result<Vec<u8>> {
        let path = self.path_for(artifact);
        std::fs::read(&path).map_err(|e| storage_error(artifact, format!("{}: {e}", path.display())))
    }

    /// Writes to a temporary file next to the target and renames it into
    /// place, so an aborted run never leaves a truncated artifact behind.
    fn save(&self, artifact: Artifact, contents: &[u8]) -> Result<()> {
        let path = self.path_for(artifact);
        let dir = path
            .parent()
            .ok_or_else(|| storage_error(artifact, "artifact path has no parent directory"))?;
        std::fs::create_dir_all(dir).map_err(|e| storage_error(artifact, e))?;

        let mut staged =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| storage_error(artifact, e))?;
        staged
            .write_all(contents)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| storage_error(artifact, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = if artifact.is_secret() { 0o600 } else { 0o644 };
            std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(mode))
                .map_err(|e| storage_error(artifact, e))?;
        }

        staged
            .persist(&path)
            .map_err(|e| storage_error(artifact, e.error))?;
        tracing::debug!(%artifact, path = %path.display(), bytes = contents.len(), "Saved artifact");
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<BTreeMap<Artifact, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, artifact: Artifact) -> bool {
        self.artifacts
            .lock()
            .map(|map| map.contains_key(&artifact))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryStore {
    fn load(&self, artifact: Artifact) -> Result<Vec<u8>> {
        let map = self
            .artifacts
            .lock()
            .map_err(|e| storage_error(artifact, e))?;
        map.get(&artifact)
            .cloned()
            .ok_or_else(|| storage_error(artifact, "not found"))
    }

    fn save(&self, artifact: Artifact, contents: &[u8]) -> Result<()> {
        let mut map = self
            .artifacts
            .lock()
            .map_err(|e| storage_error(artifact, e))?;
        map.insert(artifact, contents.to_vec());
        Ok(())
    }
}
