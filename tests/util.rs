#![allow(dead_code)]

use std::sync::OnceLock;

use certchain::config::PkiConfig;
use certchain::pipeline::{IssuedChain, Pipeline};
use certchain::policy::Role;
use certchain::storage::{Artifact, ArtifactStore, MemoryStore};

/// The default profiles with 2048-bit CA keys, which keeps key generation
/// tolerable in debug builds.
pub fn fast_config() -> PkiConfig {
    config_with("")
}

/// Parses `toml` and shrinks any CA key size it leaves unset to 2048 bits.
pub fn config_with(toml: &str) -> PkiConfig {
    let mut config = PkiConfig::from_toml(toml).unwrap();
    for profile in [&mut config.root, &mut config.intermediate] {
        profile.key_bits.get_or_insert(2048);
    }
    config
}

pub struct SharedChain {
    pub store: MemoryStore,
    pub chain: IssuedChain,
}

/// One full run, shared by every test that only inspects its output.
pub fn shared_chain() -> &'static SharedChain {
    static CHAIN: OnceLock<SharedChain> = OnceLock::new();
    CHAIN.get_or_init(|| {
        let store = MemoryStore::new();
        let chain = Pipeline::new(fast_config(), &store).run().unwrap();
        SharedChain { store, chain }
    })
}

/// A fresh store holding copies of `artifacts` from `source`.
pub fn copy_artifacts(source: &MemoryStore, artifacts: &[Artifact]) -> MemoryStore {
    let store = MemoryStore::new();
    for &artifact in artifacts {
        store.save(artifact, &source.load(artifact).unwrap()).unwrap();
    }
    store
}

pub fn issuer_material(role: Role) -> [Artifact; 2] {
    [Artifact::Key(role), Artifact::Certificate(role)]
}
