use std::path::PathBuf;

use certchain::cert::extensions::AltName;
use certchain::cert::params::NameFields;
use certchain::config::PkiConfig;
use clap::{Parser, Subcommand};

/// Issue a root CA, an intermediate CA and a TLS server certificate.
#[derive(Debug, Parser)]
#[command(name = "certchain", version)]
pub struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Output directory, overriding `output_dir` from the configuration.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Log filter, used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info", env = "CERTCHAIN_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Issue root, intermediate and server certificates in one run.
    All(ServerOverrides),
    /// Issue only the self-signed root CA.
    Root,
    /// Issue the intermediate CA from the stored root.
    Intermediate,
    /// Issue the server certificate from the stored intermediate and
    /// write the chain file.
    Server(ServerOverrides),
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct ServerOverrides {
    /// Subject alternative name; IP literals become iPAddress entries.
    /// Repeat for several names.
    #[arg(long = "san", value_parser = parse_san)]
    pub san: Vec<AltName>,

    /// Common name of the server certificate.
    #[arg(long)]
    pub common_name: Option<String>,
}

impl ServerOverrides {
    pub fn apply(&self, config: &mut PkiConfig) {
        if !self.san.is_empty() {
            config.leaf.alt_names = Some(self.san.iter().map(ToString::to_string).collect());
        }
        if let Some(common_name) = &self.common_name {
            config
                .leaf
                .subject
                .get_or_insert_with(NameFields::default)
                .common_name = common_name.clone();
        }
    }
}

impl Command {
    pub fn apply(&self, config: &mut PkiConfig) {
        match self {
            Command::All(overrides) | Command::Server(overrides) => overrides.apply(config),
            Command::Root | Command::Intermediate => {}
        }
    }
}

fn parse_san(host: &str) -> Result<AltName, String> {
    AltName::parse(host).map_err(|e| e.to_string())
}
