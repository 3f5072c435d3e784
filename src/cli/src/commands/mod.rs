//! CLI command definitions and dispatch.

mod copy;
mod export;
mod inspect;
mod layer;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use regferry_core::{DigestAlgorithm, FerryConfig, IntegrityPolicy, Protocol};
use regferry_transfer::{ImageReference, Registry, RegistryAuth, RegistryClient};

/// Regferry - copy registry images and export them for `docker load`.
#[derive(Parser)]
#[command(name = "regferry", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command; they override the config file and
/// `REGFERRY_*` environment variables.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Digest algorithm for recomputed layer and config digests (sha256, sha512)
    #[arg(long, global = true)]
    pub digest_algorithm: Option<DigestAlgorithm>,

    /// What to do when fetched content does not match its digest (warn, enforce)
    #[arg(long, global = true)]
    pub integrity: Option<IntegrityPolicy>,

    /// Talk to registries over plain HTTP
    #[arg(long, global = true)]
    pub http: bool,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Copy an image between registries or repositories
    Copy(copy::CopyArgs),
    /// Export an image as a tar archive loadable by `docker load`
    Export(export::ExportArgs),
    /// Print an image's configuration as JSON
    Inspect(inspect::InspectArgs),
    /// Work with individual layer blobs
    Layer(layer::LayerArgs),
}

impl GlobalArgs {
    /// Resolve the effective configuration.
    pub fn config(&self) -> Result<FerryConfig, Box<dyn std::error::Error>> {
        let mut config = FerryConfig::load()?;
        if let Some(alg) = self.digest_algorithm {
            config.digest_algorithm = alg;
        }
        if let Some(policy) = self.integrity {
            config.integrity = policy;
        }
        if self.http {
            config.protocol = Protocol::Http;
        }
        Ok(config)
    }
}

/// Registry client for `config`, authenticated from the environment.
pub(crate) fn registry(config: &FerryConfig) -> Arc<dyn Registry> {
    Arc::new(RegistryClient::from_config(config, RegistryAuth::from_env()))
}

pub(crate) fn parse_reference(s: &str) -> Result<ImageReference, Box<dyn std::error::Error>> {
    Ok(ImageReference::parse(s)?)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.global.config()?;
    match cli.command {
        Command::Copy(args) => copy::execute(args, config).await,
        Command::Export(args) => export::execute(args, config).await,
        Command::Inspect(args) => inspect::execute(args, config).await,
        Command::Layer(args) => layer::execute(args, config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_with_flags() {
        let cli = Cli::try_parse_from([
            "regferry",
            "export",
            "nginx:1.25",
            "-o",
            "nginx.tar",
            "--digest-algorithm",
            "sha512",
            "--integrity",
            "enforce",
        ])
        .unwrap();
        assert_eq!(cli.global.digest_algorithm, Some(DigestAlgorithm::Sha512));
        assert_eq!(cli.global.integrity, Some(IntegrityPolicy::Enforce));
        assert!(matches!(cli.command, Command::Export(_)));
    }

    #[test]
    fn test_parse_layer_pull() {
        let cli = Cli::try_parse_from([
            "regferry",
            "--http",
            "layer",
            "pull",
            "localhost:5000/app:v1",
            "sha256:0000000000000000000000000000000000000000000000000000000000000000",
        ])
        .unwrap();
        assert!(cli.global.http);
        assert!(matches!(cli.command, Command::Layer(_)));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let result = Cli::try_parse_from(["regferry", "--digest-algorithm", "md5", "inspect", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let global = GlobalArgs {
            digest_algorithm: Some(DigestAlgorithm::Sha512),
            integrity: Some(IntegrityPolicy::Enforce),
            http: true,
        };
        let config = global.config().unwrap();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha512);
        assert_eq!(config.integrity, IntegrityPolicy::Enforce);
        assert_eq!(config.protocol, Protocol::Http);
    }
}
