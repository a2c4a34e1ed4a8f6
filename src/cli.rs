use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Command-line interface for the Saltmine tool.
///
/// Saltmine searches for Safe proxy salt nonces whose CREATE2 addresses match a vanity pattern,
/// checkpoints every hit, and deploys the hits on every configured network.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "saltmine",
    about = "Saltmine finds vanity Safe addresses and deploys them across chains."
)]
pub(crate) struct Saltmine {
    /// Verbosity level (0-4)
    #[arg(short, global = true, action = ArgAction::Count)]
    pub(crate) v: u8,

    /// Path to the JSON settings file.
    #[arg(long, global = true, default_value = "data/settings.json")]
    pub(crate) settings: PathBuf,

    /// Directory holding the checkpoint files.
    #[arg(long, global = true, default_value = "data/checkpoints")]
    pub(crate) checkpoints: PathBuf,

    /// Private key of the deploying account, used on every network.
    #[arg(long, global = true, env = "DEPLOYER_PRIVATE_KEY", hide_env_values = true)]
    pub(crate) private_key: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Subcommand)]
pub(crate) enum Command {
    /// Searches for salt nonces until the configured number of candidates is checkpointed.
    Search,

    /// Deploys every checkpointed candidate on every configured network.
    ///
    /// Candidates already deployed on a network are skipped, so this is safe to re-run.
    Deploy,

    /// Searches, then deploys.
    Run,
}

impl Command {
    pub(crate) const fn searches(self) -> bool {
        matches!(self, Self::Search | Self::Run)
    }

    pub(crate) const fn deploys(self) -> bool {
        matches!(self, Self::Deploy | Self::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Saltmine::try_parse_from(["saltmine", "search"]).unwrap();
        assert_eq!(cli.command, Command::Search);
        assert_eq!(cli.settings, PathBuf::from("data/settings.json"));
        assert_eq!(cli.checkpoints, PathBuf::from("data/checkpoints"));
        assert!(cli.command.searches() && !cli.command.deploys());
    }

    #[test]
    fn test_parse_global_options() {
        let cli = Saltmine::try_parse_from([
            "saltmine",
            "run",
            "--settings",
            "mainnet.json",
            "--private-key",
            "0x01",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Run);
        assert_eq!(cli.settings, PathBuf::from("mainnet.json"));
        assert_eq!(cli.private_key.as_deref(), Some("0x01"));
        assert!(cli.command.searches() && cli.command.deploys());
    }
}
