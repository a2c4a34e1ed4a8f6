mod candidate;
mod checkpoint;
mod cli;
mod deploy;
mod derive;
mod error;
mod initializer;
mod mine;
mod network;
mod preflight;
mod settings;
mod vanity;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Result, anyhow, bail};
use clap::Parser;
use tracing::{Level, error, info, warn};
use {
    candidate::{CandidateTemplate, DeploymentCandidate},
    checkpoint::CheckpointStore,
    cli::Saltmine,
    deploy::DeploymentOrchestrator,
    derive::AddressDeriver,
    error::{DeployError, PreflightError},
    initializer::{AbiInitializer, InitializerMode, InitializerSource, SimulatedInitializer},
    mine::VanitySearcher,
    network::{NetworkTarget, RpcNetwork},
    settings::{Config, Settings},
};

/// Entry point for the Saltmine vanity Safe search and deployment tool.
///
/// Loads and validates the settings, checks every network it is going to need, then runs the
/// search and/or deployment phase selected on the command line.
///
/// # Error
///
/// Exits with status 1 on any fatal error: invalid settings, unreachable networks, missing
/// factory or singleton code, an unrecoverable initializer, an exhausted nonce space, or a
/// deployment pass where every attempt failed.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Saltmine::parse();
    init_tracing_subscriber(cli.v)?;

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt().with_max_level(max_level(verbosity_level)).finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}

const fn max_level(verbosity_level: u8) -> Level {
    match verbosity_level {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

async fn run(cli: Saltmine) -> Result<()> {
    let config = Settings::from_file(&cli.settings)?.into_config()?;
    let signer = cli
        .private_key
        .as_deref()
        .map(str::parse::<PrivateKeySigner>)
        .transpose()
        .map_err(|e| anyhow!("invalid deployer private key: {e}"))?;
    if cli.command.deploys() && signer.is_none() {
        bail!("DEPLOYER_PRIVATE_KEY must be set to deploy");
    }

    // Networks are only needed to deploy or to simulate the initializer.
    let networks = if cli.command.deploys() || config.initializer == InitializerMode::Simulated {
        let networks = connect(&config, signer)?;
        preflight::verify_networks(&networks, config.factory, config.singleton).await?;
        networks
    } else {
        Vec::new()
    };

    let store = CheckpointStore::open(&cli.checkpoints)?;
    let deriver = config.deriver();

    let candidates = if cli.command.searches() {
        find_candidates(&config, &deriver, &store, networks.first()).await?
    } else {
        let candidates = store.load(&config.checkpoint_key);
        ensure_consistent(&candidates, &deriver)?;
        candidates
    };

    if !cli.command.deploys() {
        for candidate in &candidates {
            println!("Found salt nonce {} ==> {}", candidate.salt_nonce, candidate.deploy_address);
        }
        return Ok(());
    }

    if candidates.is_empty() {
        warn!(target: "deploy", key = %config.checkpoint_key, "no candidates to deploy");
    }
    let report = DeploymentOrchestrator::new(&networks, config.verify).deploy(candidates).await;
    if report.all_failed() {
        return Err(DeployError::AllFailed(report.failed).into());
    }
    Ok(())
}

/// Builds one connection per configured network, all sharing the deployer identity.
fn connect(config: &Config, signer: Option<PrivateKeySigner>) -> Result<Vec<NetworkTarget<RpcNetwork>>, PreflightError> {
    let mut networks = Vec::with_capacity(config.networks.len());
    let mut problems = Vec::new();
    for settings in &config.networks {
        match RpcNetwork::connect(&settings.url, signer.clone()) {
            Ok(handle) => networks.push(NetworkTarget {
                name: settings.name.clone(),
                chain_id: settings.chain_id,
                confirmations: settings.confirmations,
                overrides: settings.overrides.clone(),
                handle,
            }),
            Err(err) => problems.push(format!("Could not connect to network {}\n{err}", settings.name)),
        }
    }
    if problems.is_empty() { Ok(networks) } else { Err(PreflightError(problems)) }
}

/// Rejects checkpoints whose stored addresses do not follow from their own inputs.
fn ensure_consistent(candidates: &[DeploymentCandidate], deriver: &AddressDeriver) -> Result<(), DeployError> {
    let problems: Vec<String> = candidates
        .iter()
        .filter(|candidate| !candidate.is_consistent(deriver))
        .map(|candidate| format!("{} (salt nonce {})", candidate.deploy_address, candidate.salt_nonce))
        .collect();
    if problems.is_empty() { Ok(()) } else { Err(DeployError::Inconsistent(problems)) }
}

/// Loads the checkpoint and searches until it holds the configured number of candidates.
async fn find_candidates(
    config: &Config,
    deriver: &AddressDeriver,
    store: &CheckpointStore,
    reference: Option<&NetworkTarget<RpcNetwork>>,
) -> Result<Vec<DeploymentCandidate>> {
    let existing = store.load(&config.checkpoint_key);
    ensure_consistent(&existing, deriver)?;
    if existing.len() >= config.num_to_find {
        info!(target: "search", "Already found {}/{} safes. Skipping search", existing.len(), config.num_to_find);
        return Ok(existing);
    }

    let initializer = match (config.initializer, reference) {
        (InitializerMode::Abi, _) => AbiInitializer.build(&config.setup).await?,
        (InitializerMode::Simulated, Some(reference)) => {
            SimulatedInitializer::new(&reference.handle, config.singleton)
                .build(&config.setup)
                .await?
        }
        (InitializerMode::Simulated, None) => bail!("simulated initializer needs a reference network"),
    };

    let template = CandidateTemplate {
        factory: config.factory,
        implementation: config.singleton,
        initializer,
        setup: config.setup.clone(),
    };
    let searcher = VanitySearcher::new(deriver, &template, store, &config.checkpoint_key, config.search);

    // The search is a blocking CPU loop; keep it off the async worker's scheduling path.
    let found = tokio::task::block_in_place(|| {
        searcher.search(existing, config.start_salt_nonce, config.num_to_find, &config.vanity)
    })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let levels: Vec<Level> = (0..=5).map(max_level).collect();
        assert_eq!(
            levels,
            [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE, Level::TRACE]
        );
        assert_eq!(max_level(Saltmine::parse_from(["saltmine", "-vv", "search"]).v), Level::INFO);
    }
}
