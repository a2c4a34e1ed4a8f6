use alloy_primitives::Address;
use futures::future::join_all;
use tracing::info;

use crate::{
    error::PreflightError,
    network::{Network, NetworkTarget, is_deployed},
};

/// Checks that every network answers and already hosts the factory and singleton.
///
/// All networks are checked concurrently and every problem is reported, not just the first.
pub(crate) async fn verify_networks<N: Network>(
    networks: &[NetworkTarget<N>],
    factory: Address,
    singleton: Address,
) -> Result<(), PreflightError> {
    if networks.is_empty() {
        return Err(PreflightError(vec!["No networks".to_string()]));
    }

    let checks = networks.iter().map(|network| async move {
        let mut problems = Vec::new();
        match network.handle.block_number().await {
            Ok(block) => info!(target: "preflight", network = %network, block, "connected"),
            Err(err) => {
                problems.push(format!("Could not connect to network {}\n{err}", network.name));
                return problems;
            }
        }

        let (has_factory, has_singleton) =
            futures::join!(is_deployed(&network.handle, factory), is_deployed(&network.handle, singleton));
        for (label, address, present) in [("Factory", factory, has_factory), ("Singleton", singleton, has_singleton)] {
            match present {
                Ok(true) => {}
                Ok(false) => problems.push(format!("{label} not detected at {address} on chain {}", network.name)),
                Err(err) => problems.push(format!(
                    "Could not check {label} at {address} on chain {}\n{err}",
                    network.name
                )),
            }
        }
        problems
    });

    let problems: Vec<String> = join_all(checks).await.into_iter().flatten().collect();
    if problems.is_empty() { Ok(()) } else { Err(PreflightError(problems)) }
}
