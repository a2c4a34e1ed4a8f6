use std::time::Duration;

use alloy::{sol, sol_types::SolCall};
use alloy_primitives::Address;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::{
    candidate::DeploymentCandidate,
    error::NetworkError,
    network::{Network, NetworkTarget, is_deployed},
};

sol! {
    /// Safe proxy factory deployment entry point.
    function createProxyWithNonce(address _singleton, bytes initializer, uint256 saltNonce)
        external
        returns (address proxy);
}

/// How hard to look for code after a deployment transaction is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VerifyPolicy {
    /// Code lookups made before giving up, at least one
    pub(crate) attempts: u32,
    /// Wait before the second lookup, doubled for every further one
    pub(crate) backoff: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Tally of one pass over every candidate/network pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DeploymentReport {
    /// Code was already present, nothing submitted
    pub(crate) skipped: usize,
    /// Submitted, confirmed and code observed
    pub(crate) deployed: usize,
    /// Submitted and confirmed, but no code observed afterwards
    pub(crate) unverified: usize,
    /// Lookup, submission or confirmation failed
    pub(crate) failed: usize,
}

impl DeploymentReport {
    pub(crate) const fn attempted(&self) -> usize {
        self.deployed + self.unverified + self.failed
    }

    /// True when something was attempted and nothing of it went through.
    pub(crate) const fn all_failed(&self) -> bool {
        self.failed > 0 && self.failed == self.attempted()
    }
}

enum Outcome {
    Deployed,
    Unverified,
}

/// Deploys candidates on every configured network, skipping pairs that already hold code.
///
/// The code check is the only record of what has been deployed, which makes a whole pass safe to
/// repeat after any failure.
#[derive(Debug)]
pub(crate) struct DeploymentOrchestrator<'a, N> {
    networks: &'a [NetworkTarget<N>],
    verify: VerifyPolicy,
}

impl<'a, N: Network> DeploymentOrchestrator<'a, N> {
    pub(crate) const fn new(networks: &'a [NetworkTarget<N>], verify: VerifyPolicy) -> Self {
        Self { networks, verify }
    }

    /// Walks candidates in order and, for each, the networks in configuration order.
    ///
    /// Failures on one pair are logged and counted; the pass always continues with the next
    /// pair.
    pub(crate) async fn deploy(&self, candidates: Vec<DeploymentCandidate>) -> DeploymentReport {
        for network in self.networks {
            match network.handle.signer() {
                Some(signer) => info!(target: "deploy", network = %network, "deploying using EOA {signer}"),
                None => warn!(target: "deploy", network = %network, "no signing identity configured"),
            }
        }

        let mut report = DeploymentReport::default();
        for candidate in &candidates {
            let address = candidate.deploy_address;
            // Presence checks are independent reads and run concurrently; deployments do not.
            let presence =
                join_all(self.networks.iter().map(|network| is_deployed(&network.handle, address))).await;

            for (network, present) in self.networks.iter().zip(presence) {
                match present {
                    Ok(true) => {
                        info!(target: "deploy", %address, network = %network, "already deployed, skipping");
                        report.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        error!(target: "deploy", %address, network = %network, %err, "could not check for existing code");
                        report.failed += 1;
                        continue;
                    }
                }

                info!(target: "deploy", %address, network = %network, "deploying");
                match self.deploy_one(candidate, network).await {
                    Ok(Outcome::Deployed) => {
                        info!(target: "deploy", %address, network = %network, "deployed successfully");
                        report.deployed += 1;
                    }
                    Ok(Outcome::Unverified) => {
                        warn!(
                            target: "deploy",
                            %address,
                            network = %network,
                            "deployment transaction confirmed but no code detected"
                        );
                        report.unverified += 1;
                    }
                    Err(err) => {
                        error!(target: "deploy", %address, network = %network, %err, "deployment failed");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            target: "deploy",
            skipped = report.skipped,
            deployed = report.deployed,
            unverified = report.unverified,
            failed = report.failed,
            "deployment pass complete"
        );
        report
    }

    async fn deploy_one(
        &self,
        candidate: &DeploymentCandidate,
        network: &NetworkTarget<N>,
    ) -> Result<Outcome, NetworkError> {
        let call = createProxyWithNonceCall {
            _singleton: candidate.implementation_address,
            initializer: candidate.initializer.clone(),
            saltNonce: candidate.salt_nonce,
        };
        let tx = network
            .handle
            .submit(candidate.factory_address, call.abi_encode().into(), &network.overrides)
            .await?;
        info!(target: "deploy", %tx, confirmations = network.confirmations, "waiting for confirmations");
        network.handle.wait_for_confirmations(tx, network.confirmations).await?;

        self.verify(&network.handle, candidate.deploy_address).await
    }

    async fn verify(&self, handle: &N, address: Address) -> Result<Outcome, NetworkError> {
        let attempts = self.verify.attempts.max(1);
        let mut delay = self.verify.backoff;
        for attempt in 1..=attempts {
            if is_deployed(handle, address).await? {
                return Ok(Outcome::Deployed);
            }
            if attempt < attempts {
                warn!(target: "deploy", %address, attempt, "no code yet, checking again in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        Ok(Outcome::Unverified)
    }
}
