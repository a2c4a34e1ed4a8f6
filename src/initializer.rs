use alloy::{sol, sol_types::SolCall};
use alloy_primitives::{Address, Bytes, U256, address};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::{InitializerError, NetworkError},
    network::{Network, is_gas_rejection},
};

sol! {
    /// Safe singleton initialization entry point.
    function setup(
        address[] _owners,
        uint256 _threshold,
        address to,
        bytes data,
        address fallbackHandler,
        address paymentToken,
        uint256 payment,
        address paymentReceiver
    ) external;
}

/// Hardhat/anvil development account #0. Only ever used as the sender of simulated calls.
const DISPOSABLE_SENDER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Far below the cost of any `setup` call, so the simulation is guaranteed to be refused.
const STARVED_GAS_LIMIT: u64 = 21_000;

/// Parameters of the `setup` call every proxy is initialized with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SafeSetup {
    pub(crate) owners: Vec<Address>,
    pub(crate) threshold: u64,
    pub(crate) to: Address,
    pub(crate) data: Bytes,
    pub(crate) fallback_handler: Address,
    pub(crate) payment_token: Address,
    pub(crate) payment: U256,
    pub(crate) payment_receiver: Address,
}

impl SafeSetup {
    fn call(&self) -> setupCall {
        setupCall {
            _owners: self.owners.clone(),
            _threshold: U256::from(self.threshold),
            to: self.to,
            data: self.data.clone(),
            fallbackHandler: self.fallback_handler,
            paymentToken: self.payment_token,
            payment: self.payment,
            paymentReceiver: self.payment_receiver,
        }
    }
}

/// How the initializer payload is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum InitializerMode {
    /// Encode the `setup` call locally.
    #[default]
    Abi,
    /// Recover the calldata from a starved simulated call on the reference network.
    Simulated,
}

/// Produces the calldata passed to the proxy right after creation.
#[async_trait]
pub(crate) trait InitializerSource: Send + Sync {
    async fn build(&self, setup: &SafeSetup) -> Result<Bytes, InitializerError>;
}

/// Encodes `setup(...)` directly from the known ABI.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AbiInitializer;

#[async_trait]
impl InitializerSource for AbiInitializer {
    async fn build(&self, setup: &SafeSetup) -> Result<Bytes, InitializerError> {
        Ok(setup.call().abi_encode().into())
    }
}

/// Sends a `setup` call to the singleton with a gas limit far too low to succeed and keeps the
/// calldata of the refused transaction. Nothing is broadcast and the real deployer is not used.
#[derive(Debug)]
pub(crate) struct SimulatedInitializer<'a, N> {
    network: &'a N,
    singleton: Address,
}

impl<'a, N: Network> SimulatedInitializer<'a, N> {
    pub(crate) const fn new(network: &'a N, singleton: Address) -> Self {
        Self { network, singleton }
    }
}

#[async_trait]
impl<N: Network> InitializerSource for SimulatedInitializer<'_, N> {
    async fn build(&self, setup: &SafeSetup) -> Result<Bytes, InitializerError> {
        let data: Bytes = setup.call().abi_encode().into();
        match self
            .network
            .simulate(DISPOSABLE_SENDER, self.singleton, data, STARVED_GAS_LIMIT)
            .await
        {
            Err(NetworkError::Rejected {
                reason,
                input: Some(input),
            }) if is_gas_rejection(&reason) => {
                debug!(target: "initializer", %reason, "recovered initializer from refused call");
                Ok(input)
            }
            Err(err) => {
                warn!(target: "initializer", %err, "simulated setup call failed without calldata");
                Err(InitializerError::Unrecoverable(err))
            }
            Ok(_) => Err(InitializerError::UnexpectedSuccess),
        }
    }
}
