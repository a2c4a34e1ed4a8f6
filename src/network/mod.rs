//! The narrow capability each chain has to offer: code lookups, block height, transaction
//! submission and confirmation tracking.

mod rpc;
pub(crate) use rpc::RpcNetwork;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use alloy::eips::BlockNumberOrTag;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::NetworkError;

/// Error text some nodes (Aurora) return for a code lookup on an address that was never touched.
const MISSING_ACCOUNT_MARKER: &str = "does not exist while viewing";

/// Fragments of the errors nodes return when a call is refused for lack of gas.
const GAS_REJECTION_MARKERS: [&str; 5] = [
    "intrinsic gas too low",
    "out of gas",
    "gas required exceeds allowance",
    "insufficient gas",
    "gas too low",
];

/// Whether a node error message refuses a call because its gas limit is too low.
pub(crate) fn is_gas_rejection(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    GAS_REJECTION_MARKERS.iter().any(|marker| message.contains(marker))
}

/// A connection to one chain, bound to at most one signing identity.
#[async_trait]
pub(crate) trait Network: Send + Sync {
    /// Address of the signing identity used for every transaction on this network.
    fn signer(&self) -> Option<Address>;

    async fn code_at(&self, address: Address, block: BlockNumberOrTag) -> Result<Bytes, NetworkError>;

    async fn block_number(&self) -> Result<u64, NetworkError>;

    /// Signs and broadcasts a transaction, returning its hash.
    async fn submit(&self, to: Address, data: Bytes, overrides: &TxOverrides) -> Result<B256, NetworkError>;

    /// Waits until `tx` has `confirmations` confirmations. A reverted transaction is an error.
    async fn wait_for_confirmations(&self, tx: B256, confirmations: u64) -> Result<(), NetworkError>;

    /// Runs a call from `from` without broadcasting it.
    ///
    /// A refusal for lack of gas comes back as [`NetworkError::Rejected`] carrying the calldata
    /// that was sent. Any other refusal carries none.
    async fn simulate(&self, from: Address, to: Address, data: Bytes, gas_limit: u64) -> Result<Bytes, NetworkError>;
}

/// Optional transaction fields applied to every deployment on a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TxOverrides {
    pub(crate) gas_limit: Option<u64>,
    pub(crate) gas_price: Option<u128>,
    pub(crate) max_fee_per_gas: Option<u128>,
    pub(crate) max_priority_fee_per_gas: Option<u128>,
    pub(crate) value: Option<U256>,
}

/// A configured chain together with its connection.
#[derive(Debug)]
pub(crate) struct NetworkTarget<N> {
    pub(crate) name: String,
    pub(crate) chain_id: Option<u64>,
    pub(crate) confirmations: u64,
    pub(crate) overrides: TxOverrides,
    pub(crate) handle: N,
}

impl<N> fmt::Display for NetworkTarget<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain_id {
            Some(id) => write!(f, "{} ({id})", self.name),
            None => write!(f, "{} (unknown)", self.name),
        }
    }
}

/// Reports whether contract code exists at `address` on the latest block.
///
/// The zero address never counts as deployed, and the missing-account response some nodes give
/// for untouched addresses is read as "no code".
pub(crate) async fn is_deployed<N: Network + ?Sized>(network: &N, address: Address) -> Result<bool, NetworkError> {
    if address.is_zero() {
        return Ok(false);
    }
    match network.code_at(address, BlockNumberOrTag::Latest).await {
        Ok(code) => Ok(!code.is_empty()),
        Err(NetworkError::Transport(message)) if message.contains(MISSING_ACCOUNT_MARKER) => Ok(false),
        Err(err) => Err(err),
    }
}
