use std::fmt;

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::{RpcError, TransportErrorKind, http::reqwest::Url},
};
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use tracing::debug;

use super::{Network, TxOverrides, is_gas_rejection};
use crate::error::NetworkError;

/// [`Network`] backed by an alloy JSON-RPC provider over HTTP.
///
/// When a signer is supplied the provider fills nonce, gas and chain id and signs locally;
/// otherwise the connection is read-only and [`Network::submit`] fails with
/// [`NetworkError::NoSigner`].
#[derive(Clone)]
pub(crate) struct RpcNetwork {
    provider: DynProvider,
    signer: Option<Address>,
}

impl fmt::Debug for RpcNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcNetwork").field("signer", &self.signer).finish_non_exhaustive()
    }
}

impl RpcNetwork {
    pub(crate) fn connect(url: &str, signer: Option<PrivateKeySigner>) -> Result<Self, NetworkError> {
        let url: Url = url
            .parse()
            .map_err(|err| NetworkError::Transport(format!("invalid url `{url}`: {err}")))?;

        Ok(match signer {
            Some(signer) => {
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                Self {
                    provider,
                    signer: Some(address),
                }
            }
            None => Self {
                provider: ProviderBuilder::new().connect_http(url).erased(),
                signer: None,
            },
        })
    }
}

fn transport(err: RpcError<TransportErrorKind>) -> NetworkError {
    NetworkError::Transport(err.to_string())
}

impl TxOverrides {
    fn apply(&self, tx: &mut TransactionRequest) {
        if let Some(gas_limit) = self.gas_limit {
            tx.set_gas_limit(gas_limit);
        }
        if let Some(gas_price) = self.gas_price {
            tx.set_gas_price(gas_price);
        }
        if let Some(max_fee) = self.max_fee_per_gas {
            tx.set_max_fee_per_gas(max_fee);
        }
        if let Some(priority_fee) = self.max_priority_fee_per_gas {
            tx.set_max_priority_fee_per_gas(priority_fee);
        }
        if let Some(value) = self.value {
            tx.set_value(value);
        }
    }
}

#[async_trait]
impl Network for RpcNetwork {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn code_at(&self, address: Address, block: BlockNumberOrTag) -> Result<Bytes, NetworkError> {
        self.provider
            .get_code_at(address)
            .block_id(BlockId::from(block))
            .await
            .map_err(transport)
    }

    async fn block_number(&self) -> Result<u64, NetworkError> {
        self.provider.get_block_number().await.map_err(transport)
    }

    async fn submit(&self, to: Address, data: Bytes, overrides: &TxOverrides) -> Result<B256, NetworkError> {
        let from = self.signer.ok_or(NetworkError::NoSigner)?;
        let mut tx = TransactionRequest::default().with_from(from).with_to(to).with_input(data);
        overrides.apply(&mut tx);

        let pending = self.provider.send_transaction(tx).await.map_err(transport)?;
        debug!(target: "network", tx = %pending.tx_hash(), "transaction broadcast");
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmations(&self, tx: B256, confirmations: u64) -> Result<(), NetworkError> {
        // The receipt itself counts as the first confirmation.
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx)
            .with_required_confirmations(confirmations.max(1))
            .get_receipt()
            .await
            .map_err(|err| NetworkError::Transport(err.to_string()))?;

        if receipt.status() { Ok(()) } else { Err(NetworkError::Reverted(tx)) }
    }

    async fn simulate(&self, from: Address, to: Address, data: Bytes, gas_limit: u64) -> Result<Bytes, NetworkError> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(data.clone())
            .with_gas_limit(gas_limit);

        match self.provider.call(tx).await {
            Ok(output) => Ok(output),
            Err(RpcError::ErrorResp(payload)) => {
                let reason = payload.message.to_string();
                let input = is_gas_rejection(&reason).then_some(data);
                Err(NetworkError::Rejected { reason, input })
            }
            Err(err) => Err(transport(err)),
        }
    }
}
