//! In-memory [`Network`] used by the tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy::{eips::BlockNumberOrTag, sol_types::SolCall};
use alloy_primitives::{Address, B256, Bytes, keccak256};
use async_trait::async_trait;

use super::{Network, TxOverrides};
use crate::{deploy::createProxyWithNonceCall, derive::AddressDeriver, error::NetworkError};

/// Bytecode given to proxies the mock "deploys".
const PROXY_RUNTIME: &[u8] = &[0x60, 0x80, 0x60, 0x40];

#[derive(Debug, Default)]
struct State {
    code: HashMap<Address, Bytes>,
    code_error: Option<String>,
    code_lookups: usize,
    block: u64,
    unreachable: bool,
    factory: Option<AddressDeriver>,
    submissions: Vec<(Address, Bytes, TxOverrides)>,
    pending: HashMap<B256, Bytes>,
    reject_submissions: Option<String>,
    revert_all: bool,
    simulation: Option<Result<Bytes, NetworkError>>,
}

#[derive(Debug, Default)]
pub(crate) struct MockNetwork {
    signer: Option<Address>,
    state: Mutex<State>,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self {
            signer: Some(Address::repeat_byte(0x5e)),
            ..Default::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    pub(crate) fn fail_code_lookups(&self, message: &str) {
        self.state().code_error = Some(message.to_string());
    }

    pub(crate) fn set_unreachable(&self) {
        self.state().unreachable = true;
    }

    /// Makes confirmed `createProxyWithNonce` calls place code at the derived proxy address.
    pub(crate) fn with_factory(self, deriver: AddressDeriver) -> Self {
        self.set_code(deriver.factory(), Bytes::from_static(PROXY_RUNTIME));
        self.set_code(deriver.implementation(), Bytes::from_static(PROXY_RUNTIME));
        self.state().factory = Some(deriver);
        self
    }

    pub(crate) fn reject_submissions(&self, reason: &str) {
        self.state().reject_submissions = Some(reason.to_string());
    }

    pub(crate) fn revert_all(&self) {
        self.state().revert_all = true;
    }

    pub(crate) fn set_simulation(&self, outcome: Result<Bytes, NetworkError>) {
        self.state().simulation = Some(outcome);
    }

    pub(crate) fn submissions(&self) -> Vec<(Address, Bytes, TxOverrides)> {
        self.state().submissions.clone()
    }

    pub(crate) fn code_lookups(&self) -> usize {
        self.state().code_lookups
    }
}

#[async_trait]
impl Network for MockNetwork {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn code_at(&self, address: Address, _block: BlockNumberOrTag) -> Result<Bytes, NetworkError> {
        let mut state = self.state();
        state.code_lookups += 1;
        if let Some(message) = &state.code_error {
            return Err(NetworkError::Transport(message.clone()));
        }
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn block_number(&self) -> Result<u64, NetworkError> {
        let state = self.state();
        if state.unreachable {
            return Err(NetworkError::Transport("connection refused".into()));
        }
        Ok(state.block)
    }

    async fn submit(&self, to: Address, data: Bytes, overrides: &TxOverrides) -> Result<B256, NetworkError> {
        let mut state = self.state();
        if let Some(reason) = &state.reject_submissions {
            return Err(NetworkError::Rejected {
                reason: reason.clone(),
                input: Some(data),
            });
        }
        let hash = keccak256([&data[..], &state.submissions.len().to_be_bytes()[..]].concat());
        state.submissions.push((to, data.clone(), overrides.clone()));
        state.pending.insert(hash, data);
        Ok(hash)
    }

    async fn wait_for_confirmations(&self, tx: B256, confirmations: u64) -> Result<(), NetworkError> {
        let mut state = self.state();
        let data = state
            .pending
            .remove(&tx)
            .ok_or_else(|| NetworkError::Transport(format!("unknown transaction {tx}")))?;
        if state.revert_all {
            return Err(NetworkError::Reverted(tx));
        }
        state.block += confirmations.max(1);

        if let Some(factory) = state.factory {
            if let Ok(call) = createProxyWithNonceCall::abi_decode(&data) {
                if call._singleton == factory.implementation() {
                    let proxy = factory.derive(&call.initializer, call.saltNonce);
                    state.code.insert(proxy, Bytes::from_static(PROXY_RUNTIME));
                }
            }
        }
        Ok(())
    }

    async fn simulate(&self, _from: Address, _to: Address, data: Bytes, _gas_limit: u64) -> Result<Bytes, NetworkError> {
        match self.state().simulation.clone() {
            None => Err(NetworkError::Rejected {
                reason: "intrinsic gas too low".into(),
                input: Some(data),
            }),
            Some(outcome) => outcome,
        }
    }
}
