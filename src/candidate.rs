use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{derive::AddressDeriver, initializer::SafeSetup};

/// A salt nonce whose proxy address passed the vanity check, with everything needed to deploy it.
///
/// `deploy_address` always equals the address derived from the factory, implementation,
/// initializer and salt nonce stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeploymentCandidate {
    pub(crate) deploy_address: Address,
    pub(crate) initializer: Bytes,
    #[serde(with = "decimal")]
    pub(crate) salt_nonce: U256,
    pub(crate) factory_address: Address,
    pub(crate) implementation_address: Address,
    pub(crate) owners: Vec<Address>,
    pub(crate) threshold: u64,
    pub(crate) to: Address,
    pub(crate) data: Bytes,
    pub(crate) fallback_handler: Address,
    pub(crate) payment_token: Address,
    #[serde(with = "decimal")]
    pub(crate) payment: U256,
    pub(crate) payment_receiver: Address,
}

impl DeploymentCandidate {
    /// Checks the stored address against a fresh derivation.
    pub(crate) fn is_consistent(&self, deriver: &AddressDeriver) -> bool {
        deriver.factory() == self.factory_address
            && deriver.implementation() == self.implementation_address
            && deriver.derive(&self.initializer, self.salt_nonce) == self.deploy_address
    }
}

/// The parts of a candidate that stay fixed for a whole search.
#[derive(Debug, Clone)]
pub(crate) struct CandidateTemplate {
    pub(crate) factory: Address,
    pub(crate) implementation: Address,
    pub(crate) initializer: Bytes,
    pub(crate) setup: SafeSetup,
}

impl CandidateTemplate {
    pub(crate) fn instantiate(&self, deploy_address: Address, salt_nonce: U256) -> DeploymentCandidate {
        DeploymentCandidate {
            deploy_address,
            initializer: self.initializer.clone(),
            salt_nonce,
            factory_address: self.factory,
            implementation_address: self.implementation,
            owners: self.setup.owners.clone(),
            threshold: self.setup.threshold,
            to: self.setup.to,
            data: self.setup.data.clone(),
            fallback_handler: self.setup.fallback_handler,
            payment_token: self.setup.payment_token,
            payment: self.setup.payment,
            payment_receiver: self.setup.payment_receiver,
        }
    }
}

/// Serializes a [`U256`] as a decimal string. Accepts decimal or `0x` hex strings and plain
/// JSON integers when reading.
pub(crate) mod decimal {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub(crate) fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(U256::from(n)),
            Raw::Text(s) => s
                .trim()
                .parse::<U256>()
                .map_err(|e| D::Error::custom(format!("invalid uint256 `{s}`: {e}"))),
        }
    }
}
