use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{Address, Bytes, U256};
use serde::Deserialize;

use crate::{
    candidate::decimal,
    deploy::VerifyPolicy,
    derive::AddressDeriver,
    error::ConfigError,
    initializer::{InitializerMode, SafeSetup},
    mine::SearchParams,
    network::TxOverrides,
    vanity::VanityPattern,
};

/// The settings file as written by the operator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct Settings {
    factory_address: Address,
    singleton_address: Address,
    owners: Vec<Address>,
    threshold: u64,
    to: Address,
    #[serde(default)]
    data: Bytes,
    fallback_handler: Address,
    payment_token: Address,
    #[serde(default, with = "decimal")]
    payment: U256,
    payment_receiver: Address,
    num_to_find: usize,
    #[serde(default, with = "decimal")]
    start_salt_nonce: U256,
    checkpoint_file: String,
    #[serde(default = "default_proxy_init_code")]
    proxy_init_code: PathBuf,
    #[serde(default)]
    initializer: InitializerMode,
    vanity: VanityPattern,
    #[serde(default)]
    search: SearchSettings,
    #[serde(default)]
    verify: VerifySettings,
    #[serde(default)]
    networks: Vec<NetworkSettings>,
}

fn default_proxy_init_code() -> PathBuf {
    PathBuf::from("data/proxyInitCode.txt")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct SearchSettings {
    progress_interval: u64,
    pause_millis: u64,
    batch_size: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let params = SearchParams::default();
        Self {
            progress_interval: params.progress_interval,
            pause_millis: params.pause.as_millis() as u64,
            batch_size: params.batch_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct VerifySettings {
    attempts: u32,
    backoff_millis: u64,
}

impl Default for VerifySettings {
    fn default() -> Self {
        let policy = VerifyPolicy::default();
        Self {
            attempts: policy.attempts,
            backoff_millis: policy.backoff.as_millis() as u64,
        }
    }
}

/// One chain entry of the settings file. Missing identity fields fall back to "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct NetworkSettings {
    #[serde(default = "unknown")]
    pub(crate) name: String,
    #[serde(default, alias = "chainID")]
    pub(crate) chain_id: Option<u64>,
    #[serde(default)]
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) confirmations: u64,
    #[serde(default)]
    pub(crate) overrides: TxOverrides,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Validated, immutable configuration shared by reference with every component.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) factory: Address,
    pub(crate) singleton: Address,
    pub(crate) setup: SafeSetup,
    pub(crate) proxy_creation_code: Bytes,
    pub(crate) num_to_find: usize,
    pub(crate) start_salt_nonce: U256,
    pub(crate) checkpoint_key: String,
    pub(crate) initializer: InitializerMode,
    pub(crate) vanity: VanityPattern,
    pub(crate) search: SearchParams,
    pub(crate) verify: VerifyPolicy,
    pub(crate) networks: Vec<NetworkSettings>,
}

impl Config {
    pub(crate) fn deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.factory, &self.proxy_creation_code, self.singleton)
    }
}

impl Settings {
    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Collects every problem with the settings that can be seen without touching the network.
    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.owners.is_empty() {
            problems.push("No owners".to_string());
        }
        let mut seen = HashSet::new();
        for owner in &self.owners {
            if owner.is_zero() {
                problems.push(format!("Owner address invalid ({owner})"));
            } else if !seen.insert(owner) {
                problems.push(format!("Duplicate owner ({owner})"));
            }
        }
        if self.threshold == 0 {
            problems.push(format!("Threshold invalid ({})", self.threshold));
        } else if self.threshold as usize > self.owners.len() {
            problems.push(format!(
                "Threshold invalid for number of owners ({}/{})",
                self.threshold,
                self.owners.len()
            ));
        }
        if self.num_to_find == 0 {
            problems.push("Number of safes to find must be positive".to_string());
        }
        if self.checkpoint_file.is_empty() || self.checkpoint_file.contains(['/', '\\']) {
            problems.push(format!("Checkpoint file must be a plain file name ({})", self.checkpoint_file));
        }
        problems.extend(self.vanity.normalized().problems());
        if self.search.progress_interval == 0 {
            problems.push("Progress interval must be positive".to_string());
        }
        if self.search.batch_size == 0 {
            problems.push("Batch size must be positive".to_string());
        }

        if self.networks.is_empty() {
            problems.push("No networks".to_string());
        }
        for network in &self.networks {
            if network.url.trim().is_empty() {
                problems.push(format!("URL not provided for network {}", network.name));
            }
        }
        problems
    }

    /// Validates the settings and loads the proxy creation code.
    pub(crate) fn into_config(self) -> Result<Config, ConfigError> {
        let mut problems = self.problems();
        let proxy_creation_code = match read_hex_file(&self.proxy_init_code) {
            Ok(code) => Some(code),
            Err(problem) => {
                problems.push(problem);
                None
            }
        };
        let Some(proxy_creation_code) = proxy_creation_code.filter(|_| problems.is_empty()) else {
            return Err(ConfigError::Invalid(problems));
        };

        Ok(Config {
            factory: self.factory_address,
            singleton: self.singleton_address,
            setup: SafeSetup {
                owners: self.owners,
                threshold: self.threshold,
                to: self.to,
                data: self.data,
                fallback_handler: self.fallback_handler,
                payment_token: self.payment_token,
                payment: self.payment,
                payment_receiver: self.payment_receiver,
            },
            proxy_creation_code,
            num_to_find: self.num_to_find,
            start_salt_nonce: self.start_salt_nonce,
            checkpoint_key: self.checkpoint_file,
            initializer: self.initializer,
            vanity: self.vanity.normalized(),
            search: SearchParams {
                progress_interval: self.search.progress_interval,
                pause: Duration::from_millis(self.search.pause_millis),
                batch_size: self.search.batch_size,
            },
            verify: VerifyPolicy {
                attempts: self.verify.attempts,
                backoff: Duration::from_millis(self.verify.backoff_millis),
            },
            networks: self.networks,
        })
    }
}

/// Reads a file holding hex-encoded bytes, with or without a `0x` prefix.
fn read_hex_file(path: &Path) -> Result<Bytes, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("Could not read proxy init code at {}: {err}", path.display()))?;
    let text = text.trim();
    let code = hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|err| format!("Proxy init code at {} is not hex: {err}", path.display()))?;
    if code.is_empty() {
        return Err(format!("Proxy init code at {} is empty", path.display()));
    }
    Ok(code.into())
}
