use std::{collections::VecDeque, thread, time::Duration};

use alloy_primitives::{Address, B256, U256, keccak256};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use tracing::info;

use crate::{
    candidate::{CandidateTemplate, DeploymentCandidate},
    checkpoint::CheckpointStore,
    derive::AddressDeriver,
    error::SearchError,
    vanity::VanityPredicate,
};

/// Tuning for the search loop. None of it affects which candidates are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchParams {
    /// Nonces between two progress reports
    pub(crate) progress_interval: u64,
    /// Pause after each progress report, leaving room for other work on the host
    pub(crate) pause: Duration,
    /// Nonces evaluated per parallel batch
    pub(crate) batch_size: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            progress_interval: 1_000_000,
            pause: Duration::from_secs(1),
            batch_size: 4096,
        }
    }
}

/// A salt nonce whose derived address satisfied the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    pub(crate) nonce: U256,
    pub(crate) address: Address,
}

/// Walks salt nonces upwards looking for proxy addresses accepted by a vanity predicate.
///
/// Nonces are hashed in parallel batches across the rayon pool, but hits are always handed out in
/// ascending nonce order, so the outcome is the same as a sequential scan.
#[derive(Debug)]
pub(crate) struct VanitySearcher<'a> {
    deriver: &'a AddressDeriver,
    template: &'a CandidateTemplate,
    initializer_hash: B256,
    store: &'a CheckpointStore,
    key: &'a str,
    params: SearchParams,
}

impl<'a> VanitySearcher<'a> {
    pub(crate) fn new(
        deriver: &'a AddressDeriver,
        template: &'a CandidateTemplate,
        store: &'a CheckpointStore,
        key: &'a str,
        params: SearchParams,
    ) -> Self {
        Self {
            deriver,
            template,
            initializer_hash: keccak256(&template.initializer),
            store,
            key,
            params,
        }
    }

    /// First nonce worth trying: never below `start_nonce` and past every nonce already recorded.
    pub(crate) fn resume_nonce(existing: &[DeploymentCandidate], start_nonce: U256) -> U256 {
        existing
            .iter()
            .map(|candidate| candidate.salt_nonce.saturating_add(U256::from(1)))
            .fold(start_nonce, |acc, nonce| acc.max(nonce))
    }

    /// Lazily yields hits from `from` upwards until the nonce space runs out.
    pub(crate) fn hits<'s, P: VanityPredicate>(&'s self, from: U256, predicate: &'s P) -> Hits<'s, P> {
        Hits {
            searcher: self,
            predicate,
            next: from,
            buffered: VecDeque::new(),
        }
    }

    /// Extends `existing` until it holds `target` candidates, checkpointing after every hit.
    ///
    /// Returns immediately when `existing` already satisfies `target`. A predicate that never
    /// matches keeps this running until the nonce space is exhausted.
    pub(crate) fn search<P: VanityPredicate>(
        &self,
        existing: Vec<DeploymentCandidate>,
        start_nonce: U256,
        target: usize,
        predicate: &P,
    ) -> Result<Vec<DeploymentCandidate>, SearchError> {
        let mut candidates = existing;
        if candidates.len() >= target {
            return Ok(candidates);
        }

        let from = Self::resume_nonce(&candidates, start_nonce);
        info!(target: "search", from = %from, found = candidates.len(), wanted = target, "searching for salt nonces");

        for hit in self.hits(from, predicate) {
            let candidate = self.template.instantiate(hit.address, hit.nonce);
            info!(target: "search", address = %candidate.deploy_address, nonce = %hit.nonce, "found candidate");
            candidates.push(candidate);
            self.store.save(self.key, &candidates)?;

            if candidates.len() >= target {
                return Ok(candidates);
            }
        }

        Err(SearchError::Exhausted {
            found: candidates.len(),
            target,
        })
    }

    fn address(&self, nonce: U256) -> Address {
        self.deriver.derive_with_hash(self.initializer_hash, nonce)
    }

    /// Evaluates `len` nonces starting at `start`, returning the hits in nonce order.
    fn scan<P: VanityPredicate>(&self, start: U256, len: u64, predicate: &P) -> Vec<Hit> {
        let mut hits: Vec<Hit> = (0..len)
            .into_par_iter()
            .map_init(
                || *b"0x0000000000000000000000000000000000000000",
                |buffer, offset| {
                    let nonce = start + U256::from(offset);
                    let address = self.address(nonce);
                    predicate.matches(lower_hex(address, buffer)).then_some(Hit { nonce, address })
                },
            )
            .flatten()
            .collect();
        hits.sort_unstable_by_key(|hit| hit.nonce);
        hits
    }

    /// Logs every multiple of the progress interval inside the batch, then pauses once.
    fn report_progress(&self, start: U256, len: u64) {
        let interval = U256::from(self.params.progress_interval.max(1));
        let end = start.saturating_add(U256::from(len));
        let remainder = start % interval;
        let gap = if remainder.is_zero() { U256::ZERO } else { interval - remainder };
        // No multiple of the interval is left below U256::MAX.
        let Some(mut nonce) = start.checked_add(gap) else {
            return;
        };
        if nonce >= end {
            return;
        }
        while nonce < end {
            info!(target: "search", "{nonce} -> {}", self.address(nonce));
            match nonce.checked_add(interval) {
                Some(next) => nonce = next,
                None => break,
            }
        }
        if !self.params.pause.is_zero() {
            thread::sleep(self.params.pause);
        }
    }
}

/// Writes `0x`-prefixed lowercase hex of `address` into `buffer` and borrows it back as text.
fn lower_hex(address: Address, buffer: &mut [u8; 42]) -> &str {
    // Infallible: the output slice is exactly twice the address length.
    let _ = hex::encode_to_slice(address, &mut buffer[2..]);
    std::str::from_utf8(&buffer[..]).unwrap_or_default()
}

/// Iterator over search hits, see [`VanitySearcher::hits`].
#[derive(Debug)]
pub(crate) struct Hits<'s, P> {
    searcher: &'s VanitySearcher<'s>,
    predicate: &'s P,
    next: U256,
    buffered: VecDeque<Hit>,
}

impl<P: VanityPredicate> Iterator for Hits<'_, P> {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        loop {
            if let Some(hit) = self.buffered.pop_front() {
                return Some(hit);
            }
            // U256::MAX itself is outside the searchable range.
            if self.next == U256::MAX {
                return None;
            }

            let start = self.next;
            let remaining = U256::MAX - start;
            let batch = self.searcher.params.batch_size.max(1);
            let len = if remaining < U256::from(batch) { remaining.to::<u64>() } else { batch };

            self.buffered.extend(self.searcher.scan(start, len, self.predicate));
            self.searcher.report_progress(start, len);
            self.next = start + U256::from(len);
        }
    }
}
