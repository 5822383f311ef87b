//! Admission Policy Module
//!
//! TinyLFU admission: a new key only displaces residents it has been seen more often than.

use std::sync::Arc;

use crate::cache::entry::Key;
use crate::cache::sketch::FrequencySketch;

// == Victim ==
/// A resident entry offered up for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    /// Resident key
    pub key: Key,
    /// Hash of the key, for sketch lookups
    pub hash: u64,
    /// Cost freed by evicting it
    pub cost: u64,
}

// == Admission Decision ==
/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Enough room already; nothing needs to go
    Admit,
    /// Candidate loses; the shard stays as it is
    Reject,
    /// Candidate wins once every listed key is evicted
    AdmitWithEviction(Vec<Key>),
}

// == Admission Policy ==
/// Frequency-based admission backed by the shared sketch.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    sketch: Arc<FrequencySketch>,
}

impl AdmissionPolicy {
    /// Creates a policy reading from `sketch`.
    pub fn new(sketch: Arc<FrequencySketch>) -> Self {
        Self { sketch }
    }

    /// Current frequency estimate for a key hash.
    pub fn estimate(&self, hash: u64) -> u8 {
        self.sketch.estimate(hash)
    }

    // == Should Admit ==
    /// True if `candidate` is strictly more frequent than the weakest victim.
    ///
    /// Ties go to the resident. An empty victim set admits.
    pub fn should_admit(&self, candidate: u64, victims: &[Victim]) -> bool {
        let candidate = self.estimate(candidate);
        victims
            .iter()
            .map(|v| self.estimate(v.hash))
            .min()
            .map_or(true, |weakest| candidate > weakest)
    }

    /// Picks the lowest-frequency victim, if any.
    pub fn weakest(&self, victims: Vec<Victim>) -> Option<Victim> {
        victims.into_iter().min_by_key(|v| self.estimate(v.hash))
    }

    // == Decide ==
    /// Works out whether `candidate` can free `needed` cost units.
    ///
    /// `sample` is called with the victims chosen so far and must return fresh
    /// candidates that exclude them. Each round the candidate has to beat the
    /// weakest sampled victim; that victim is then chosen. Nothing is evicted
    /// here, so a rejection part way through leaves the shard untouched.
    pub fn decide<F>(&self, candidate: u64, needed: u64, mut sample: F) -> AdmissionDecision
    where
        F: FnMut(&[Key]) -> Vec<Victim>,
    {
        if needed == 0 {
            return AdmissionDecision::Admit;
        }

        let mut chosen: Vec<Key> = Vec::new();
        let mut freed = 0u64;

        while freed < needed {
            let victims = sample(&chosen);
            if !self.should_admit(candidate, &victims) {
                return AdmissionDecision::Reject;
            }
            // An empty sample admits above but frees nothing
            let Some(weakest) = self.weakest(victims) else {
                return AdmissionDecision::Reject;
            };
            freed += weakest.cost;
            chosen.push(weakest.key);
        }

        AdmissionDecision::AdmitWithEviction(chosen)
    }
}
