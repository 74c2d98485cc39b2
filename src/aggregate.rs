use crate::case::model::Outcome;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub executed: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Tally {
    counts: AggregateCounts,
    finalized: HashSet<String>,
    reconciled: HashSet<String>,
    order: Vec<String>,
    outcomes: HashMap<String, Outcome>,
}

/// Run-scoped counters. Written only by finalization and reconciliation;
/// everything else reads.
#[derive(Debug, Default)]
pub struct Aggregator {
    tally: Mutex<Tally>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotence gate. Counters advance only the first time `case_id` is
    /// seen; the latest outcome is cached on every call. A case previously
    /// marked not executed leaves the skipped count. Returns whether this
    /// call was counted.
    pub fn record_finalized(&self, case_id: &str, outcome: &Outcome) -> bool {
        let mut tally = self.tally.lock();
        let first = tally.finalized.insert(case_id.to_string());
        if first {
            if tally.reconciled.remove(case_id) {
                tally.counts.skipped -= 1;
            }
            tally.order.push(case_id.to_string());
            tally.counts.executed += 1;
            match outcome {
                Outcome::Passed => tally.counts.passed += 1,
                Outcome::Failed => tally.counts.failed += 1,
                Outcome::Skipped => tally.counts.skipped += 1,
                Outcome::NotExecuted | Outcome::Other(_) => {}
            }
        }
        tally.outcomes.insert(case_id.to_string(), outcome.clone());
        first
    }

    /// Counts cases patched to not-executed at teardown. Cases already
    /// finalized or reconciled are ignored.
    pub fn record_not_executed<'a>(&self, case_ids: impl IntoIterator<Item = &'a str>) -> u64 {
        let mut tally = self.tally.lock();
        let mut added = 0;
        for case_id in case_ids {
            if tally.finalized.contains(case_id) || !tally.reconciled.insert(case_id.to_string()) {
                continue;
            }
            tally.outcomes.insert(case_id.to_string(), Outcome::NotExecuted);
            added += 1;
        }
        tally.counts.skipped += added;
        added
    }

    pub fn counts(&self) -> AggregateCounts {
        self.tally.lock().counts
    }

    pub fn executed_count(&self) -> u64 {
        self.counts().executed
    }

    pub fn passed_count(&self) -> u64 {
        self.counts().passed
    }

    pub fn failed_count(&self) -> u64 {
        self.counts().failed
    }

    pub fn skipped_count(&self) -> u64 {
        self.counts().skipped
    }

    /// Cases whose latest finalized outcome is a failure, in finalization order.
    pub fn failures(&self) -> Vec<String> {
        let tally = self.tally.lock();
        tally
            .order
            .iter()
            .filter(|case_id| tally.outcomes.get(*case_id).is_some_and(Outcome::is_failure))
            .cloned()
            .collect()
    }

    pub fn case_outcomes(&self) -> HashMap<String, Outcome> {
        self.tally.lock().outcomes.clone()
    }

    pub fn finalized_case_ids(&self) -> HashSet<String> {
        self.tally.lock().finalized.clone()
    }

    /// Cases that need no reconciliation: finalized or already marked not executed.
    pub fn settled_case_ids(&self) -> HashSet<String> {
        let tally = self.tally.lock();
        tally.finalized.union(&tally.reconciled).cloned().collect()
    }

    pub fn is_finalized(&self, case_id: &str) -> bool {
        self.tally.lock().finalized.contains(case_id)
    }
}
