//! Observer contract for run synchronization events.
//!
//! Components receive an `Arc<dyn SyncHooks>` at construction instead of
//! reaching for a global logger. [`TracingSyncHooks`] is the production sink.

use crate::aggregate::AggregateCounts;
use crate::case::model::Outcome;
use crate::error::SyncError;
use crate::reconcile::ReconcileReport;
use crate::run::model::Run;
use std::fmt::{Display, Formatter};

/// Best-effort work whose failure is logged and otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Enrichment {
    NameLookup,
    BuildInfo,
    OwnerSync,
    RunMetadata,
    ResultMetadata,
    Screenshot,
    Steps,
    StepLog,
    Attachment,
    RunComment,
    ReconcileBatch,
    PlannedTotal,
    Configuration,
}

impl Enrichment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Enrichment::NameLookup => "name_lookup",
            Enrichment::BuildInfo => "build_info",
            Enrichment::OwnerSync => "owner_sync",
            Enrichment::RunMetadata => "run_metadata",
            Enrichment::ResultMetadata => "result_metadata",
            Enrichment::Screenshot => "screenshot",
            Enrichment::Steps => "steps",
            Enrichment::StepLog => "step_log",
            Enrichment::Attachment => "attachment",
            Enrichment::RunComment => "run_comment",
            Enrichment::ReconcileBatch => "reconcile_batch",
            Enrichment::PlannedTotal => "planned_total",
            Enrichment::Configuration => "configuration",
        }
    }
}

impl Display for Enrichment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait SyncHooks: Send + Sync {
    fn on_run_created(&self, _run: &Run, _mapped_cases: usize) {}

    fn on_case_finalized(&self, _case_id: &str, _result_id: u64, _outcome: &Outcome, _counted: bool) {}

    fn on_enrichment_failed(&self, _stage: Enrichment, _case_id: Option<&str>, _error: &SyncError) {}

    fn on_reconciled(&self, _run_id: u64, _report: &ReconcileReport) {}

    fn on_run_completed(&self, _run: &Run, _counts: &AggregateCounts) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSyncHooks;

impl SyncHooks for NoopSyncHooks {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSyncHooks;

impl SyncHooks for TracingSyncHooks {
    fn on_run_created(&self, run: &Run, mapped_cases: usize) {
        tracing::info!(
            event = "run_created",
            run_id = run.id,
            name = %run.name,
            mapped_cases
        );
    }

    fn on_case_finalized(&self, case_id: &str, result_id: u64, outcome: &Outcome, counted: bool) {
        if counted {
            tracing::info!(event = "case_finalized", case_id, result_id, outcome = %outcome);
        } else {
            tracing::warn!(
                event = "case_refinalized",
                case_id,
                result_id,
                outcome = %outcome,
                "case finalized again, counters unchanged"
            );
        }
    }

    fn on_enrichment_failed(&self, stage: Enrichment, case_id: Option<&str>, error: &SyncError) {
        tracing::warn!(
            event = "enrichment_failed",
            stage = %stage,
            case_id = case_id.unwrap_or("-"),
            status = error.remote_status(),
            error = %error
        );
    }

    fn on_reconciled(&self, run_id: u64, report: &ReconcileReport) {
        tracing::info!(
            event = "reconciled",
            run_id,
            unexecuted = report.unexecuted,
            patched = report.patched,
            unmapped = report.unmapped.len(),
            batches = report.batches,
            failed_batches = report.failed_batches
        );
    }

    fn on_run_completed(&self, run: &Run, counts: &AggregateCounts) {
        tracing::info!(
            event = "run_completed",
            run_id = run.id,
            executed = counts.executed,
            passed = counts.passed,
            failed = counts.failed,
            skipped = counts.skipped
        );
    }
}

#[cfg(test)]
pub(crate) mod capture {
    use super::*;
    use parking_lot::Mutex;

    /// Records hook invocations as short strings for assertions.
    #[derive(Default)]
    pub(crate) struct CapturingHooks {
        pub events: Mutex<Vec<String>>,
    }

    impl CapturingHooks {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        pub fn enrichment_failures(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|event| event.starts_with("enrichment_failed"))
                .collect()
        }
    }

    impl SyncHooks for CapturingHooks {
        fn on_run_created(&self, run: &Run, mapped_cases: usize) {
            self.events.lock().push(format!("run_created:{}:{}", run.id, mapped_cases));
        }

        fn on_case_finalized(&self, case_id: &str, _result_id: u64, outcome: &Outcome, counted: bool) {
            self.events.lock().push(format!("finalized:{}:{}:{}", case_id, outcome, counted));
        }

        fn on_enrichment_failed(&self, stage: Enrichment, case_id: Option<&str>, _error: &SyncError) {
            self.events.lock().push(format!(
                "enrichment_failed:{}:{}",
                stage,
                case_id.unwrap_or("-")
            ));
        }

        fn on_reconciled(&self, _run_id: u64, report: &ReconcileReport) {
            self.events.lock().push(format!("reconciled:{}", report.patched));
        }

        fn on_run_completed(&self, run: &Run, _counts: &AggregateCounts) {
            self.events.lock().push(format!("run_completed:{}", run.id));
        }
    }
}
