use crate::aggregate::Aggregator;
use crate::case::model::Outcome;
use crate::hooks::{Enrichment, SyncHooks};
use crate::mapping::ResultMappingTable;
use crate::remote::model::{AutomationIdentity, ResultPatch};
use crate::remote::TestManagementApi;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Largest number of results sent in one batched patch.
pub const BATCH_SIZE: usize = 100;

pub const NOT_EXECUTED_COMMENT: &str = "Test was not executed during automation run.";

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub unexecuted: usize,
    pub patched: usize,
    pub unmapped: Vec<String>,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Marks planned cases that were never finalized as not executed.
pub struct Reconciler {
    api: Arc<dyn TestManagementApi>,
    mapping: Arc<ResultMappingTable>,
    aggregator: Arc<Aggregator>,
    hooks: Arc<dyn SyncHooks>,
    identity: AutomationIdentity,
    run_id: u64,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn TestManagementApi>,
        run_id: u64,
        mapping: Arc<ResultMappingTable>,
        aggregator: Arc<Aggregator>,
        hooks: Arc<dyn SyncHooks>,
        identity: AutomationIdentity,
    ) -> Self {
        Self {
            api,
            mapping,
            aggregator,
            hooks,
            identity,
            run_id,
        }
    }

    /// Never fails: a rejected batch is logged and the next one is still sent.
    pub async fn reconcile(&self) -> ReconcileReport {
        let settled = self.aggregator.settled_case_ids();
        let unexecuted: Vec<String> = self
            .mapping
            .all_case_ids()
            .into_iter()
            .filter(|case_id| !settled.contains(case_id))
            .collect();
        let mut report = ReconcileReport {
            unexecuted: unexecuted.len(),
            ..ReconcileReport::default()
        };
        if unexecuted.is_empty() {
            return report;
        }
        info!(run_id = self.run_id, count = unexecuted.len(), "marking unexecuted cases");

        let mut pending = Vec::with_capacity(unexecuted.len());
        for case_id in unexecuted {
            match self.mapping.result_for(&case_id) {
                Some(result_id) => pending.push((case_id, result_id)),
                None => {
                    warn!(case_id = %case_id, "no result mapped, cannot mark as not executed");
                    report.unmapped.push(case_id);
                }
            }
        }

        for chunk in pending.chunks(BATCH_SIZE) {
            report.batches += 1;
            let patches: Vec<ResultPatch> = chunk
                .iter()
                .map(|(case_id, result_id)| {
                    ResultPatch::outcome(
                        *result_id,
                        case_id,
                        Outcome::NotExecuted.as_str(),
                        NOT_EXECUTED_COMMENT.to_string(),
                        &self.identity,
                    )
                })
                .collect();
            match self.api.patch_results(self.run_id, &patches).await {
                Ok(()) => {
                    let added = self
                        .aggregator
                        .record_not_executed(chunk.iter().map(|(case_id, _)| case_id.as_str()));
                    report.patched += added as usize;
                }
                Err(err) => {
                    report.failed_batches += 1;
                    self.hooks
                        .on_enrichment_failed(Enrichment::ReconcileBatch, None, &err);
                }
            }
        }

        self.hooks.on_reconciled(self.run_id, &report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::capture::CapturingHooks;
    use crate::remote::fake::FakeApi;

    struct Fixture {
        api: Arc<FakeApi>,
        aggregator: Arc<Aggregator>,
        hooks: Arc<CapturingHooks>,
        reconciler: Reconciler,
    }

    async fn fixture(api: FakeApi) -> Fixture {
        let api = Arc::new(api);
        let run_id = api.seed_run();
        let mapping = Arc::new(ResultMappingTable::new());
        let planned = api.state.lock().points.len();
        mapping.populate(api.as_ref(), run_id, planned).await.unwrap();
        let aggregator = Arc::new(Aggregator::new());
        let hooks = Arc::new(CapturingHooks::default());
        let reconciler = Reconciler::new(
            api.clone(),
            run_id,
            mapping,
            aggregator.clone(),
            hooks.clone(),
            AutomationIdentity {
                test_type: "PlaywrightTest".to_string(),
                test_storage: "playwright.automation".to_string(),
            },
        );
        Fixture {
            api,
            aggregator,
            hooks,
            reconciler,
        }
    }

    #[tokio::test]
    async fn nothing_to_do_when_everything_finalized() {
        let fx = fixture(FakeApi::with_plan(&["C1", "C2"])).await;
        fx.aggregator.record_finalized("C1", &Outcome::Passed);
        fx.aggregator.record_finalized("C2", &Outcome::Failed);

        let report = fx.reconciler.reconcile().await;

        assert_eq!(report, ReconcileReport::default());
        assert!(fx.api.state.lock().result_batches.is_empty());
    }

    #[tokio::test]
    async fn remaining_cases_are_marked_in_one_batch() {
        let fx = fixture(FakeApi::with_plan(&["C1", "C2", "C3"])).await;
        fx.aggregator.record_finalized("C2", &Outcome::Passed);

        let report = fx.reconciler.reconcile().await;

        assert_eq!(report.patched, 2);
        assert_eq!(report.batches, 1);
        let batches = fx.api.outcome_batches("NotExecuted");
        assert_eq!(batches.len(), 1);
        let patch = &batches[0][0];
        assert_eq!(patch.comment.as_deref(), Some(NOT_EXECUTED_COMMENT));
        assert_eq!(patch.state.as_deref(), Some("Completed"));
        assert_eq!(patch.automated_test_name.as_deref(), Some("TestCase_C1"));
        assert_eq!(fx.aggregator.skipped_count(), 2);
        assert_eq!(fx.api.result(1, "C3").unwrap().outcome.as_deref(), Some("NotExecuted"));
    }

    #[tokio::test]
    async fn large_remainder_is_chunked_by_one_hundred() {
        let fx = fixture(FakeApi::with_numbered_plan(250)).await;

        let report = fx.reconciler.reconcile().await;

        let sizes: Vec<usize> = fx
            .api
            .state
            .lock()
            .result_batches
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(report.patched, 250);
        assert_eq!(fx.aggregator.skipped_count(), 250);
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_later_chunks() {
        let fx = fixture(FakeApi::with_numbered_plan(250)).await;
        fx.api.fail_patch_call(1);

        let report = fx.reconciler.reconcile().await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.patched, 150);
        assert_eq!(fx.aggregator.skipped_count(), 150);
        assert_eq!(fx.api.state.lock().result_batches.len(), 3);
        assert_eq!(
            fx.hooks.enrichment_failures(),
            vec!["enrichment_failed:reconcile_batch:-"]
        );
    }

    #[tokio::test]
    async fn second_pass_only_retries_what_is_left() {
        let fx = fixture(FakeApi::with_numbered_plan(3)).await;
        fx.api.fail("patch results", 1);

        let first = fx.reconciler.reconcile().await;
        let second = fx.reconciler.reconcile().await;
        let third = fx.reconciler.reconcile().await;

        assert_eq!(first.patched, 0);
        assert_eq!(second.patched, 3);
        assert_eq!(third.unexecuted, 0);
        assert_eq!(fx.aggregator.skipped_count(), 3);
    }
}
