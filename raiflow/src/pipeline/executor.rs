//! Concurrent execution of a match plan.

use super::{
    CancellationToken, ExecutorConfig, FailureKind, FailureRecord, PairRecord, PairStatus,
    RunResult, RunStatus,
};
use crate::artifact::{Artifact, ArtifactSet};
use crate::errors::RaiflowError;
use crate::events::{event_types, get_event_sink, EventSink};
use crate::evidence::{AssessmentRef, Evidence, EvidenceDraft, EvidenceType, Provenance};
use crate::matcher::{MatchPlan, PlannedPair, SkipReason};
use crate::registry::Assessment;
use crate::utils::{generate_uuid_v7, now_utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What an invocation returned: drafts, or a failure kind and message.
type InvocationResult = Result<Vec<EvidenceDraft>, (FailureKind, String)>;

/// Pair index, duration in milliseconds, and the invocation outcome.
type Settled = (usize, u64, InvocationResult);

struct Invocation {
    assessment: Arc<dyn Assessment>,
    artifacts: Vec<Arc<Artifact>>,
    params: Value,
}

/// Runs planned pairs in a bounded pool of tokio tasks.
///
/// Every pair runs in its own task, so an error, timeout or panic in one
/// pair is recorded against that pair only.
pub struct PipelineExecutor {
    config: ExecutorConfig,
    sink: Arc<dyn EventSink>,
}

impl PipelineExecutor {
    /// Creates an executor using the default event sink.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            sink: get_event_sink(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes every pair of the plan.
    ///
    /// Fails before anything runs if an artifact is stale or a planned
    /// artifact id is not in `artifacts`. Pair failures never fail the call.
    pub async fn execute(&self, plan: &MatchPlan, artifacts: &ArtifactSet) -> Result<RunResult, RaiflowError> {
        self.execute_with_cancellation(plan, artifacts, Arc::new(CancellationToken::new()))
            .await
    }

    /// Executes the plan until done or until `token` is cancelled.
    pub async fn execute_with_cancellation(
        &self,
        plan: &MatchPlan,
        artifacts: &ArtifactSet,
        token: Arc<CancellationToken>,
    ) -> Result<RunResult, RaiflowError> {
        if self.config.fail_on_stale {
            artifacts.ensure_fresh()?;
        }
        let resolved = plan
            .pairs()
            .iter()
            .map(|p| artifacts.resolve(p.artifact_ids()))
            .collect::<Result<Vec<_>, _>>()?;

        let run_id = generate_uuid_v7().to_string();
        let started_at = now_utc();
        let mut records: Vec<PairRecord> = plan
            .pairs()
            .iter()
            .map(|p| PairRecord::new(p.reference(), p.artifact_ids().to_vec()))
            .collect();
        let mut evidence = Vec::new();
        let mut failures = Vec::new();

        info!(
            run_id = %run_id,
            pairs = records.len(),
            skipped = plan.skipped().len(),
            max_concurrency = self.config.concurrency(),
            "Run started"
        );
        self.sink.try_emit(
            event_types::RUN_STARTED,
            Some(json!({
                "run_id": run_id,
                "pairs": records.len(),
                "skipped": plan.skipped().len(),
            })),
        );
        for skipped in plan.skipped() {
            debug!(
                run_id = %run_id,
                assessment = %skipped.assessment,
                detail = %skipped.detail,
                "Assessment skipped"
            );
            self.sink.try_emit(
                event_types::PAIR_SKIPPED,
                Some(json!({
                    "run_id": run_id,
                    "assessment": skipped.assessment.name,
                    "version": skipped.assessment.version,
                    "reason": skipped.reason,
                    "detail": skipped.detail,
                })),
            );
        }

        let mut pending = plan.pairs().iter().zip(resolved).enumerate();
        let mut active: FuturesUnordered<BoxFuture<'static, Settled>> = FuturesUnordered::new();
        let limit = self.config.concurrency();

        loop {
            while active.len() < limit && !token.is_cancelled() {
                let Some((index, (pair, pair_artifacts))) = pending.next() else {
                    break;
                };
                let record = &mut records[index];
                record.transition(PairStatus::Running)?;
                let invocation_id = generate_uuid_v7().to_string();
                record.invocation_id = Some(invocation_id.clone());

                debug!(
                    run_id = %run_id,
                    assessment = %record.assessment,
                    artifacts = ?record.artifact_ids,
                    invocation_id = %invocation_id,
                    "Pair started"
                );
                self.sink.try_emit(event_types::PAIR_STARTED, Some(pair_event(&run_id, record)));

                let invocation = Invocation {
                    assessment: pair.assessment().clone(),
                    artifacts: pair_artifacts,
                    params: self.config.params_for(pair.assessment().name()),
                };
                active.push(spawn_invocation(index, invocation, self.config.timeout(), token.clone()));
            }

            let Some((index, duration_ms, settled)) = active.next().await else {
                break;
            };

            let pair = &plan.pairs()[index];
            let record = &mut records[index];
            record.duration_ms = Some(duration_ms);

            let outcome = settled.and_then(|drafts| {
                finalize(pair.assessment().as_ref(), record, drafts)
                    .map_err(|msg| (FailureKind::SchemaViolation, msg))
            });

            match outcome {
                Ok(produced) => {
                    record.transition(PairStatus::Succeeded)?;
                    record.evidence_count = produced.len();
                    debug!(
                        run_id = %run_id,
                        assessment = %record.assessment,
                        evidence = produced.len(),
                        duration_ms,
                        "Pair succeeded"
                    );
                    self.sink.try_emit(event_types::PAIR_SUCCEEDED, Some(pair_event(&run_id, record)));
                    evidence.extend(produced);
                }
                Err((kind, message)) => {
                    record.transition(PairStatus::Failed)?;
                    warn!(
                        run_id = %run_id,
                        assessment = %record.assessment,
                        artifacts = ?record.artifact_ids,
                        kind = %kind,
                        error = %message,
                        "Pair failed"
                    );
                    let mut data = pair_event(&run_id, record);
                    data["kind"] = json!(kind);
                    data["error"] = json!(message);
                    self.sink.try_emit(event_types::PAIR_FAILED, Some(data));

                    let mut failure = FailureRecord::new(
                        record.assessment.clone(),
                        record.artifact_ids.clone(),
                        kind,
                        message,
                    );
                    if kind == FailureKind::Timeout {
                        failure = failure.with_context("timeout_ms", json!(self.config.timeout_ms));
                    }
                    failures.push(failure);
                }
            }
        }

        for (index, _) in pending {
            let record = &mut records[index];
            record.transition(PairStatus::Skipped)?;
            record.skip_reason = Some(SkipReason::Cancelled);
            let mut data = pair_event(&run_id, record);
            data["reason"] = json!(SkipReason::Cancelled);
            self.sink.try_emit(event_types::PAIR_SKIPPED, Some(data));
        }

        let mut result = RunResult {
            run_id,
            retry_of: None,
            status: RunStatus::Running,
            started_at,
            completed_at: now_utc(),
            pairs: records,
            evidence,
            failures,
            skipped: plan.skipped().to_vec(),
            cancelled: token.is_cancelled().then(|| token.reason().unwrap_or_default()),
        };
        result.refresh_status();

        info!(
            run_id = %result.run_id,
            status = %result.status,
            succeeded = result.succeeded(),
            failed = result.failed(),
            skipped = result.skipped_pairs(),
            evidence = result.evidence.len(),
            "Run completed"
        );
        self.sink.try_emit(
            event_types::RUN_COMPLETED,
            Some(json!({
                "run_id": result.run_id,
                "status": result.status,
                "succeeded": result.succeeded(),
                "failed": result.failed(),
                "skipped": result.skipped_pairs(),
            })),
        );
        Ok(result)
    }

    /// Re-runs only the pairs that failed in `previous`.
    ///
    /// Succeeded evidence from `previous` is kept. The result is a new run
    /// whose `retry_of` names the previous one.
    pub async fn retry_failed(
        &self,
        previous: &RunResult,
        plan: &MatchPlan,
        artifacts: &ArtifactSet,
    ) -> Result<RunResult, RaiflowError> {
        let failed: BTreeSet<(AssessmentRef, Vec<String>)> = previous
            .pairs
            .iter()
            .filter(|p| p.status() == PairStatus::Failed)
            .map(PairRecord::key)
            .collect();
        let retry_plan = plan.clone().retain(|p| failed.contains(&p.key()));
        let retried: BTreeSet<(AssessmentRef, Vec<String>)> =
            retry_plan.pairs().iter().map(PlannedPair::key).collect();

        info!(
            previous_run = %previous.run_id,
            failed = failed.len(),
            retrying = retried.len(),
            "Retrying failed pairs"
        );
        let rerun = self.execute(&retry_plan, artifacts).await?;

        let mut pairs = previous.pairs.clone();
        for record in rerun.pairs {
            if let Some(slot) = pairs.iter_mut().find(|p| p.key() == record.key()) {
                *slot = record;
            }
        }

        let mut failures: Vec<FailureRecord> = previous
            .failures
            .iter()
            .filter(|f| !retried.contains(&(f.assessment.clone(), f.artifact_ids.clone())))
            .cloned()
            .collect();
        failures.extend(rerun.failures);

        let mut evidence = previous.evidence.clone();
        evidence.extend(rerun.evidence);

        let mut result = RunResult {
            run_id: rerun.run_id,
            retry_of: Some(previous.run_id.clone()),
            status: RunStatus::Running,
            started_at: rerun.started_at,
            completed_at: rerun.completed_at,
            pairs,
            evidence,
            failures,
            skipped: previous.skipped.clone(),
            cancelled: rerun.cancelled,
        };
        result.refresh_status();
        Ok(result)
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn pair_event(run_id: &str, record: &PairRecord) -> Value {
    json!({
        "run_id": run_id,
        "assessment": record.assessment.name,
        "version": record.assessment.version,
        "artifact_ids": record.artifact_ids,
        "invocation_id": record.invocation_id,
        "status": record.status(),
    })
}

/// Spawns one invocation and races it against the deadline and the token.
///
/// The deadline is enforced on the join handle, so an assessment that
/// blocks its thread still times out; the task is aborted either way.
fn spawn_invocation(
    index: usize,
    invocation: Invocation,
    timeout: Duration,
    token: Arc<CancellationToken>,
) -> BoxFuture<'static, Settled> {
    async move {
        let started = Instant::now();
        let mut handle = tokio::spawn(invoke(invocation));
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                handle.abort();
                Err((
                    FailureKind::Cancelled,
                    format!("run cancelled: {}", token.reason().unwrap_or_default()),
                ))
            }
            joined = &mut handle => joined
                .unwrap_or_else(|e| Err((FailureKind::AssessmentInternalError, join_failure(e)))),
            () = tokio::time::sleep(timeout) => {
                handle.abort();
                Err((
                    FailureKind::Timeout,
                    format!("exceeded timeout of {} ms", timeout.as_millis()),
                ))
            }
        };
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        (index, elapsed, outcome)
    }
    .boxed()
}

async fn invoke(invocation: Invocation) -> InvocationResult {
    invocation
        .assessment
        .run(&invocation.artifacts, &invocation.params)
        .await
        .map_err(|e| (FailureKind::AssessmentInternalError, e.to_string()))
}

/// Validates drafts against the declared types and schemas. Any invalid
/// draft fails the whole pair.
fn finalize(
    assessment: &dyn Assessment,
    record: &PairRecord,
    drafts: Vec<EvidenceDraft>,
) -> Result<Vec<Evidence>, String> {
    let declared: BTreeSet<EvidenceType> = assessment.evidence_types().into_iter().collect();
    let produced_at = now_utc();
    let invocation_id = record.invocation_id.clone().unwrap_or_default();

    drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| {
            let evidence_type = draft.evidence_type();
            if !declared.contains(&evidence_type) {
                return Err(format!("evidence {i}: undeclared evidence type '{evidence_type}'"));
            }
            let provenance = Provenance {
                artifact_ids: record.artifact_ids.clone(),
                invocation_id: invocation_id.clone(),
                produced_at,
            };
            Evidence::from_draft(draft, record.assessment.clone(), provenance, i)
                .map_err(|e| format!("evidence {i}: {e}"))
        })
        .collect()
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("task aborted: {err}");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("assessment panicked: {message}")
}
