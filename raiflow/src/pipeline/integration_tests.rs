//! End-to-end tests: wrap, match, execute, aggregate and export.

use crate::artifact::{wrap, ArtifactSet, Capability, CapabilityPredicate, ModelArtifact};
use crate::events::{event_types, CollectingEventSink};
use crate::export::{ExportConfig, GovernanceExporter, InMemoryGovernance, JitterStrategy, LocalSink, RetryConfig};
use crate::matcher::{match_assessments, MatchPlan, SkipReason};
use crate::pipeline::{
    CancellationToken, ExecutorConfig, FailureKind, PairStatus, PipelineExecutor, RunStatus,
};
use crate::registry::{
    Assessment, AssessmentRegistry, DataProfilerAssessment, PerformanceAssessment, Requirements, Slot,
};
use crate::report::{aggregate, ReportSummary};
use crate::testing::{
    assert_failed_with, assert_pair_status, find_metric, fixtures, BlockingClassifier,
    FailingAssessment, SlowAssessment, StaticAssessment, ThresholdClassifier,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn fairness() -> StaticAssessment {
    StaticAssessment::metric("fairness", "1.0.0", 0.08).with_requirements(
        Requirements::new().slot(Slot::dataset("data").requiring(CapabilityPredicate::all_of([
            Capability::Labels,
            Capability::SensitiveFeatures,
        ]))),
    )
}

fn explainability_requirements() -> Requirements {
    Requirements::new().slot(Slot::model("model").requiring(CapabilityPredicate::has(Capability::Predict)))
}

fn explainability() -> StaticAssessment {
    StaticAssessment::metric("explainability", "1.0.0", 0.9)
        .with_requirements(explainability_requirements())
}

fn privacy() -> StaticAssessment {
    let pii = Capability::custom("has_raw_pii").unwrap();
    StaticAssessment::metric("privacy", "1.0.0", 1.0)
        .with_requirements(Requirements::new().slot(Slot::dataset("data").requiring(CapabilityPredicate::has(pii))))
}

fn registry(assessments: Vec<Arc<dyn Assessment>>) -> AssessmentRegistry {
    let registry = AssessmentRegistry::new();
    for assessment in assessments {
        registry.register(assessment).unwrap();
    }
    registry
}

fn setup(assessments: Vec<Arc<dyn Assessment>>) -> (ArtifactSet, MatchPlan) {
    let artifacts = fixtures::credit_artifacts().unwrap();
    let plan = match_assessments(&artifacts, &registry(assessments));
    (artifacts, plan)
}

#[tokio::test]
async fn test_fairness_and_explainability_both_run() {
    let (artifacts, plan) = setup(vec![Arc::new(fairness()), Arc::new(explainability())]);
    assert_eq!(plan.len(), 2);

    let run = PipelineExecutor::new(ExecutorConfig::new()).execute(&plan, &artifacts).await.unwrap();
    let report = aggregate(run);

    assert_eq!(report.status(), RunStatus::Complete);
    assert_eq!(report.evidence().len(), 2);
    assert_eq!(
        report.summary(),
        ReportSummary {
            total: 2,
            succeeded: 2,
            failed: 0,
            skipped: 0,
            evidence: 2,
        }
    );
    assert!(report.validate().is_ok());
}

#[tokio::test]
async fn test_unmet_capability_is_skipped_not_failed() {
    let (artifacts, plan) = setup(vec![Arc::new(fairness()), Arc::new(explainability()), Arc::new(privacy())]);
    assert_eq!(plan.skipped().len(), 1);

    let run = PipelineExecutor::new(ExecutorConfig::new()).execute(&plan, &artifacts).await.unwrap();
    let report = aggregate(run);

    assert_eq!(report.status(), RunStatus::Complete);
    assert_eq!(report.evidence().len(), 2);
    assert_eq!(report.summary().skipped, 1);
    assert_eq!(report.summary().failed, 0);

    let entry = report
        .manifest()
        .iter()
        .find(|e| e.assessment.name == "privacy")
        .unwrap();
    assert_eq!(entry.status, PairStatus::Skipped);
    assert_eq!(entry.skip_reason, Some(SkipReason::CapabilityUnmet));
    assert!(entry.detail.as_deref().unwrap().contains("has_raw_pii"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_yields_partial_run() {
    let slow = SlowAssessment::new("explainability", "1.0.0", Duration::from_secs(5))
        .with_requirements(explainability_requirements());
    let (artifacts, plan) = setup(vec![Arc::new(fairness()), Arc::new(slow)]);

    let run = PipelineExecutor::new(ExecutorConfig::new().with_timeout(Duration::from_secs(2)))
        .execute(&plan, &artifacts)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_pair_status(&run, "fairness", PairStatus::Succeeded);
    assert_pair_status(&run, "explainability", PairStatus::Failed);
    assert_failed_with(&run, "explainability", FailureKind::Timeout);
    assert_eq!(run.failures[0].context["timeout_ms"], 2_000);

    let report = aggregate(run);
    assert_eq!(report.evidence().len(), 1);
    assert!(report.validate().is_ok());
}

#[tokio::test]
async fn test_blocking_classifier_times_out() {
    let classifier = BlockingClassifier::new(ThresholdClassifier::new(0, 4.5), Duration::from_millis(500));
    let model = Arc::new(
        ModelArtifact::new("slow_classifier", Arc::new(classifier)).with_feature_names(fixtures::credit_features()),
    );
    let artifacts = ArtifactSet::from_artifacts([
        wrap(model, None).unwrap(),
        wrap(fixtures::credit_dataset(), None).unwrap(),
    ])
    .unwrap();
    let plan = match_assessments(
        &artifacts,
        &registry(vec![Arc::new(PerformanceAssessment), Arc::new(DataProfilerAssessment)]),
    );
    assert_eq!(plan.len(), 2);

    let run = PipelineExecutor::new(ExecutorConfig::new().with_timeout(Duration::from_millis(50)))
        .execute(&plan, &artifacts)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_failed_with(&run, "performance", FailureKind::Timeout);
    assert_pair_status(&run, "data_profiler", PairStatus::Succeeded);
    assert_eq!(run.failures[0].context["timeout_ms"], 50);
}

#[tokio::test]
async fn test_one_failure_does_not_affect_the_others() {
    let mut assessments: Vec<Arc<dyn Assessment>> = (0..4)
        .map(|i| Arc::new(StaticAssessment::metric(&format!("ok_{i}"), "1.0", 0.5)) as Arc<dyn Assessment>)
        .collect();
    assessments.push(Arc::new(FailingAssessment::new("broken", "1.0", "division by zero")));
    let (artifacts, plan) = setup(assessments);

    let run = PipelineExecutor::new(ExecutorConfig::new().with_max_concurrency(2))
        .execute(&plan, &artifacts)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.succeeded(), 4);
    assert_eq!(run.failed(), 1);
    assert_eq!(run.evidence.len(), 4);
    assert_failed_with(&run, "broken", FailureKind::AssessmentInternalError);
    assert!(run.failures[0].message.contains("division by zero"));
}

#[tokio::test]
async fn test_rerun_on_unchanged_artifacts_has_same_fingerprint() {
    let registry = AssessmentRegistry::with_builtins();
    let artifacts = fixtures::credit_artifacts().unwrap();
    let executor = PipelineExecutor::new(ExecutorConfig::new());

    let first = executor
        .execute(&match_assessments(&artifacts, &registry), &artifacts)
        .await
        .unwrap();
    let second = executor
        .execute(&match_assessments(&artifacts, &registry), &artifacts)
        .await
        .unwrap();
    assert_ne!(first.run_id, second.run_id);

    let (first, second) = (aggregate(first), aggregate(second));
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(find_metric(first.evidence(), "accuracy_score"), Some(0.75));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_keeps_finished_evidence() {
    let (artifacts, plan) = setup(vec![
        Arc::new(StaticAssessment::metric("a_fast", "1.0", 0.5)),
        Arc::new(SlowAssessment::new("b_slow", "1.0", Duration::from_secs(10))),
        Arc::new(StaticAssessment::metric("c_pending", "1.0", 0.5)),
    ]);
    let token = Arc::new(CancellationToken::new());
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel("operator abort");
        })
    };

    let run = PipelineExecutor::new(ExecutorConfig::new().with_max_concurrency(1))
        .execute_with_cancellation(&plan, &artifacts, token)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(run.cancelled.as_deref(), Some("operator abort"));
    assert_eq!(run.status, RunStatus::Partial);
    assert_pair_status(&run, "a_fast", PairStatus::Succeeded);
    assert_pair_status(&run, "b_slow", PairStatus::Failed);
    assert_failed_with(&run, "b_slow", FailureKind::Cancelled);
    assert_pair_status(&run, "c_pending", PairStatus::Skipped);
    assert_eq!(run.pairs[2].skip_reason, Some(SkipReason::Cancelled));

    let report = aggregate(run);
    assert_eq!(report.evidence().len(), 1);
    assert_eq!(report.cancelled(), Some("operator abort"));
    assert!(report.validate().is_ok());
}

#[tokio::test]
async fn test_retry_failed_reruns_only_failures() {
    let flaky = Arc::new(FailingAssessment::times("flaky", "1.0", 1));
    let stable = Arc::new(StaticAssessment::metric("stable", "1.0", 0.5));
    let (artifacts, plan) = setup(vec![
        flaky.clone() as Arc<dyn Assessment>,
        stable.clone() as Arc<dyn Assessment>,
    ]);
    let executor = PipelineExecutor::new(ExecutorConfig::new());

    let first = executor.execute(&plan, &artifacts).await.unwrap();
    assert_eq!(first.status, RunStatus::Partial);

    let retried = executor.retry_failed(&first, &plan, &artifacts).await.unwrap();
    assert_eq!(retried.status, RunStatus::Complete);
    assert_eq!(retried.retry_of.as_deref(), Some(first.run_id.as_str()));
    assert!(retried.failures.is_empty());
    assert_eq!(retried.evidence.len(), 2);
    assert_eq!(flaky.call_count(), 2);
    assert_eq!(stable.call_count(), 1);
}

#[tokio::test]
async fn test_builtins_end_to_end_export() {
    let registry = AssessmentRegistry::with_builtins();
    let artifacts = fixtures::credit_artifacts().unwrap();
    let plan = match_assessments(&artifacts, &registry);
    assert!(plan.skipped().is_empty());

    let events = Arc::new(CollectingEventSink::new());
    let run = PipelineExecutor::new(ExecutorConfig::new())
        .with_event_sink(events.clone())
        .execute(&plan, &artifacts)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Complete);

    let report = aggregate(run);
    report.validate().unwrap();

    let governance = InMemoryGovernance::new().with_tenant("acme").with_transient_failures(1);
    let exporter = GovernanceExporter::new(
        ExportConfig::new()
            .with_use_case("credit-scoring")
            .with_retry(RetryConfig::new().with_base_delay_ms(1).with_jitter(JitterStrategy::None)),
    )
    .with_event_sink(events.clone());

    let receipt = exporter.export(&report, &governance).await.unwrap();
    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.fingerprint, report.fingerprint());

    let again = exporter.export(&report, &governance).await.unwrap();
    assert!(again.duplicate);
    assert_eq!(again.remote_id, receipt.remote_id);
    assert_eq!(governance.len(), 1);

    let stored = governance.get(report.fingerprint()).unwrap();
    assert_eq!(stored.use_case_id.as_deref(), Some("credit-scoring"));
    assert_eq!(stored.evidences.len(), report.evidence().len());
    assert_eq!(events.events_of_type(event_types::EXPORT_ACCEPTED).len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let local = LocalSink::new(dir.path());
    let written = exporter.export(&report, &local).await.unwrap();
    assert!(!written.duplicate);
    assert!(local.path_for(report.fingerprint()).exists());
}
