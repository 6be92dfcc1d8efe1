//! End-to-end report generation against scripted generators

use scorecard_core::{
    AdviceSource, GenerationStage, InMemoryReportStore, NewReport, ReportFactory, ReportStore,
    Skill, QueueConfig,
};
use scorecard_test_utils::{
    fast_queue_config, sample_students, test_advisor, test_advisor_with_queue, FailingGenerator,
    PromptKind, RecordingObserver, ScriptedGenerator,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn generates_full_report_with_one_call_per_piece() {
    let generator = Arc::new(ScriptedGenerator::new());
    let factory = ReportFactory::new(Arc::new(test_advisor(generator.clone())));
    let students = sample_students();

    let report = factory.generate(&students).await;

    // 2 group calls + 2 per student
    assert_eq!(generator.calls(), 2 + 2 * students.len());
    assert!(!report.has_fallbacks());
    assert_eq!(report.general.source, AdviceSource::Generated);
    assert_eq!(
        report.general.content.short_term_actions,
        vec!["Weekly listening labs"]
    );
    assert_eq!(report.analysis.content["Reading"].improvements, vec!["Few reach C2"]);

    let first = &report.students[0];
    assert_eq!(first.student.first_name, "Ana");
    assert_eq!(
        first.recommendations.content[&Skill::Speaking].short_term_actions,
        vec!["Shadowing"]
    );
    assert_eq!(first.resources.content.categories[0].resources.len(), 1);

    let kinds = generator.prompt_kinds();
    let tail: Vec<PromptKind> = kinds[2..].to_vec();
    assert_eq!(
        tail,
        vec![
            PromptKind::Individual,
            PromptKind::Individual,
            PromptKind::Individual,
            PromptKind::Resources,
            PromptKind::Resources,
            PromptKind::Resources,
        ]
    );
}

#[tokio::test]
async fn regenerating_the_same_group_hits_the_cache() {
    let generator = Arc::new(ScriptedGenerator::new());
    let factory = ReportFactory::new(Arc::new(test_advisor(generator.clone())));
    let students = sample_students();

    factory.generate(&students).await;
    let calls = generator.calls();
    let again = factory.generate(&students).await;

    assert_eq!(generator.calls(), calls);
    assert_eq!(again.general.source, AdviceSource::Cached);
    assert!(again
        .students
        .iter()
        .all(|s| s.recommendations.source == AdviceSource::Cached));
}

#[tokio::test]
async fn provider_outage_still_produces_a_report() {
    let generator = Arc::new(FailingGenerator::with_status(503));
    let factory = ReportFactory::new(Arc::new(test_advisor(generator.clone())));
    let students = sample_students();

    let report = factory.generate(&students).await;

    assert_eq!(generator.calls(), 2 + 2 * students.len());
    assert_eq!(report.students.len(), students.len());
    assert!(report.students.iter().all(|s| s.recommendations.is_fallback()));
    assert_eq!(report.notices.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn report_requests_are_spaced_by_the_queue() {
    let generator = Arc::new(ScriptedGenerator::new());
    let advisor = test_advisor_with_queue(generator.clone(), QueueConfig::new());
    let observer = RecordingObserver::new();
    observer.attach(advisor.queue());
    let factory = ReportFactory::new(Arc::new(advisor));
    let mut progress = factory.subscribe();

    let students = sample_students();
    let started = tokio::time::Instant::now();
    factory.generate(&students[..1]).await;

    // Four requests at 15 rpm: starts at 0s, 4s, 8s, 12s
    assert_eq!(generator.calls(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(12));

    // Both group requests were admitted together; the first started at once
    assert_eq!(observer.lengths()[..2], [0, 1]);

    let first = progress.try_recv().unwrap();
    assert_eq!(first.stage, GenerationStage::General);
    assert_eq!(first.estimated_wait_ms, 0);
    let second = progress.try_recv().unwrap();
    assert_eq!(second.stage, GenerationStage::Analysis);
}

#[tokio::test]
async fn generated_report_can_be_stored_and_shared() {
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(1)));
    let factory = ReportFactory::new(Arc::new(test_advisor_with_queue(
        generator,
        fast_queue_config(),
    )));
    let store = InMemoryReportStore::new();

    let generated = factory.generate(&sample_students()).await;
    let stored = store
        .create_report(NewReport::from_generated("C1 Evening", &generated).unwrap())
        .await
        .unwrap();

    assert_eq!(stored.students.len(), 3);
    assert_eq!(stored.distribution.len(), 5);
    assert!(stored.analysis.is_some());

    let share = store
        .student_by_token(&stored.students[2].share_token)
        .await
        .unwrap();
    assert_eq!(share.student.name, "Marta");
    assert_eq!(share.report.group, "C1 Evening");
    assert_eq!(
        share.student.recommendations["skills"]["WRITING"]["shortTermActions"][0],
        "Daily journal"
    );
}
