//! Whole-report generation
//!
//! Builds every piece of a group report from uploaded scores. Group advice
//! (general recommendations and skill analysis) is requested concurrently;
//! per-student advice follows one student at a time. Every request passes
//! through the advisor's queue exactly once, and progress is published on a
//! broadcast channel before each one.

use crate::advisor::{Advice, ReportAdvisor};
use crate::distribution::level_distribution;
use crate::types::{
    ChartData, GeneralRecommendations, Recommendations, ResourceSuggestions, SkillAnalysis,
    StudentScores,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument};

const PROGRESS_CAPACITY: usize = 64;

/// Report generation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStage {
    /// Program-level recommendations
    General,
    /// Per-skill group analysis
    Analysis,
    /// Per-student recommendations
    Individual,
    /// Per-student learning resources
    Resources,
}

/// Progress event published before each queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    /// Step about to be queued
    pub stage: GenerationStage,
    /// 1-based step within the stage
    pub current: usize,
    /// Steps of this kind in the report
    pub total: usize,
    /// Queue wait estimate at publish time
    pub estimated_wait_ms: u64,
}

/// Advice for one student
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAdvice {
    /// Student
    pub student: StudentScores,
    /// Per-skill recommendations
    pub recommendations: Advice<Recommendations>,
    /// Suggested learning resources
    pub resources: Advice<ResourceSuggestions>,
}

/// Everything a group report shows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    /// Level counts per skill plus the overall row
    pub distribution: Vec<ChartData>,
    /// Program-level recommendations
    pub general: Advice<GeneralRecommendations>,
    /// Per-skill group analysis
    pub analysis: Advice<SkillAnalysis>,
    /// Advice per student, in upload order
    pub students: Vec<StudentAdvice>,
    /// Distinct fallback notices, in first-seen order
    pub notices: Vec<String>,
}

impl GeneratedReport {
    /// Whether any section fell back to default content
    #[must_use]
    pub fn has_fallbacks(&self) -> bool {
        !self.notices.is_empty()
    }
}

/// Orchestrates report generation
#[derive(Debug, Clone)]
pub struct ReportFactory {
    advisor: Arc<ReportAdvisor>,
    progress: broadcast::Sender<GenerationProgress>,
}

impl ReportFactory {
    /// Create factory over an advisor
    #[must_use]
    pub fn new(advisor: Arc<ReportAdvisor>) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self { advisor, progress }
    }

    /// Subscribe to progress events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationProgress> {
        self.progress.subscribe()
    }

    /// The underlying advisor
    #[inline]
    #[must_use]
    pub fn advisor(&self) -> &Arc<ReportAdvisor> {
        &self.advisor
    }

    fn publish(&self, stage: GenerationStage, current: usize, total: usize) {
        let wait = self.advisor.queue().estimated_wait(None);
        let event = GenerationProgress {
            stage,
            current,
            total,
            estimated_wait_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
        };
        // No receivers is fine
        let _ = self.progress.send(event);
    }

    /// Generate a full report
    #[instrument(skip_all, fields(students = students.len()))]
    pub async fn generate(&self, students: &[StudentScores]) -> GeneratedReport {
        let distribution = level_distribution(students, self.advisor.scale());

        self.publish(GenerationStage::General, 1, 1);
        self.publish(GenerationStage::Analysis, 1, 1);
        let (general, analysis) = tokio::join!(
            self.advisor.general_recommendations_or_default(&distribution),
            self.advisor.skill_analysis_or_default(&distribution),
        );

        let total = students.len();
        let mut recommendations = Vec::with_capacity(total);
        for (idx, student) in students.iter().enumerate() {
            self.publish(GenerationStage::Individual, idx + 1, total);
            recommendations.push(self.advisor.individual_recommendations_or_default(student).await);
        }

        let mut per_student = Vec::with_capacity(total);
        for ((idx, student), recs) in students.iter().enumerate().zip(recommendations) {
            self.publish(GenerationStage::Resources, idx + 1, total);
            let resources = self.advisor.resources_or_default(student).await;
            per_student.push(StudentAdvice {
                student: student.clone(),
                recommendations: recs,
                resources,
            });
        }

        let mut notices: Vec<String> = Vec::new();
        let all_notices = [general.notice.as_ref(), analysis.notice.as_ref()]
            .into_iter()
            .chain(per_student.iter().flat_map(|s| {
                [s.recommendations.notice.as_ref(), s.resources.notice.as_ref()]
            }))
            .flatten();
        for notice in all_notices {
            if !notices.contains(notice) {
                notices.push(notice.clone());
            }
        }

        info!(
            students = total,
            fallbacks = notices.len(),
            "report generated"
        );

        GeneratedReport {
            distribution,
            general,
            analysis,
            students: per_student,
            notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::AdviceSource;
    use crate::config::CacheConfig;
    use crate::error::GenerationError;
    use crate::generator::MockTextGenerator;
    use crate::scale::ToeflScale;
    use scorecard_queue::{QueueConfig, RateLimitedQueue};

    fn factory(generator: MockTextGenerator) -> ReportFactory {
        let queue = RateLimitedQueue::new(QueueConfig::new().with_requests_per_minute(60_000)).unwrap();
        let advisor = ReportAdvisor::new(
            queue,
            Arc::new(generator),
            Arc::new(ToeflScale),
            CacheConfig::default(),
        );
        ReportFactory::new(Arc::new(advisor))
    }

    #[tokio::test]
    async fn failing_provider_yields_complete_fallback_report() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(6)
            .returning(|_| Err(GenerationError::EmptyResponse));
        let factory = factory(generator);
        let mut progress = factory.subscribe();

        let students = vec![
            StudentScores::new("Ana", "Ruiz", [25, 25, 25, 25]),
            StudentScores::new("Luis", "Paz", [10, 12, 16, 13]),
        ];
        let report = factory.generate(&students).await;

        assert_eq!(report.distribution.len(), 5);
        assert_eq!(report.students.len(), 2);
        assert_eq!(report.general.source, AdviceSource::Fallback);
        assert!(report.students.iter().all(|s| s.resources.is_fallback()));
        assert_eq!(report.notices.len(), 1);
        assert!(report.has_fallbacks());

        let mut stages = Vec::new();
        while let Ok(event) = progress.try_recv() {
            stages.push((event.stage, event.current, event.total));
        }
        assert_eq!(
            stages,
            vec![
                (GenerationStage::General, 1, 1),
                (GenerationStage::Analysis, 1, 1),
                (GenerationStage::Individual, 1, 2),
                (GenerationStage::Individual, 2, 2),
                (GenerationStage::Resources, 1, 2),
                (GenerationStage::Resources, 2, 2),
            ]
        );
    }

    #[test]
    fn progress_serializes_camel_case() {
        let event = GenerationProgress {
            stage: GenerationStage::Individual,
            current: 1,
            total: 3,
            estimated_wait_ms: 8000,
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["stage"], "individual");
        assert_eq!(value["estimatedWaitMs"], 8000);
    }
}
