//! Advice generation
//!
//! [`ReportAdvisor`] turns scores and distributions into advice:
//! - looks the request up in a per-kind moka cache
//! - otherwise queues one generator call on the shared [`RateLimitedQueue`]
//! - parses the JSON answer and caches it
//!
//! The strict methods surface every failure. The `*_or_default` methods
//! never fail; they fall back to static content with a notice.

use crate::config::CacheConfig;
use crate::error::GenerationError;
use crate::fallback;
use crate::generator::TextGenerator;
use crate::prompts;
use crate::scale::LevelScale;
use crate::types::{
    ChartData, GeneralRecommendations, Recommendations, ResourceSuggestions, Skill,
    SkillAnalysis, StudentScores,
};
use moka::future::Cache;
use scorecard_queue::RateLimitedQueue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Where a piece of advice came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    /// Fresh generator answer
    Generated,
    /// Earlier generator answer
    Cached,
    /// Static default content
    Fallback,
}

/// Advice plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice<T> {
    /// The advice itself
    pub content: T,
    /// Where the advice came from
    pub source: AdviceSource,
    /// Why default content was served, for fallbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl<T> Advice<T> {
    fn generated(content: T) -> Self {
        Self {
            content,
            source: AdviceSource::Generated,
            notice: None,
        }
    }

    fn cached(content: T) -> Self {
        Self {
            content,
            source: AdviceSource::Cached,
            notice: None,
        }
    }

    fn fallback(content: T, err: &GenerationError) -> Self {
        Self {
            content,
            source: AdviceSource::Fallback,
            notice: Some(err.notice()),
        }
    }

    /// Whether this is default content
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == AdviceSource::Fallback
    }
}

/// Cached, rate-limited advice generation
pub struct ReportAdvisor {
    queue: RateLimitedQueue,
    generator: Arc<dyn TextGenerator>,
    scale: Arc<dyn LevelScale>,
    individual: Cache<String, Recommendations>,
    resources: Cache<String, ResourceSuggestions>,
    general: Cache<String, GeneralRecommendations>,
    analysis: Cache<String, SkillAnalysis>,
}

impl std::fmt::Debug for ReportAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAdvisor")
            .field("queue", &self.queue)
            .field("cached_individual", &self.individual.entry_count())
            .field("cached_resources", &self.resources.entry_count())
            .field("cached_general", &self.general.entry_count())
            .field("cached_analysis", &self.analysis.entry_count())
            .finish_non_exhaustive()
    }
}

fn build_cache<V>(config: CacheConfig) -> Cache<String, V>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(config.max_entries)
        .time_to_live(config.ttl())
        .build()
}

/// Cache key for per-student advice: name plus everything the prompt sees
#[must_use]
pub fn student_key(student: &StudentScores) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        student.full_name(),
        student.reading,
        student.listening,
        student.speaking,
        student.writing,
        student.speaking_feedback.trim(),
        student.writing_feedback.trim(),
    )
}

/// Cache key for group advice
#[must_use]
pub fn distribution_key(distribution: &[ChartData]) -> String {
    serde_json::to_string(distribution).unwrap_or_default()
}

impl ReportAdvisor {
    /// Create advisor over a shared queue
    pub fn new(
        queue: RateLimitedQueue,
        generator: Arc<dyn TextGenerator>,
        scale: Arc<dyn LevelScale>,
        cache: CacheConfig,
    ) -> Self {
        Self {
            queue,
            generator,
            scale,
            individual: build_cache(cache),
            resources: build_cache(cache),
            general: build_cache(cache),
            analysis: build_cache(cache),
        }
    }

    /// The shared queue
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &RateLimitedQueue {
        &self.queue
    }

    /// The level scale used in prompts
    #[inline]
    #[must_use]
    pub fn scale(&self) -> &dyn LevelScale {
        self.scale.as_ref()
    }

    async fn cached_or_generate<T>(
        &self,
        cache: &Cache<String, T>,
        key: String,
        prompt: String,
        kind: &'static str,
    ) -> Result<Advice<T>, GenerationError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let Some(hit) = cache.get(&key).await {
            debug!(kind, "advice cache hit");
            return Ok(Advice::cached(hit));
        }

        let generator = Arc::clone(&self.generator);
        let content: T = self
            .queue
            .enqueue(move || async move {
                let text = generator.generate(&prompt).await?;
                prompts::parse_json::<T>(&text)
            })
            .await?;

        cache.insert(key, content.clone()).await;
        debug!(kind, "advice generated");
        Ok(Advice::generated(content))
    }

    /// Per-skill recommendations for one student
    ///
    /// Skills missing from the answer are filled with default advice.
    #[instrument(skip(self, student), fields(student = %student.full_name()))]
    pub async fn individual_recommendations(
        &self,
        student: &StudentScores,
    ) -> Result<Advice<Recommendations>, GenerationError> {
        let prompt = prompts::individual_recommendations(student, self.scale());
        let mut advice = self
            .cached_or_generate(&self.individual, student_key(student), prompt, "individual")
            .await?;

        for skill in Skill::ALL {
            advice
                .content
                .entry(skill)
                .or_insert_with(fallback::skill_recommendation);
        }
        Ok(advice)
    }

    /// Learning resources for one student
    #[instrument(skip(self, student), fields(student = %student.full_name()))]
    pub async fn resources(
        &self,
        student: &StudentScores,
    ) -> Result<Advice<ResourceSuggestions>, GenerationError> {
        let prompt = prompts::resources(student, self.scale());
        self.cached_or_generate(&self.resources, student_key(student), prompt, "resources")
            .await
    }

    /// Program-level recommendations for a distribution
    #[instrument(skip_all)]
    pub async fn general_recommendations(
        &self,
        distribution: &[ChartData],
    ) -> Result<Advice<GeneralRecommendations>, GenerationError> {
        let prompt = prompts::general_recommendations(distribution);
        self.cached_or_generate(&self.general, distribution_key(distribution), prompt, "general")
            .await
    }

    /// Per-skill group analysis for a distribution
    #[instrument(skip_all)]
    pub async fn skill_analysis(
        &self,
        distribution: &[ChartData],
    ) -> Result<Advice<SkillAnalysis>, GenerationError> {
        let prompt = prompts::skill_analysis(distribution);
        self.cached_or_generate(&self.analysis, distribution_key(distribution), prompt, "analysis")
            .await
    }

    /// [`Self::individual_recommendations`], falling back to defaults
    pub async fn individual_recommendations_or_default(
        &self,
        student: &StudentScores,
    ) -> Advice<Recommendations> {
        self.individual_recommendations(student)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "individual recommendations unavailable");
                Advice::fallback(fallback::individual_recommendations(), &err)
            })
    }

    /// [`Self::resources`], falling back to defaults
    pub async fn resources_or_default(&self, student: &StudentScores) -> Advice<ResourceSuggestions> {
        self.resources(student).await.unwrap_or_else(|err| {
            warn!(error = %err, "resource suggestions unavailable");
            Advice::fallback(fallback::resources(), &err)
        })
    }

    /// [`Self::general_recommendations`], falling back to defaults
    pub async fn general_recommendations_or_default(
        &self,
        distribution: &[ChartData],
    ) -> Advice<GeneralRecommendations> {
        self.general_recommendations(distribution)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "general recommendations unavailable");
                Advice::fallback(fallback::general_recommendations(), &err)
            })
    }

    /// [`Self::skill_analysis`], falling back to defaults
    pub async fn skill_analysis_or_default(&self, distribution: &[ChartData]) -> Advice<SkillAnalysis> {
        self.skill_analysis(distribution).await.unwrap_or_else(|err| {
            warn!(error = %err, "skill analysis unavailable");
            Advice::fallback(fallback::skill_analysis(), &err)
        })
    }
}
