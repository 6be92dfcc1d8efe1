//! Scorecard Core - proficiency reports for TOEFL score sheets
//!
//! Turns uploaded score rows into shareable group reports:
//! - Maps section and total scores onto CEFR levels
//! - Computes per-skill level distributions
//! - Generates advice through a rate-limited, cached text generator,
//!   falling back to default content when generation is unavailable
//! - Stores reports and students behind share tokens
//!
//! # Example
//!
//! ```rust,ignore
//! use scorecard_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(students: Vec<StudentScores>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::new().apply_env()?;
//! let queue = RateLimitedQueue::new(config.queue.clone())?;
//! let generator = Arc::new(GeminiClient::new(&config.gemini)?);
//! let advisor = ReportAdvisor::new(queue, generator, Arc::new(ToeflScale), config.cache);
//!
//! let factory = ReportFactory::new(Arc::new(advisor));
//! let report = factory.generate(&students).await;
//! println!("{} students, {} notices", report.students.len(), report.notices.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

/// Cached, queued advice with fallbacks
pub mod advisor;
/// Layered configuration
pub mod config;
/// Level distribution charts
pub mod distribution;
/// Error types
pub mod error;
/// Whole-report generation
pub mod factory;
/// Default advice
pub mod fallback;
/// Text generation provider
pub mod generator;
/// Prompt builders and response parsing
pub mod prompts;
/// Score to level mapping
pub mod scale;
/// Report persistence
pub mod store;
/// Domain types
pub mod types;

// Re-exports for convenience
pub use advisor::{Advice, AdviceSource, ReportAdvisor};
pub use config::{AppConfig, AuthConfig, CacheConfig, GeminiConfig, ServerConfig};
pub use distribution::{level_distribution, OVERALL};
pub use error::{ConfigError, GenerationError, StoreError};
pub use factory::{GeneratedReport, GenerationProgress, GenerationStage, ReportFactory, StudentAdvice};
pub use generator::{GeminiClient, TextGenerator};
pub use scale::{LevelScale, ToeflScale};
pub use store::{
    InMemoryReportStore, NewReport, Report, ReportStore, ReportSummary, StudentRecord,
    StudentShare,
};
pub use types::{
    ChartData, GeneralRecommendations, Level, Recommendations, Resource, ResourceCategory,
    ResourceKind, ResourceSuggestions, Skill, SkillAnalysis, SkillInsight, SkillRecommendation,
    StudentScores,
};

pub use scorecard_queue::{QueueConfig, QueueError, QueueSnapshot, RateLimitedQueue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Scorecard Core
    pub use crate::{
        Advice, AdviceSource, AppConfig, ChartData, GeminiClient, GeneratedReport,
        GenerationError, InMemoryReportStore, LevelScale, NewReport, QueueConfig,
        RateLimitedQueue, ReportAdvisor, ReportFactory, ReportStore, Skill, StudentScores,
        TextGenerator, ToeflScale,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
