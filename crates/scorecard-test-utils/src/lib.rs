//! Testing utilities for the scorecard workspace
//!
//! Shared fixtures, scripted generators and queue observers.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scorecard_core::{
    CacheConfig, GenerationError, ReportAdvisor, StudentScores, TextGenerator, ToeflScale,
};
use scorecard_queue::{QueueConfig, QueueSnapshot, RateLimitedQueue, SubscriptionId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const INDIVIDUAL_JSON: &str = r#"```json
{
  "READING": {"strengths": ["Strong inference"], "weaknesses": ["Speed"], "shortTermActions": ["Timed passages"], "longTermStrategy": ["Read journals"]},
  "LISTENING": {"strengths": ["Main ideas"], "weaknesses": ["Details"], "shortTermActions": ["Dictation"], "longTermStrategy": ["Podcasts"]},
  "SPEAKING": {"strengths": ["Fluency"], "weaknesses": ["Pronunciation"], "shortTermActions": ["Shadowing"], "longTermStrategy": ["Conversation club"]},
  "WRITING": {"strengths": ["Structure"], "weaknesses": ["Grammar"], "shortTermActions": ["Daily journal"], "longTermStrategy": ["Peer review"]}
}
```"#;

pub const RESOURCES_JSON: &str = r#"{
  "categories": [
    {
      "category": "Practice Platforms",
      "description": "Targeted TOEFL practice",
      "resources": [
        {"name": "TOEFL Practice Online", "description": "Official tests", "url": "https://www.ets.org/toefl", "type": "practice", "focus": ["READING", "LISTENING"]}
      ]
    }
  ]
}"#;

pub const GENERAL_JSON: &str = r#"```json
{"shortTermActions": ["Weekly listening labs"], "longTermStrategy": ["Integrated skills curriculum"]}
```"#;

pub const ANALYSIS_JSON: &str = r#"{
  "Reading": {"strengths": ["Most students at B2 or above"], "improvements": ["Few reach C2"]},
  "Listening": {"strengths": ["Even spread"], "improvements": ["A2 cluster"]},
  "Speaking": {"strengths": ["Confident delivery"], "improvements": ["Accuracy"]},
  "Writing": {"strengths": ["Organisation"], "improvements": ["Range of vocabulary"]}
}"#;

/// A small group with a spread of levels
pub fn sample_students() -> Vec<StudentScores> {
    vec![
        StudentScores::new("Ana", "García", [29, 27, 26, 28])
            .with_feedback("Natural pacing and clear pronunciation.", "Well organised essays."),
        StudentScores::new("Luis", "Pérez", [18, 17, 20, 17])
            .with_feedback("Hesitates on complex topics.", "Frequent article errors."),
        StudentScores::new("Marta", "López", [3, 8, 15, 12]),
    ]
}

/// Queue settings that keep tests fast in real time
pub fn fast_queue_config() -> QueueConfig {
    QueueConfig::new()
        .with_requests_per_minute(60_000)
        .with_max_pending(100)
}

/// Advice kind a prompt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Individual,
    Resources,
    General,
    Analysis,
}

impl PromptKind {
    pub fn of(prompt: &str) -> Self {
        if prompt.contains("\"categories\"") {
            Self::Resources
        } else if prompt.contains("\"improvements\"") {
            Self::Analysis
        } else if prompt.contains("Student Data") {
            Self::Individual
        } else {
            Self::General
        }
    }
}

/// Answers every prompt with canned JSON and counts calls
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<PromptKind>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Kinds of prompts seen, in call order
    pub fn prompt_kinds(&self) -> Vec<PromptKind> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kind = PromptKind::of(prompt);
        self.prompts.lock().push(kind);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(match kind {
            PromptKind::Individual => INDIVIDUAL_JSON,
            PromptKind::Resources => RESOURCES_JSON,
            PromptKind::General => GENERAL_JSON,
            PromptKind::Analysis => ANALYSIS_JSON,
        }
        .to_string())
    }
}

/// Fails every call with an upstream status
#[derive(Debug)]
pub struct FailingGenerator {
    status: u16,
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Upstream {
            status: self.status,
            body: "scripted failure".to_string(),
        })
    }
}

/// Collects every snapshot a queue publishes
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    seen: Arc<Mutex<Vec<QueueSnapshot>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `queue`
    pub fn attach(&self, queue: &RateLimitedQueue) -> SubscriptionId {
        let seen = Arc::clone(&self.seen);
        queue.subscribe(move |snapshot| seen.lock().push(snapshot))
    }

    pub fn snapshots(&self) -> Vec<QueueSnapshot> {
        self.seen.lock().clone()
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.seen.lock().iter().map(|s| s.queue_length).collect()
    }
}

/// Advisor over a fast queue and the TOEFL scale
pub fn test_advisor(generator: Arc<dyn TextGenerator>) -> ReportAdvisor {
    test_advisor_with_queue(generator, fast_queue_config())
}

pub fn test_advisor_with_queue(generator: Arc<dyn TextGenerator>, queue: QueueConfig) -> ReportAdvisor {
    let queue = RateLimitedQueue::new(queue).unwrap();
    ReportAdvisor::new(queue, generator, Arc::new(ToeflScale), CacheConfig::default())
}
