//! Core types for Scorecard
//!
//! Defines the data flowing through report generation:
//! - Skills and proficiency levels
//! - Uploaded student score rows
//! - Generated advice (recommendations, skill analysis, resources)
//! - Level distribution rows

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Assessed skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Skill {
    /// Reading
    Reading,
    /// Listening
    Listening,
    /// Speaking
    Speaking,
    /// Writing
    Writing,
}

impl Skill {
    /// All skills in report order
    pub const ALL: [Skill; 4] = [Skill::Reading, Skill::Listening, Skill::Speaking, Skill::Writing];

    /// Upper-case wire name (`READING`)
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "READING",
            Self::Listening => "LISTENING",
            Self::Speaking => "SPEAKING",
            Self::Writing => "WRITING",
        }
    }

    /// Title-case label used in distribution and analysis (`Reading`)
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Reading => "Reading",
            Self::Listening => "Listening",
            Self::Speaking => "Speaking",
            Self::Writing => "Writing",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CEFR proficiency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Mastery
    C2,
    /// Advanced
    C1,
    /// Upper intermediate
    B2,
    /// Intermediate
    B1,
    /// Elementary and below
    A2,
}

impl Level {
    /// Levels from highest to lowest
    pub const ALL: [Level; 5] = [Level::C2, Level::C1, Level::B2, Level::B1, Level::A2];

    /// Label used in prompts and chart rows
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::C2 => "C2",
            Self::C1 => "C1",
            Self::B2 => "B2",
            Self::B1 => "B1",
            Self::A2 => "A2",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded score row
///
/// Field names follow the spreadsheet headers. Scores tolerate numeric
/// strings and missing cells (read as 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentScores {
    /// First name
    #[serde(rename = "Nombre", default, deserialize_with = "lenient_text")]
    pub first_name: String,
    /// Last name
    #[serde(rename = "Apellido(s)", default, deserialize_with = "lenient_text")]
    pub last_name: String,
    /// Reading
    #[serde(rename = "READING", default, deserialize_with = "lenient_score")]
    pub reading: u32,
    /// Listening
    #[serde(rename = "LISTENING", default, deserialize_with = "lenient_score")]
    pub listening: u32,
    /// Speaking
    #[serde(rename = "SPEAKING", default, deserialize_with = "lenient_score")]
    pub speaking: u32,
    /// Examiner notes on speaking
    #[serde(rename = "FEEDBACK SPEAKING", default, deserialize_with = "lenient_text")]
    pub speaking_feedback: String,
    /// Writing
    #[serde(rename = "WRITING", default, deserialize_with = "lenient_score")]
    pub writing: u32,
    /// Examiner notes on writing
    #[serde(rename = "FEEDBACK WRITING", default, deserialize_with = "lenient_text")]
    pub writing_feedback: String,
}

impl StudentScores {
    /// Create a row with the four section scores
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        [reading, listening, speaking, writing]: [u32; 4],
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            reading,
            listening,
            speaking,
            speaking_feedback: String::new(),
            writing,
            writing_feedback: String::new(),
        }
    }

    /// With speaking and writing feedback
    #[must_use]
    pub fn with_feedback(mut self, speaking: impl Into<String>, writing: impl Into<String>) -> Self {
        self.speaking_feedback = speaking.into();
        self.writing_feedback = writing.into();
        self
    }

    /// Section score
    #[inline]
    #[must_use]
    pub fn score(&self, skill: Skill) -> u32 {
        match skill {
            Skill::Reading => self.reading,
            Skill::Listening => self.listening,
            Skill::Speaking => self.speaking,
            Skill::Writing => self.writing,
        }
    }

    /// Examiner feedback; only speaking and writing carry any
    #[must_use]
    pub fn feedback(&self, skill: Skill) -> Option<&str> {
        let text = match skill {
            Skill::Speaking => &self.speaking_feedback,
            Skill::Writing => &self.writing_feedback,
            Skill::Reading | Skill::Listening => return None,
        };
        (!text.trim().is_empty()).then_some(text.as_str())
    }

    /// Sum of the four section scores
    #[inline]
    #[must_use]
    pub fn total_score(&self) -> u32 {
        Skill::ALL.iter().map(|skill| self.score(*skill)).sum()
    }

    /// `First Last`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Both name parts present
    #[inline]
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };

    if number.is_finite() && number > 0.0 {
        Ok(number.round().min(f64::from(u32::MAX)) as u32)
    } else {
        Ok(0)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Advice for one skill of one student
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillRecommendation {
    /// Strengths
    pub strengths: Vec<String>,
    /// Weaknesses
    pub weaknesses: Vec<String>,
    /// Actions for the coming weeks
    pub short_term_actions: Vec<String>,
    /// Longer-running study plan
    pub long_term_strategy: Vec<String>,
    /// Named study materials
    pub resources: Vec<String>,
}

/// Per-skill advice for one student
pub type Recommendations = BTreeMap<Skill, SkillRecommendation>;

/// Program-level advice for a whole group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralRecommendations {
    /// Actions for the coming weeks
    pub short_term_actions: Vec<String>,
    /// Longer-running study plan
    pub long_term_strategy: Vec<String>,
}

/// Group observations for one skill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillInsight {
    /// Strengths
    pub strengths: Vec<String>,
    /// Areas the group should work on
    pub improvements: Vec<String>,
}

/// Group observations keyed by skill label (`Reading`, ...)
pub type SkillAnalysis = BTreeMap<String, SkillInsight>;

/// Kind of learning resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// App
    App,
    /// Website
    Website,
    /// Tool
    Tool,
    /// Practice tests and exercises
    Practice,
    /// Course
    Course,
    /// Anything the provider labels otherwise
    #[serde(other)]
    Other,
}

/// One suggested learning resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Kind
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Skills the resource targets
    #[serde(default)]
    pub focus: Vec<String>,
}

/// Resources grouped under a heading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCategory {
    /// Category title
    pub category: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Resources
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Resource suggestions for one student
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSuggestions {
    /// Categories
    #[serde(default)]
    pub categories: Vec<ResourceCategory>,
}

/// Level counts and average for one skill (or `Overall`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Skill label or `Overall`
    pub skill: String,
    /// Students at C2
    #[serde(rename = "C2", default)]
    pub c2: u32,
    /// Students at C1
    #[serde(rename = "C1", default)]
    pub c1: u32,
    /// Students at B2
    #[serde(rename = "B2", default)]
    pub b2: u32,
    /// Students at B1
    #[serde(rename = "B1", default)]
    pub b1: u32,
    /// Students at A2
    #[serde(rename = "A2", default)]
    pub a2: u32,
    /// Mean score, two decimals
    #[serde(default)]
    pub average: f64,
}

impl ChartData {
    /// Empty row for a skill label
    #[must_use]
    pub fn empty(skill: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            ..Self::default()
        }
    }

    /// Count for one level
    #[must_use]
    pub fn count(&self, level: Level) -> u32 {
        match level {
            Level::C2 => self.c2,
            Level::C1 => self.c1,
            Level::B2 => self.b2,
            Level::B1 => self.b1,
            Level::A2 => self.a2,
        }
    }

    /// Increment one level
    pub fn record(&mut self, level: Level) {
        match level {
            Level::C2 => self.c2 += 1,
            Level::C1 => self.c1 += 1,
            Level::B2 => self.b2 += 1,
            Level::B1 => self.b1 += 1,
            Level::A2 => self.a2 += 1,
        }
    }

    /// Students counted in this row
    #[must_use]
    pub fn total(&self) -> u32 {
        Level::ALL.iter().map(|level| self.count(*level)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_row_reads_spreadsheet_headers() {
        let row: StudentScores = serde_json::from_value(json!({
            "Nombre": "Ana",
            "Apellido(s)": "García",
            "READING": 24,
            "LISTENING": "19",
            "SPEAKING": 20.6,
            "FEEDBACK SPEAKING": "Clear pronunciation.",
            "WRITING": null,
            "FEEDBACK WRITING": 3
        }))
        .unwrap();

        assert_eq!(row.full_name(), "Ana García");
        assert_eq!(row.reading, 24);
        assert_eq!(row.listening, 19);
        assert_eq!(row.speaking, 21);
        assert_eq!(row.writing, 0);
        assert_eq!(row.writing_feedback, "3");
        assert_eq!(row.feedback(Skill::Speaking), Some("Clear pronunciation."));
        assert_eq!(row.feedback(Skill::Reading), None);
        assert_eq!(row.total_score(), 64);
    }

    #[test]
    fn missing_name_is_detected() {
        let row: StudentScores = serde_json::from_value(json!({ "READING": 10 })).unwrap();
        assert!(!row.has_name());
        assert!(StudentScores::new("Ana", "Ruiz", [1, 2, 3, 4]).has_name());
    }

    #[test]
    fn garbage_scores_read_as_zero() {
        let row: StudentScores = serde_json::from_value(json!({
            "Nombre": "A", "Apellido(s)": "B", "READING": "n/a", "LISTENING": -4
        }))
        .unwrap();
        assert_eq!(row.reading, 0);
        assert_eq!(row.listening, 0);
    }

    #[test]
    fn recommendations_use_upper_case_skill_keys() {
        let mut recs = Recommendations::new();
        recs.insert(Skill::Reading, SkillRecommendation::default());
        let value = serde_json::to_value(&recs).unwrap();
        assert!(value.get("READING").is_some());
        assert!(value["READING"].get("shortTermActions").is_some());
    }

    #[test]
    fn unknown_resource_type_is_other() {
        let resource: Resource = serde_json::from_value(json!({
            "name": "Podcast", "type": "podcast"
        }))
        .unwrap();
        assert_eq!(resource.kind, ResourceKind::Other);
        assert!(resource.focus.is_empty());
    }

    #[test]
    fn chart_row_counts() {
        let mut row = ChartData::empty("Reading");
        row.record(Level::B2);
        row.record(Level::B2);
        row.record(Level::C1);
        assert_eq!(row.count(Level::B2), 2);
        assert_eq!(row.total(), 3);

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["B2"], 2);
    }
}
