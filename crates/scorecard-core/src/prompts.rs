//! Prompt builders and response parsing
//!
//! Each builder embeds the input data as pretty JSON and asks for a JSON
//! answer of a fixed shape. Models tend to wrap that answer in Markdown
//! fences, so [`parse_json`] strips them first.

use crate::error::GenerationError;
use crate::scale::LevelScale;
use crate::types::{ChartData, Skill, StudentScores};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// Score, level and feedback per skill
#[must_use]
pub fn skills_profile(student: &StudentScores, scale: &dyn LevelScale) -> Value {
    let mut profile = Map::new();
    for skill in Skill::ALL {
        let score = student.score(skill);
        let mut entry = json!({
            "score": score,
            "level": scale.level_for(skill, score),
        });
        if let Some(feedback) = student.feedback(skill) {
            entry["feedback"] = Value::String(feedback.to_string());
        }
        profile.insert(skill.as_str().to_string(), entry);
    }
    Value::Object(profile)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn compact(distribution: &[ChartData]) -> String {
    serde_json::to_string(distribution).unwrap_or_default()
}

/// Per-skill recommendations for one student
#[must_use]
pub fn individual_recommendations(student: &StudentScores, scale: &dyn LevelScale) -> String {
    format!(
        r#"Analyze this TOEFL student's performance and generate recommendations.
Student Data: {profile}

Student Data contains:
- Section scores (READING, LISTENING, SPEAKING, WRITING) with their CEFR level
- Feedback for SPEAKING and WRITING (if available)

For each skill provide recommendations in JSON format:
{{
  "READING": {{
    "strengths": ["strength1", "strength2"],
    "weaknesses": ["weakness1", "weakness2"],
    "shortTermActions": ["action1", "action2", "action3"],
    "longTermStrategy": ["strategy1", "strategy2", "strategy3"]
  }},
  "LISTENING": {{same structure}},
  "SPEAKING": {{same structure}},
  "WRITING": {{same structure}}
}}
"#,
        profile = pretty(&skills_profile(student, scale))
    )
}

/// Categorised learning resources for one student
#[must_use]
pub fn resources(student: &StudentScores, scale: &dyn LevelScale) -> String {
    format!(
        r#"As an expert in English language learning and academic preparation, analyze this student's performance and provide personalized resource recommendations.

Student Profile:
{profile}

Consider:
1. The student's current level and weaknesses in each skill.
2. Feedback provided for SPEAKING and WRITING.
3. Current learning tools and platforms.
4. Prefer free resources but include a mix of free and premium options.
5. Both TOEFL preparation and general academic English development.
6. Provide 1-3 resources per category.

Provide recommendations in this exact JSON format:
{{
  "categories": [
    {{
      "category": "category name",
      "description": "brief category description",
      "resources": [
        {{
          "name": "resource name",
          "description": "how it helps the student and why it is recommended",
          "url": "optional URL",
          "type": "app | website | tool | practice | course",
          "focus": ["specific skills or areas targeted by this resource"]
        }}
      ]
    }}
  ]
}}

Include these categories:
- Mobile Learning Apps
- Academic Resources
- Practice Platforms
- Interactive Tools
- Community and Exchange
- Assessment and Tracking
"#,
        profile = pretty(&skills_profile(student, scale))
    )
}

/// Program-level actions for a group distribution
#[must_use]
pub fn general_recommendations(distribution: &[ChartData]) -> String {
    format!(
        r#"Analyze this TOEFL skills distribution data and generate recommendations:
{data}

Generate a JSON response with exactly this structure:
{{
  "shortTermActions": [
    "4 specific immediate actions to improve the weakest areas",
    "should be concrete and actionable",
    "focus on quick wins and critical improvements",
    "consider the current distribution of levels"
  ],
  "longTermStrategy": [
    "4 strategic long-term recommendations",
    "should focus on sustainable improvement",
    "consider program-level changes and systematic approaches",
    "aim for overall skill integration and advancement"
  ]
}}

The recommendations should be in English, specific, based on the actual
data patterns and focused on institutional or program-level actions.
"#,
        data = compact(distribution)
    )
}

/// Strengths and improvements per skill for a group distribution
#[must_use]
pub fn skill_analysis(distribution: &[ChartData]) -> String {
    format!(
        r#"Analyze this TOEFL skills distribution data and provide specific insights for each skill:
{data}

For each skill, analyze level distribution patterns, areas where students
excel, common challenges and notable trends.

Generate a JSON response with exactly this structure:
{{
  "Reading": {{
    "strengths": ["3-4 specific strengths based on the data"],
    "improvements": ["3-4 specific areas needing improvement"]
  }},
  "Listening": {{same structure}},
  "Speaking": {{same structure}},
  "Writing": {{same structure}}
}}

Base all analysis on the actual data and focus on institutional-level patterns.
"#,
        data = compact(distribution)
    )
}

/// Strip surrounding whitespace and Markdown code fences
#[must_use]
pub fn extract_json(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (`json`) up to the first newline
        body = rest.split_once('\n').map_or("", |(_, tail)| tail);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parse a model answer as `T`
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    Ok(serde_json::from_str(extract_json(text))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ToeflScale;
    use crate::types::GeneralRecommendations;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("  ```\n[1]\n```  "), "[1]");
        assert_eq!(extract_json("{\"plain\": true}"), "{\"plain\": true}");
    }

    #[test]
    fn parse_fenced_answer() {
        let text = "```json\n{\"shortTermActions\": [\"a\"], \"longTermStrategy\": [\"b\"]}\n```";
        let parsed: GeneralRecommendations = parse_json(text).unwrap();
        assert_eq!(parsed.short_term_actions, vec!["a"]);
        assert_eq!(parsed.long_term_strategy, vec!["b"]);
    }

    #[test]
    fn parse_garbage_is_invalid_json() {
        let result: Result<GeneralRecommendations, _> = parse_json("Sorry, I can't help.");
        assert!(matches!(result, Err(GenerationError::InvalidJson(_))));
    }

    #[test]
    fn profile_carries_levels_and_feedback() {
        let student = StudentScores::new("Ana", "Ruiz", [29, 10, 20, 13])
            .with_feedback("Fluent", "");
        let profile = skills_profile(&student, &ToeflScale);

        assert_eq!(profile["READING"]["level"], "C2");
        assert_eq!(profile["SPEAKING"]["feedback"], "Fluent");
        assert!(profile["WRITING"].get("feedback").is_none());
        assert!(profile["READING"].get("feedback").is_none());
    }

    #[test]
    fn prompts_embed_data() {
        let student = StudentScores::new("Ana", "Ruiz", [29, 10, 20, 13]);
        assert!(individual_recommendations(&student, &ToeflScale).contains("\"READING\""));
        assert!(resources(&student, &ToeflScale).contains("\"categories\""));

        let rows = vec![ChartData::empty("Reading")];
        assert!(general_recommendations(&rows).contains("\"skill\":\"Reading\""));
        assert!(skill_analysis(&rows).contains("\"Listening\""));
    }
}
