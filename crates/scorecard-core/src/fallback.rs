//! Default advice shown when generation is unavailable

use crate::types::{
    GeneralRecommendations, Recommendations, ResourceSuggestions, Skill, SkillAnalysis,
    SkillInsight, SkillRecommendation,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Generic advice for one skill
#[must_use]
pub fn skill_recommendation() -> SkillRecommendation {
    SkillRecommendation {
        strengths: strings(&["Basic understanding established"]),
        weaknesses: strings(&["Needs consistent practice"]),
        short_term_actions: strings(&[
            "Practice with TOEFL materials daily",
            "Work on core skills",
            "Use study resources regularly",
        ]),
        long_term_strategy: strings(&[
            "Develop consistent study routine",
            "Track progress systematically",
            "Seek regular feedback on improvements",
        ]),
        resources: strings(&["Official TOEFL materials", "Practice tests", "Study groups"]),
    }
}

/// Generic advice for every skill
#[must_use]
pub fn individual_recommendations() -> Recommendations {
    Skill::ALL
        .iter()
        .map(|skill| (*skill, skill_recommendation()))
        .collect()
}

/// Generic program-level actions
#[must_use]
pub fn general_recommendations() -> GeneralRecommendations {
    GeneralRecommendations {
        short_term_actions: strings(&[
            "Implement intensive practice for lowest-performing skills",
            "Develop structured assessment program",
            "Create skill-specific study groups",
            "Provide targeted resources for weak areas",
        ]),
        long_term_strategy: strings(&[
            "Establish regular progress monitoring system",
            "Develop comprehensive curriculum alignment",
            "Create personalized learning pathways",
            "Implement integrated skills approach",
        ]),
    }
}

/// Generic observations for every skill
#[must_use]
pub fn skill_analysis() -> SkillAnalysis {
    Skill::ALL
        .iter()
        .map(|skill| {
            let insight = SkillInsight {
                strengths: strings(&[
                    "Students show consistent participation",
                    "Basic understanding established",
                    "Foundation for improvement present",
                ]),
                improvements: strings(&[
                    "Need for more structured practice",
                    "Focus on advanced skill development",
                    "Strengthen core competencies",
                ]),
            };
            (skill.label().to_string(), insight)
        })
        .collect()
}

/// No resources
#[must_use]
pub fn resources() -> ResourceSuggestions {
    ResourceSuggestions::default()
}
