//! Score to level conversion

use crate::types::{Level, Skill};

/// Maps raw scores to proficiency levels
pub trait LevelScale: Send + Sync {
    /// Level for one section score
    fn level_for(&self, skill: Skill, score: u32) -> Level;

    /// Level for the sum of all four sections
    fn total_level(&self, total: u32) -> Level;
}

/// Lower bounds per level, highest first; anything below the last bound is A2
type Bounds = [(u32, Level); 4];

const READING: Bounds = [(29, Level::C2), (24, Level::C1), (18, Level::B2), (4, Level::B1)];
const LISTENING: Bounds = [(28, Level::C2), (22, Level::C1), (17, Level::B2), (9, Level::B1)];
const SPEAKING: Bounds = [(28, Level::C2), (25, Level::C1), (20, Level::B2), (16, Level::B1)];
const WRITING: Bounds = [(29, Level::C2), (24, Level::C1), (17, Level::B2), (13, Level::B1)];
const TOTAL: Bounds = [(114, Level::C2), (95, Level::C1), (72, Level::B2), (42, Level::B1)];

/// TOEFL iBT section (0-30) and total (0-120) bands
#[derive(Debug, Clone, Copy, Default)]
pub struct ToeflScale;

impl ToeflScale {
    fn lookup(bounds: &Bounds, score: u32) -> Level {
        bounds
            .iter()
            .find(|(min, _)| score >= *min)
            .map_or(Level::A2, |(_, level)| *level)
    }
}

impl LevelScale for ToeflScale {
    fn level_for(&self, skill: Skill, score: u32) -> Level {
        let bounds = match skill {
            Skill::Reading => &READING,
            Skill::Listening => &LISTENING,
            Skill::Speaking => &SPEAKING,
            Skill::Writing => &WRITING,
        };
        Self::lookup(bounds, score)
    }

    fn total_level(&self, total: u32) -> Level {
        Self::lookup(&TOTAL, total)
    }
}
