//! Level distribution across a group of students

use crate::scale::LevelScale;
use crate::types::{ChartData, Skill, StudentScores};

/// Label of the aggregate row
pub const OVERALL: &str = "Overall";

/// Per-skill level counts plus an `Overall` row.
///
/// Skill averages are the mean section score. The overall row places each
/// student by total score and averages the per-student section mean.
/// Averages are rounded to two decimals; empty input yields zero rows.
#[must_use]
pub fn level_distribution(students: &[StudentScores], scale: &dyn LevelScale) -> Vec<ChartData> {
    let mut rows: Vec<ChartData> = Skill::ALL
        .iter()
        .map(|skill| ChartData::empty(skill.label()))
        .collect();
    let mut overall = ChartData::empty(OVERALL);

    let mut sums = [0.0_f64; 4];
    let mut overall_sum = 0.0_f64;

    for student in students {
        for (idx, skill) in Skill::ALL.iter().enumerate() {
            let score = student.score(*skill);
            rows[idx].record(scale.level_for(*skill, score));
            sums[idx] += f64::from(score);
        }

        let total = student.total_score();
        overall.record(scale.total_level(total));
        overall_sum += f64::from(total) / 4.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let count = students.len() as f64;
    if count > 0.0 {
        for (row, sum) in rows.iter_mut().zip(sums) {
            row.average = round2(sum / count);
        }
        overall.average = round2(overall_sum / count);
    }

    rows.push(overall);
    rows
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ToeflScale;
    use crate::types::Level;

    #[test]
    fn counts_and_averages() {
        let students = vec![
            StudentScores::new("Ana", "Ruiz", [30, 28, 26, 25]),
            StudentScores::new("Luis", "Paz", [10, 10, 10, 10]),
            StudentScores::new("Eva", "Sol", [20, 18, 21, 17]),
        ];

        let rows = level_distribution(&students, &ToeflScale);
        assert_eq!(rows.len(), 5);

        let reading = &rows[0];
        assert_eq!(reading.skill, "Reading");
        assert_eq!(reading.count(Level::C2), 1);
        assert_eq!(reading.count(Level::B2), 1);
        assert_eq!(reading.count(Level::B1), 1);
        assert_eq!(reading.average, 20.0);

        let overall = &rows[4];
        assert_eq!(overall.skill, OVERALL);
        assert_eq!(overall.total(), 3);
        // 109 -> C1, 40 -> A2, 76 -> B2
        assert_eq!(overall.count(Level::C1), 1);
        assert_eq!(overall.count(Level::A2), 1);
        assert_eq!(overall.count(Level::B2), 1);
        assert_eq!(overall.average, 18.75);
    }

    #[test]
    fn averages_round_to_two_decimals() {
        let students = vec![
            StudentScores::new("A", "A", [10, 0, 0, 0]),
            StudentScores::new("B", "B", [10, 0, 0, 0]),
            StudentScores::new("C", "C", [11, 0, 0, 0]),
        ];
        let rows = level_distribution(&students, &ToeflScale);
        assert_eq!(rows[0].average, 10.33);
    }

    #[test]
    fn empty_group_has_zero_rows() {
        let rows = level_distribution(&[], &ToeflScale);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.total() == 0 && row.average == 0.0));
    }
}
