//! Report persistence
//!
//! Reports and their students are addressed by short share tokens so they
//! can be linked publicly. [`InMemoryReportStore`] keeps everything in
//! concurrent maps; anything implementing [`ReportStore`] can replace it.

use crate::error::StoreError;
use crate::factory::GeneratedReport;
use crate::types::{ChartData, StudentScores};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// Length of share tokens
pub const SHARE_TOKEN_LEN: usize = 10;

/// Report submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Class or group name
    #[serde(default)]
    pub group: String,
    /// Uploaded score rows
    #[serde(default)]
    pub students_data: Vec<StudentScores>,
    /// Group-level recommendations as shown in the report
    #[serde(default)]
    pub recommendations: Value,
    /// Level distribution shown in the report
    #[serde(default)]
    pub distribution: Vec<ChartData>,
    /// Per-skill group analysis, when generated
    #[serde(default)]
    pub analysis: Option<Value>,
    /// Per-student recommendations, aligned with `students_data`
    #[serde(default)]
    pub student_recommendations: Vec<Value>,
}

impl NewReport {
    /// Submission for a generated report
    pub fn from_generated(
        group: impl Into<String>,
        report: &GeneratedReport,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            group: group.into(),
            students_data: report.students.iter().map(|s| s.student.clone()).collect(),
            recommendations: to_json(&report.general.content)?,
            distribution: report.distribution.clone(),
            analysis: Some(to_json(&report.analysis.content)?),
            student_recommendations: report
                .students
                .iter()
                .map(|s| {
                    Ok(serde_json::json!({
                        "skills": to_json(&s.recommendations.content)?,
                        "resources": to_json(&s.resources.content)?,
                    }))
                })
                .collect::<Result<_, StoreError>>()?,
        })
    }

    /// Reject submissions without a group, without students or with
    /// unnamed students
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.group.trim().is_empty() || self.students_data.is_empty() {
            return Err(StoreError::Invalid("missing required fields".into()));
        }
        if self.students_data.iter().any(|s| !s.has_name()) {
            return Err(StoreError::Invalid("student is missing name or last name".into()));
        }
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Stored student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    /// Id
    pub id: Ulid,
    /// First name
    pub name: String,
    /// Last name
    pub last_name: String,
    /// Reading
    pub reading: u32,
    /// Listening
    pub listening: u32,
    /// Speaking
    pub speaking: u32,
    /// Writing
    pub writing: u32,
    /// Speaking feedback
    pub speaking_feedback: String,
    /// Writing feedback
    pub writing_feedback: String,
    /// Public lookup token
    pub share_token: String,
    /// Generated advice as stored
    pub recommendations: Value,
}

/// Stored report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Id
    pub id: Ulid,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Class or group name
    pub group: String,
    /// Public lookup token
    pub share_token: String,
    /// Generated advice as stored
    pub recommendations: Value,
    /// Level distribution shown in the report
    pub distribution: Vec<ChartData>,
    /// Per-skill group analysis, when generated
    pub analysis: Option<Value>,
    /// Students in upload order
    pub students: Vec<StudentRecord>,
}

/// Parent report summary shown with a shared student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Class or group name
    pub group: String,
    /// Created at
    pub created_at: DateTime<Utc>,
}

/// Student looked up by share token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentShare {
    /// Student
    #[serde(flatten)]
    pub student: StudentRecord,
    /// The report the student belongs to
    pub report: ReportSummary,
}

/// Report persistence
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Validate and store a report; assigns ids and share tokens
    async fn create_report(&self, report: NewReport) -> Result<Report, StoreError>;

    /// All reports, newest first
    async fn list_reports(&self) -> Result<Vec<Report>, StoreError>;

    /// Report by its share token
    async fn report_by_token(&self, token: &str) -> Result<Report, StoreError>;

    /// Student by its share token, with the parent report summary
    async fn student_by_token(&self, token: &str) -> Result<StudentShare, StoreError>;

    /// Remove a report and its students
    async fn delete_report(&self, token: &str) -> Result<Report, StoreError>;
}

/// Random alphanumeric share token
#[must_use]
pub fn share_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Report store backed by concurrent maps
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    /// Report share token -> (insertion sequence, report)
    reports: DashMap<String, (u64, Report)>,
    /// Student share token -> report share token
    students: DashMap<String, String>,
    sequence: AtomicU64,
}

impl InMemoryReportStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether no reports are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    fn unused_token(&self) -> String {
        loop {
            let token = share_token();
            if !self.reports.contains_key(&token) && !self.students.contains_key(&token) {
                return token;
            }
        }
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn create_report(&self, report: NewReport) -> Result<Report, StoreError> {
        report.validate()?;

        let NewReport {
            group,
            students_data,
            recommendations,
            distribution,
            analysis,
            mut student_recommendations,
        } = report;
        student_recommendations.resize(students_data.len(), Value::Object(Default::default()));

        let students: Vec<StudentRecord> = students_data
            .into_iter()
            .zip(student_recommendations)
            .map(|(row, recommendations)| StudentRecord {
                id: Ulid::new(),
                name: row.first_name.trim().to_string(),
                last_name: row.last_name.trim().to_string(),
                reading: row.reading,
                listening: row.listening,
                speaking: row.speaking,
                writing: row.writing,
                speaking_feedback: row.speaking_feedback,
                writing_feedback: row.writing_feedback,
                share_token: self.unused_token(),
                recommendations,
            })
            .collect();

        let stored = Report {
            id: Ulid::new(),
            created_at: Utc::now(),
            group: group.trim().to_string(),
            share_token: self.unused_token(),
            recommendations: if recommendations.is_null() {
                Value::Object(Default::default())
            } else {
                recommendations
            },
            distribution,
            analysis,
            students,
        };

        for student in &stored.students {
            self.students
                .insert(student.share_token.clone(), stored.share_token.clone());
        }
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.reports
            .insert(stored.share_token.clone(), (seq, stored.clone()));

        tracing::info!(
            report = %stored.id,
            token = %stored.share_token,
            students = stored.students.len(),
            "report created"
        );
        Ok(stored)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<(u64, Report)> =
            self.reports.iter().map(|entry| entry.value().clone()).collect();
        reports.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }

    async fn report_by_token(&self, token: &str) -> Result<Report, StoreError> {
        self.reports
            .get(token)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| StoreError::report_not_found(token))
    }

    async fn student_by_token(&self, token: &str) -> Result<StudentShare, StoreError> {
        let report_token = self
            .students
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::student_not_found(token))?;

        let entry = self
            .reports
            .get(&report_token)
            .ok_or_else(|| StoreError::student_not_found(token))?;
        let report = &entry.value().1;

        let student = report
            .students
            .iter()
            .find(|s| s.share_token == token)
            .cloned()
            .ok_or_else(|| StoreError::student_not_found(token))?;

        Ok(StudentShare {
            student,
            report: ReportSummary {
                group: report.group.clone(),
                created_at: report.created_at,
            },
        })
    }

    async fn delete_report(&self, token: &str) -> Result<Report, StoreError> {
        let (_, (_, report)) = self
            .reports
            .remove(token)
            .ok_or_else(|| StoreError::report_not_found(token))?;

        for student in &report.students {
            self.students.remove(&student.share_token);
        }
        tracing::info!(report = %report.id, token, "report deleted");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn submission(group: &str) -> NewReport {
        NewReport {
            group: group.to_string(),
            students_data: vec![
                StudentScores::new("Ana", "Ruiz", [25, 22, 20, 24]).with_feedback("Fluent", "Clear"),
                StudentScores::new("Luis", "Paz", [10, 12, 16, 13]),
            ],
            recommendations: json!({ "shortTermActions": ["a"] }),
            distribution: vec![ChartData::empty("Reading")],
            analysis: None,
            student_recommendations: vec![json!({ "READING": {} })],
        }
    }

    #[test]
    fn share_tokens_are_alphanumeric() {
        let token = share_token();
        assert_eq!(token.len(), SHARE_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn create_assigns_tokens_and_aligns_recommendations() {
        let store = InMemoryReportStore::new();
        let report = store.create_report(submission("B2 Morning")).await.unwrap();

        assert_eq!(report.group, "B2 Morning");
        assert_eq!(report.students.len(), 2);
        assert_eq!(report.students[0].speaking_feedback, "Fluent");
        assert_eq!(report.students[0].recommendations, json!({ "READING": {} }));
        assert_eq!(report.students[1].recommendations, json!({}));
        assert_ne!(report.students[0].share_token, report.students[1].share_token);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn validation_rejects_incomplete_submissions() {
        let store = InMemoryReportStore::new();

        let err = store.create_report(submission("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let mut unnamed = submission("G");
        unnamed.students_data.push(StudentScores::new("", "Solo", [1, 1, 1, 1]));
        assert!(matches!(
            store.create_report(unnamed).await,
            Err(StoreError::Invalid(_))
        ));

        let empty = NewReport {
            group: "G".into(),
            ..NewReport::default()
        };
        assert!(store.create_report(empty).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn lookup_by_tokens() {
        let store = InMemoryReportStore::new();
        let report = store.create_report(submission("G1")).await.unwrap();

        let fetched = store.report_by_token(&report.share_token).await.unwrap();
        assert_eq!(fetched, report);

        let share = store
            .student_by_token(&report.students[1].share_token)
            .await
            .unwrap();
        assert_eq!(share.student.name, "Luis");
        assert_eq!(share.report.group, "G1");
        assert_eq!(share.report.created_at, report.created_at);

        let value = serde_json::to_value(&share).unwrap();
        assert_eq!(value["lastName"], "Paz");
        assert_eq!(value["report"]["group"], "G1");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryReportStore::new();
        let first = store.create_report(submission("first")).await.unwrap();
        let second = store.create_report(submission("second")).await.unwrap();

        let listed = store.list_reports().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn delete_removes_report_and_students() {
        let store = InMemoryReportStore::new();
        let report = store.create_report(submission("G")).await.unwrap();
        let student_token = report.students[0].share_token.clone();

        store.delete_report(&report.share_token).await.unwrap();

        assert!(matches!(
            store.report_by_token(&report.share_token).await,
            Err(StoreError::NotFound { kind: "report", .. })
        ));
        assert!(matches!(
            store.student_by_token(&student_token).await,
            Err(StoreError::NotFound { kind: "student", .. })
        ));
        assert!(store.delete_report(&report.share_token).await.is_err());
    }
}
