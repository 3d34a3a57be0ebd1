//! Data models for GradeMate.
//!
//! This module contains the wire types exchanged with the grading backend
//! and the normalized structures the reports are built from.

use crate::error::{AggregationError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Render a loosely typed JSON identifier (number or string) as text.
pub fn value_to_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deserialize a list that the backend may send as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Plagiarism
// ---------------------------------------------------------------------------

/// A pairwise similarity record exactly as the backend sent it.
///
/// Every field is optional so that malformed records can be reported with
/// their position instead of failing the whole document parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatchRecord {
    #[serde(default)]
    pub student1: Option<String>,
    #[serde(default)]
    pub student2: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub flag: Option<bool>,
}

impl RawMatchRecord {
    /// Check required fields and produce a validated [`PairwiseMatch`].
    pub fn validate(&self, index: usize) -> Result<PairwiseMatch, AggregationError> {
        let student1 = required_name(self.student1.as_deref(), index, "student1")?;
        let student2 = required_name(self.student2.as_deref(), index, "student2")?;

        let similarity = self.similarity.ok_or(AggregationError::InvalidRecord {
            index,
            field: "similarity",
            reason: "is missing".to_string(),
        })?;

        if !(0.0..=1.0).contains(&similarity) {
            return Err(AggregationError::InvalidRecord {
                index,
                field: "similarity",
                reason: format!("must be within [0, 1] (got {})", similarity),
            });
        }

        Ok(PairwiseMatch {
            student1,
            student2,
            similarity,
            flag: self.flag.unwrap_or(false),
        })
    }
}

fn required_name(
    value: Option<&str>,
    index: usize,
    field: &'static str,
) -> Result<String, AggregationError> {
    match value {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        Some(_) => Err(AggregationError::InvalidRecord {
            index,
            field,
            reason: "is blank".to_string(),
        }),
        None => Err(AggregationError::InvalidRecord {
            index,
            field,
            reason: "is missing".to_string(),
        }),
    }
}

/// One comparison result between two named students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseMatch {
    pub student1: String,
    pub student2: String,
    /// Normalized closeness in `[0, 1]`.
    pub similarity: f64,
    /// Explicitly flagged by the backend.
    #[serde(default)]
    pub flag: bool,
}

/// Per-student adjacency summary built by the match-graph aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    /// Slug derived from the name.
    pub id: String,
    pub name: String,
    /// Highest similarity seen across all of this student's pairs.
    pub similarity: f64,
    /// Matched peers in first-seen order. Repeated pairs repeat the name.
    pub matches: Vec<String>,
    pub flag: bool,
}

/// Output of one aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchGraph {
    pub students: Vec<StudentSummary>,
    pub total_students: usize,
    pub average_similarity: f64,
}

/// Backend envelope returned by `check_plagiarism`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlagiarismResponse {
    #[serde(default)]
    pub quiz_name: Option<String>,
    #[serde(default)]
    pub quiz_id: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plagiarism_results: Vec<RawMatchRecord>,
}

/// Accepted shapes for an offline plagiarism input file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MatchInput {
    /// A bare JSON array of pairwise records.
    Records(Vec<RawMatchRecord>),
    /// The backend's full response envelope.
    Envelope(PlagiarismResponse),
}

impl From<MatchInput> for PlagiarismResponse {
    fn from(input: MatchInput) -> Self {
        match input {
            MatchInput::Records(records) => PlagiarismResponse {
                plagiarism_results: records,
                ..Default::default()
            },
            MatchInput::Envelope(envelope) => envelope,
        }
    }
}

/// Sort direction for student listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    Asc,
    /// Highest similarity first (default)
    #[default]
    Desc,
}

/// The complete plagiarism report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismReport {
    pub quiz_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub graph: MatchGraph,
    pub high_similarity_count: usize,
    /// Qualifying pairs that are flagged, highest similarity first.
    pub flagged_pairs: Vec<PairwiseMatch>,
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Free text the backend sends either as a single string or as lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Lines(Vec<String>),
    Text(String),
}

impl TextField {
    /// Join line arrays with newlines.
    pub fn into_text(self) -> String {
        match self {
            TextField::Lines(lines) => lines.join("\n"),
            TextField::Text(text) => text,
        }
    }
}

/// Feedback attached to a graded student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackItem {
    Text(String),
    Detailed {
        #[serde(default)]
        question: Option<u32>,
        #[serde(default)]
        correct: Option<bool>,
        #[serde(default)]
        points: Option<f64>,
        #[serde(default)]
        feedback: Option<String>,
    },
}

impl fmt::Display for FeedbackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackItem::Text(text) => write!(f, "{}", text),
            FeedbackItem::Detailed {
                question,
                correct,
                points,
                feedback,
            } => {
                if let Some(q) = question {
                    write!(f, "Q{}: ", q)?;
                }
                write!(f, "{}", feedback.as_deref().unwrap_or("(no comment)"))?;
                if let Some(p) = points {
                    write!(f, " ({} pts)", p)?;
                }
                match correct {
                    Some(true) => write!(f, " ✔"),
                    Some(false) => write!(f, " ✘"),
                    None => Ok(()),
                }
            }
        }
    }
}

/// One student entry from the backend's `upload_quiz` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGradedStudent {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub total_marks: Option<f64>,
    #[serde(default)]
    pub ast_score: Option<f64>,
    #[serde(default)]
    pub obtained_marks: Option<f64>,
    #[serde(default)]
    pub final_score: Option<f64>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub levenshtein_score: Option<f64>,
    #[serde(default, rename = "extractedText")]
    pub extracted_text: Option<TextField>,
    #[serde(default)]
    pub grade: Option<Value>,
    #[serde(default)]
    pub feedback: Option<Vec<FeedbackItem>>,
}

/// The backend's `upload_quiz` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradingResponse {
    #[serde(default)]
    pub quiz_name: Option<String>,
    #[serde(default)]
    pub total_students: Option<u64>,
    #[serde(default)]
    pub average_score: Option<f64>,
    #[serde(default)]
    pub solution_image: Option<String>,
    #[serde(default)]
    pub solution_image_text: Option<TextField>,
    #[serde(default)]
    pub students: Vec<RawGradedStudent>,
}

/// A normalized, display-ready graded student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedStudent {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Score as a percentage of the quiz total.
    pub score: f64,
    #[serde(rename = "total_marks")]
    pub total_marks: f64,
    #[serde(rename = "ast_score")]
    pub ast_score: f64,
    #[serde(rename = "obtained_marks")]
    pub obtained_marks: f64,
    #[serde(rename = "final_score")]
    pub final_score: f64,
    pub similarity: f64,
    #[serde(rename = "levenshtein_score")]
    pub levenshtein_score: f64,
    pub plagiarism_flag: bool,
    pub extracted_text: String,
    pub grade: String,
    pub feedback: Vec<FeedbackItem>,
}

/// Normalized grading results for a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResults {
    pub quiz_name: String,
    pub total_students: u64,
    pub average_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_image: Option<String>,
    pub solution_image_text: String,
    pub students: Vec<GradedStudent>,
}

/// A grading report wrapping the normalized results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingReport {
    pub generated_at: DateTime<Utc>,
    pub similarity_threshold: f64,
    pub total_marks: f64,
    #[serde(flatten)]
    pub results: GradingResults,
}

/// A student's image submission to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub student_name: String,
    pub image: PathBuf,
}

/// Everything the backend needs to grade a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingRequest {
    pub quiz_name: String,
    pub logic_weight: f64,
    pub similarity_threshold: f64,
    pub total: f64,
    pub solution_image: PathBuf,
    pub submissions: Vec<Submission>,
}

impl GradingRequest {
    /// Validate the request before anything is uploaded.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quiz_name.trim().is_empty() {
            return Err(ValidationError::EmptyQuizName);
        }

        for (field, value) in [
            ("logic weight", self.logic_weight),
            ("similarity threshold", self.similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::OutOfRange { field, value });
            }
        }

        if self.total <= 0.0 {
            return Err(ValidationError::NonPositiveTotal(self.total));
        }

        if !self.solution_image.is_file() {
            return Err(ValidationError::MissingImage(
                self.solution_image.display().to_string(),
            ));
        }

        if self.submissions.is_empty() {
            return Err(ValidationError::NoSubmissions);
        }

        for (i, submission) in self.submissions.iter().enumerate() {
            if submission.student_name.trim().is_empty() {
                return Err(ValidationError::MissingStudentName(i + 1));
            }
            if !submission.image.is_file() {
                return Err(ValidationError::MissingImage(
                    submission.image.display().to_string(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Quizzes, dashboard, accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuiz {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub student_count: u64,
}

/// `get_all_quizes` response. The key spelling is the backend's.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizzesResponse {
    #[serde(default)]
    pub quizes: Vec<RawQuiz>,
}

/// A quiz as listed to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub name: String,
    pub date: String,
    pub students: u64,
}

impl From<RawQuiz> for QuizSummary {
    fn from(raw: RawQuiz) -> Self {
        Self {
            id: value_to_label(&raw.id),
            name: raw.name,
            date: raw.date.unwrap_or_default(),
            students: raw.student_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentQuiz {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub student_count: u64,
}

/// `dashboard-stats` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub total_quizzes: u64,
    #[serde(default)]
    pub recent_quizzes: Vec<RecentQuiz>,
}

/// Dashboard figures shown by the `dashboard` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_quizzes: u64,
    pub recent_quizzes: Vec<RecentQuiz>,
    /// Sum of `student_count` across the recent quizzes.
    pub total_students: u64,
}

impl From<DashboardResponse> for DashboardSummary {
    fn from(raw: DashboardResponse) -> Self {
        let total_students = raw.recent_quizzes.iter().map(|q| q.student_count).sum();
        Self {
            total_quizzes: raw.total_quizzes,
            recent_quizzes: raw.recent_quizzes,
            total_students,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Value,
}
