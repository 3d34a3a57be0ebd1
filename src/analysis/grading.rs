//! Grading result normalization.
//!
//! The backend's `upload_quiz` response is loosely shaped: scores may come
//! as final, obtained or AST marks, texts as strings or line arrays. This
//! module reduces it to [`GradingResults`].

use crate::models::{GradedStudent, GradingResults, RawGradedStudent, RawGradingResponse, value_to_label};
use std::collections::BTreeMap;
use tracing::debug;

const NO_SOLUTION_TEXT: &str = "No text extracted from solution image";
const NO_STUDENT_TEXT: &str = "No text extracted from student submission";

/// Normalize a raw grading response.
///
/// `total` is the quiz's maximum marks and `similarity_threshold` the value
/// at or above which a student is flagged for plagiarism.
pub fn normalize_grading(
    raw: RawGradingResponse,
    total: f64,
    similarity_threshold: f64,
) -> GradingResults {
    let average_score = raw
        .average_score
        .unwrap_or_else(|| fallback_average(&raw.students));

    let total_students = match raw.total_students {
        Some(n) if n > 0 => n,
        _ => raw.students.len() as u64,
    };

    let students: Vec<GradedStudent> = raw
        .students
        .into_iter()
        .enumerate()
        .map(|(i, student)| normalize_student(student, i, total, similarity_threshold))
        .collect();

    debug!(
        "Normalized {} graded students (average {:.2})",
        students.len(),
        average_score
    );

    GradingResults {
        quiz_name: raw.quiz_name.unwrap_or_default(),
        total_students,
        average_score,
        solution_image: raw.solution_image,
        solution_image_text: raw
            .solution_image_text
            .map(|t| t.into_text())
            .unwrap_or_else(|| NO_SOLUTION_TEXT.to_string()),
        students,
    }
}

fn normalize_student(
    raw: RawGradedStudent,
    position: usize,
    total: f64,
    similarity_threshold: f64,
) -> GradedStudent {
    let score = percentage_score(&raw, total);
    let similarity = effective_similarity(&raw);

    GradedStudent {
        id: raw
            .id
            .as_ref()
            .map(value_to_label)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| (position + 1).to_string()),
        name: raw.name.unwrap_or_default(),
        image: raw.image,
        score,
        total_marks: raw.total_marks.unwrap_or(0.0),
        ast_score: raw.ast_score.unwrap_or(0.0),
        obtained_marks: raw.obtained_marks.unwrap_or(0.0),
        final_score: raw.final_score.unwrap_or(0.0),
        similarity,
        levenshtein_score: raw.levenshtein_score.unwrap_or(0.0),
        plagiarism_flag: similarity >= similarity_threshold,
        extracted_text: raw
            .extracted_text
            .map(|t| t.into_text())
            .unwrap_or_else(|| NO_STUDENT_TEXT.to_string()),
        grade: raw
            .grade
            .as_ref()
            .map(value_to_label)
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| "N/A".to_string()),
        feedback: raw.feedback.unwrap_or_default(),
    }
}

/// Round to the nearest integer, halves toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    let rounded = value.round();
    if rounded - value == -0.5 {
        rounded + 1.0
    } else {
        rounded
    }
}

/// Treat absent and zero marks alike.
fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

/// Score as a rounded percentage of `total`.
///
/// Prefers the final score, then obtained marks. Without either, or when
/// `total` is not positive, the AST score is used as is.
pub fn percentage_score(student: &RawGradedStudent, total: f64) -> f64 {
    let marks = nonzero(student.final_score).or_else(|| nonzero(student.obtained_marks));

    match marks {
        Some(marks) if total > 0.0 => round_half_up(marks * 100.0 / total),
        _ => student.ast_score.unwrap_or(0.0),
    }
}

/// Similarity reported by the backend, or derived from the Levenshtein score.
pub fn effective_similarity(student: &RawGradedStudent) -> f64 {
    if let Some(similarity) = student.similarity {
        return similarity;
    }

    match nonzero(student.levenshtein_score) {
        Some(levenshtein) => 1.0 - levenshtein / 100.0,
        None => 0.0,
    }
}

fn fallback_average(students: &[RawGradedStudent]) -> f64 {
    if students.is_empty() {
        return 0.0;
    }

    let sum: f64 = students
        .iter()
        .map(|s| {
            nonzero(s.final_score)
                .or_else(|| nonzero(s.obtained_marks))
                .unwrap_or(0.0)
        })
        .sum();

    sum / students.len() as f64
}

/// Count students per grade, ordered by grade label.
pub fn grade_distribution(students: &[GradedStudent]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for student in students {
        *counts.entry(student.grade.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(grade, count)| (grade.to_string(), count))
        .collect()
}

/// Number of students flagged for plagiarism.
pub fn plagiarism_flag_count(students: &[GradedStudent]) -> usize {
    students.iter().filter(|s| s.plagiarism_flag).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextField;
    use serde_json::json;

    fn raw_student(name: &str) -> RawGradedStudent {
        RawGradedStudent {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_percentage_score_precedence() {
        let mut student = raw_student("A");
        student.final_score = Some(8.0);
        student.obtained_marks = Some(6.0);
        student.ast_score = Some(50.0);
        assert_eq!(percentage_score(&student, 10.0), 80.0);

        student.final_score = Some(0.0);
        assert_eq!(percentage_score(&student, 10.0), 60.0);

        student.obtained_marks = None;
        assert_eq!(percentage_score(&student, 10.0), 50.0);

        student.ast_score = None;
        assert_eq!(percentage_score(&student, 10.0), 0.0);
    }

    #[test]
    fn test_percentage_score_rounds_and_guards_zero_total() {
        let mut student = raw_student("A");
        student.obtained_marks = Some(2.0);
        assert_eq!(percentage_score(&student, 3.0), 67.0);

        student.ast_score = Some(12.5);
        assert_eq!(percentage_score(&student, 0.0), 12.5);
    }

    #[test]
    fn test_effective_similarity() {
        let mut student = raw_student("A");
        assert_eq!(effective_similarity(&student), 0.0);

        student.levenshtein_score = Some(20.0);
        assert!((effective_similarity(&student) - 0.8).abs() < 1e-9);

        student.similarity = Some(0.1);
        assert_eq!(effective_similarity(&student), 0.1);
    }

    #[test]
    fn test_normalize_grading_defaults() {
        let raw = RawGradingResponse {
            quiz_name: Some("Quiz".to_string()),
            students: vec![raw_student("Alice")],
            ..Default::default()
        };

        let results = normalize_grading(raw, 100.0, 0.3);
        assert_eq!(results.total_students, 1);
        assert_eq!(results.average_score, 0.0);
        assert_eq!(results.solution_image_text, NO_SOLUTION_TEXT);

        let alice = &results.students[0];
        assert_eq!(alice.id, "1");
        assert_eq!(alice.grade, "N/A");
        assert_eq!(alice.extracted_text, NO_STUDENT_TEXT);
        assert!(alice.feedback.is_empty());
        assert!(!alice.plagiarism_flag);
    }

    #[test]
    fn test_normalize_grading_from_backend_json() {
        let raw: RawGradingResponse = serde_json::from_value(json!({
            "quizName": "Loops",
            "solutionImageText": ["for i in range(3):", "    print(i)"],
            "students": [
                {"id": 11, "name": "Alice", "final_score": 9, "total_marks": 10,
                 "similarity": 0.4, "grade": "A", "extractedText": ["print(1)"],
                 "feedback": ["Nice"]},
                {"id": 12, "name": "Bob", "obtained_marks": 5, "levenshtein_score": 90,
                 "grade": "C"}
            ]
        }))
        .unwrap();

        let results = normalize_grading(raw, 10.0, 0.3);
        assert_eq!(results.quiz_name, "Loops");
        assert_eq!(results.total_students, 2);
        assert_eq!(results.average_score, 7.0);
        assert_eq!(results.solution_image_text, "for i in range(3):\n    print(i)");

        let alice = &results.students[0];
        assert_eq!(alice.id, "11");
        assert_eq!(alice.score, 90.0);
        assert!(alice.plagiarism_flag);
        assert_eq!(alice.extracted_text, "print(1)");

        let bob = &results.students[1];
        assert_eq!(bob.score, 50.0);
        assert!((bob.similarity - 0.1).abs() < 1e-9);
        assert!(!bob.plagiarism_flag);
    }

    #[test]
    fn test_backend_average_wins() {
        let mut student = raw_student("A");
        student.final_score = Some(4.0);
        let raw = RawGradingResponse {
            average_score: Some(91.5),
            total_students: Some(30),
            solution_image_text: Some(TextField::Text("x".to_string())),
            students: vec![student],
            ..Default::default()
        };

        let results = normalize_grading(raw, 10.0, 0.5);
        assert_eq!(results.average_score, 91.5);
        assert_eq!(results.total_students, 30);
        assert_eq!(results.solution_image_text, "x");
    }

    #[test]
    fn test_grade_distribution_and_flags() {
        let raw: RawGradingResponse = serde_json::from_value(json!({
            "students": [
                {"name": "A", "grade": "B", "similarity": 0.9},
                {"name": "B", "grade": "A"},
                {"name": "C", "grade": "B"}
            ]
        }))
        .unwrap();
        let results = normalize_grading(raw, 100.0, 0.5);

        let dist = grade_distribution(&results.students);
        assert_eq!(dist, vec![("A".to_string(), 1), ("B".to_string(), 2)]);
        assert_eq!(plagiarism_flag_count(&results.students), 1);
    }

    #[test]
    fn test_negative_halves_round_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);

        let student = RawGradedStudent {
            final_score: Some(-0.5),
            ..Default::default()
        };
        assert_eq!(percentage_score(&student, 100.0), 0.0);
    }
}
