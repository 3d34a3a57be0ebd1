//! Markdown and JSON report generation.
//!
//! This module renders plagiarism and grading reports, plus the short
//! listings printed by the quiz and dashboard commands.

use crate::analysis::{grade_distribution, plagiarism_flag_count, FLAG_THRESHOLD, NOISE_FLOOR};
use crate::config::ReportConfig;
use crate::models::{
    DashboardSummary, GradedStudent, GradingReport, PlagiarismReport, QuizSummary,
    StudentSummary, value_to_label,
};
use anyhow::Result;
use serde::Serialize;

/// Format a `[0, 1]` ratio as a whole percentage.
fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Keep user-provided text from breaking table rows.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate a complete plagiarism report in Markdown.
pub fn generate_plagiarism_markdown(report: &PlagiarismReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Plagiarism Report: {}\n\n", report.quiz_name));

    output.push_str("## Metadata\n\n");
    if let Some(ref id) = report.quiz_id {
        output.push_str(&format!("- **Quiz ID:** {}\n", id));
    }
    output.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "- **Noise Floor:** pairs at or below {} similarity are ignored\n",
        percent(NOISE_FLOOR)
    ));
    output.push_str(&format!(
        "- **Flag Threshold:** pairs above {} are flagged\n\n",
        percent(FLAG_THRESHOLD)
    ));

    output.push_str("## Summary\n\n");
    output.push_str("| Students | Average Similarity | High Similarity (>= 50%) |\n");
    output.push_str("|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {} | {} |\n\n",
        report.graph.total_students,
        percent(report.graph.average_similarity),
        report.high_similarity_count
    ));

    output.push_str(&generate_student_table(&report.graph.students));
    output.push_str(&generate_flagged_pairs_section(report));
    output.push_str(&generate_footer());

    output
}

fn generate_student_table(students: &[StudentSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Students\n\n");

    if students.is_empty() {
        section.push_str("No students matched the current filters.\n\n");
        return section;
    }

    section.push_str("| Student | Similarity | Status | Matches |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");

    for student in students {
        let status = if student.flag { "🔴 Flagged" } else { "🟢 Clear" };
        let matches = if student.matches.is_empty() {
            "-".to_string()
        } else {
            cell(&student.matches.join(", "))
        };

        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&student.name),
            percent(student.similarity),
            status,
            matches
        ));
    }
    section.push('\n');

    section
}

fn generate_flagged_pairs_section(report: &PlagiarismReport) -> String {
    let mut section = String::new();

    section.push_str("## Flagged Pairs\n\n");

    if report.flagged_pairs.is_empty() {
        section.push_str("No pairs were flagged. 🎉\n\n");
        return section;
    }

    for pair in &report.flagged_pairs {
        let origin = if pair.flag { "backend" } else { "threshold" };
        section.push_str(&format!(
            "- **{}** ↔ **{}**: {} ({})\n",
            pair.student1,
            pair.student2,
            percent(pair.similarity),
            origin
        ));
    }
    section.push('\n');

    section
}

/// Generate a complete grading report in Markdown.
pub fn generate_grading_markdown(report: &GradingReport, options: &ReportConfig) -> String {
    let results = &report.results;
    let mut output = String::new();

    output.push_str(&format!("# Grading Report: {}\n\n", results.quiz_name));

    output.push_str("## Metadata\n\n");
    output.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Total Marks:** {}\n", report.total_marks));
    output.push_str(&format!(
        "- **Similarity Threshold:** {}\n\n",
        percent(report.similarity_threshold)
    ));

    output.push_str("## Summary\n\n");
    output.push_str("| Students | Average Score | Plagiarism Flags |\n");
    output.push_str("|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {:.1} | {} |\n\n",
        results.total_students,
        results.average_score,
        plagiarism_flag_count(&results.students)
    ));

    output.push_str("## Results\n\n");
    if results.students.is_empty() {
        output.push_str("The backend returned no graded submissions.\n\n");
    } else {
        output.push_str("| Student | Grade | Score | Marks | Similarity | Plagiarism |\n");
        output.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
        for student in &results.students {
            output.push_str(&format!(
                "| {} | {} | {} | {}/{} | {} | {} |\n",
                cell(&student.name),
                cell(&student.grade),
                student.score,
                student.obtained_marks,
                student.total_marks,
                percent(student.similarity),
                if student.plagiarism_flag { "Yes" } else { "No" }
            ));
        }
        output.push('\n');

        output.push_str("### Grade Distribution\n\n");
        output.push_str("| Grade | Students |\n");
        output.push_str("|:---:|:---:|\n");
        for (grade, count) in grade_distribution(&results.students) {
            output.push_str(&format!("| {} | {} |\n", cell(&grade), count));
        }
        output.push('\n');
    }

    output.push_str("## Solution Text\n\n```\n");
    output.push_str(&results.solution_image_text);
    output.push_str("\n```\n\n");

    if options.include_extracted_text || options.include_feedback {
        for student in &results.students {
            output.push_str(&generate_student_section(student, options));
        }
    }

    output.push_str(&generate_footer());

    output
}

fn generate_student_section(student: &GradedStudent, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {} (Grade {})\n\n", student.name, student.grade));
    section.push_str(&format!(
        "*AST: {} | Final: {} | Levenshtein: {}*\n\n",
        student.ast_score, student.final_score, student.levenshtein_score
    ));

    if options.include_extracted_text {
        section.push_str("<details>\n<summary>Extracted Text</summary>\n\n```\n");
        section.push_str(&student.extracted_text);
        section.push_str("\n```\n</details>\n\n");
    }

    if options.include_feedback && !student.feedback.is_empty() {
        section.push_str("**Feedback:**\n\n");
        for item in &student.feedback {
            section.push_str(&format!("- {}\n", item));
        }
        section.push('\n');
    }

    section.push_str("---\n\n");

    section
}

/// Render the quiz list.
pub fn generate_quiz_list_markdown(quizzes: &[QuizSummary]) -> String {
    let mut output = String::new();

    output.push_str("# Quizzes\n\n");

    if quizzes.is_empty() {
        output.push_str("No quizzes found.\n");
        return output;
    }

    output.push_str("| ID | Name | Date | Students |\n");
    output.push_str("|:---:|:---|:---|:---:|\n");
    for quiz in quizzes {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&quiz.id),
            cell(&quiz.name),
            cell(&quiz.date),
            quiz.students
        ));
    }

    output
}

/// Render dashboard statistics.
pub fn generate_dashboard_markdown(summary: &DashboardSummary) -> String {
    let mut output = String::new();

    output.push_str("# Dashboard\n\n");
    output.push_str(&format!("- **Total Quizzes:** {}\n", summary.total_quizzes));
    output.push_str(&format!(
        "- **Recent Quizzes:** {}\n",
        summary.recent_quizzes.len()
    ));
    output.push_str(&format!(
        "- **Students (recent quizzes):** {}\n\n",
        summary.total_students
    ));

    if !summary.recent_quizzes.is_empty() {
        output.push_str("## Recent Quizzes\n\n");
        output.push_str("| ID | Name | Date | Students |\n");
        output.push_str("|:---:|:---|:---|:---:|\n");
        for quiz in &summary.recent_quizzes {
            output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                quiz.id.as_ref().map(value_to_label).unwrap_or_default(),
                cell(quiz.name.as_deref().unwrap_or("")),
                cell(quiz.date.as_deref().unwrap_or("")),
                quiz.student_count
            ));
        }
    }

    output
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by GradeMate*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report<T: Serialize + ?Sized>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
