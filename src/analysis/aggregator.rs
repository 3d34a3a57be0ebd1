//! Plagiarism match-graph aggregation.
//!
//! Turns the backend's flat list of pairwise similarity records into one
//! summary per student, and provides the filtering and sorting used when
//! presenting those summaries.

use crate::error::AggregationError;
use crate::models::{MatchGraph, PairwiseMatch, RawMatchRecord, SortOrder, StudentSummary};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Records at or below this similarity are reporting noise and are ignored.
pub const NOISE_FLOOR: f64 = 0.1;

/// Pairs above this similarity are flagged even if the backend did not flag them.
pub const FLAG_THRESHOLD: f64 = 0.5;

/// Derive the display id for a student: lowercase, whitespace runs become `-`.
pub fn student_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
        } else {
            slug.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }

    slug
}

impl StudentSummary {
    fn new(name: &str) -> Self {
        Self {
            id: student_slug(name),
            name: name.to_string(),
            similarity: 0.0,
            matches: Vec::new(),
            flag: false,
        }
    }
}

/// Validate every raw record. Fails on the first malformed one.
pub fn validate_records(records: &[RawMatchRecord]) -> Result<Vec<PairwiseMatch>, AggregationError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| record.validate(index))
        .collect()
}

/// Validate then aggregate. Nothing is aggregated if any record is invalid.
#[cfg(test)]
pub fn aggregate_raw(records: &[RawMatchRecord]) -> Result<MatchGraph, AggregationError> {
    let validated = validate_records(records)?;
    Ok(aggregate_matches(&validated))
}

/// Build per-student summaries from validated pairwise records.
///
/// Students appear in the order they were first seen. Each side of a
/// qualifying pair records the other as a match, keeps the highest
/// similarity it has seen, and is flagged if any of its pairs was flagged
/// or exceeded [`FLAG_THRESHOLD`].
pub fn aggregate_matches(records: &[PairwiseMatch]) -> MatchGraph {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut students: Vec<StudentSummary> = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        if record.similarity <= NOISE_FLOOR {
            trace!(
                "Ignoring {} / {} at {:.3} (noise floor)",
                record.student1,
                record.student2,
                record.similarity
            );
            skipped += 1;
            continue;
        }

        let flagged = record.flag || record.similarity > FLAG_THRESHOLD;

        for (me, peer) in [
            (&record.student1, &record.student2),
            (&record.student2, &record.student1),
        ] {
            let slot = *index.entry(me.as_str()).or_insert_with(|| {
                students.push(StudentSummary::new(me));
                students.len() - 1
            });

            let summary = &mut students[slot];
            summary.matches.push(peer.clone());
            summary.similarity = summary.similarity.max(record.similarity);
            summary.flag = summary.flag || flagged;
        }
    }

    let total_students = students.len();
    let average_similarity = if total_students == 0 {
        0.0
    } else {
        students.iter().map(|s| s.similarity).sum::<f64>() / total_students as f64
    };

    debug!(
        "Aggregated {} records into {} students ({} below noise floor)",
        records.len(),
        total_students,
        skipped
    );

    MatchGraph {
        students,
        total_students,
        average_similarity,
    }
}

/// Keep students whose name contains `search` (case-insensitive) and whose
/// similarity is at least `min_similarity`.
pub fn filter_students(
    students: &[StudentSummary],
    search: &str,
    min_similarity: f64,
) -> Vec<StudentSummary> {
    let needle = search.to_lowercase();

    students
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle) && s.similarity >= min_similarity)
        .cloned()
        .collect()
}

/// Sort students by similarity.
pub fn sort_by_similarity(students: &mut [StudentSummary], order: SortOrder) {
    match order {
        SortOrder::Asc => students.sort_by(|a, b| a.similarity.total_cmp(&b.similarity)),
        SortOrder::Desc => students.sort_by(|a, b| b.similarity.total_cmp(&a.similarity)),
    }
}

/// Number of students whose similarity is at least [`FLAG_THRESHOLD`].
///
/// Counts by score alone; a backend flag on a low-similarity pair does not
/// make its students count here.
pub fn high_similarity_count(students: &[StudentSummary]) -> usize {
    students
        .iter()
        .filter(|s| s.similarity >= FLAG_THRESHOLD)
        .count()
}

/// Number of students carrying a flag.
pub fn flagged_student_count(students: &[StudentSummary]) -> usize {
    students.iter().filter(|s| s.flag).count()
}

/// Qualifying pairs that end up flagged, highest similarity first.
pub fn flagged_pairs(records: &[PairwiseMatch]) -> Vec<PairwiseMatch> {
    let mut pairs: Vec<PairwiseMatch> = records
        .iter()
        .filter(|r| r.similarity > NOISE_FLOOR && (r.flag || r.similarity > FLAG_THRESHOLD))
        .cloned()
        .collect();

    pairs.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    pairs
}
