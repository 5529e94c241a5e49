//! Uuid index construction and cross-submission navigation
//!
//! The index answers "what is the Nth submission for this question" and "what
//! is the closest previous/next submission that answered this question". It
//! is rebuilt in full on every fetch and discarded entirely on asset change;
//! there is no incremental patching.

use qproc_common::types::{ProcessingRow, QuestionPath, SubmissionsUuidIndex};
use std::collections::HashMap;

/// Build the per-question uuid index from the backend result set
///
/// For every processing-enabled question, produces one entry per submission
/// row in response order: the submission's uuid if its row carries the
/// question's flattened path, `None` otherwise. All sequences therefore have
/// equal length and share the response ordering.
pub fn build_uuid_index(
    questions: &[QuestionPath],
    rows: &[ProcessingRow],
) -> SubmissionsUuidIndex {
    let mut map = HashMap::with_capacity(questions.len());
    for question in questions {
        let uuids = rows
            .iter()
            .map(|row| {
                if row.has_field(&question.flat_path) {
                    Some(row.uuid.clone())
                } else {
                    None
                }
            })
            .collect();
        map.insert(question.name.clone(), uuids);
    }
    SubmissionsUuidIndex(map)
}

/// 0-based position of `current` within the sequence
pub fn position(uuids: &[Option<String>], current: &str) -> Option<usize> {
    uuids.iter().position(|u| u.as_deref() == Some(current))
}

/// Closest real uuid before `current`, skipping absent entries
///
/// Returns `None` at the sequence start or when `current` is not found at
/// all (an unknown position has no derivable neighbors).
pub fn prev_uuid<'a>(uuids: &'a [Option<String>], current: &str) -> Option<&'a str> {
    let pos = position(uuids, current)?;
    uuids[..pos].iter().rev().find_map(|u| u.as_deref())
}

/// Closest real uuid after `current`, skipping absent entries
pub fn next_uuid<'a>(uuids: &'a [Option<String>], current: &str) -> Option<&'a str> {
    let pos = position(uuids, current)?;
    uuids[pos + 1..].iter().find_map(|u| u.as_deref())
}

/// Display ordinal ("Submission K of N"): 1-based position and total count
pub fn ordinal(uuids: &[Option<String>], current: &str) -> Option<(usize, usize)> {
    position(uuids, current).map(|pos| (pos + 1, uuids.len()))
}
