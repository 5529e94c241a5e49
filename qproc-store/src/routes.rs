//! Processing route parsing
//!
//! The store consumes raw path-change strings from the router; this module
//! decides whether a path addresses the single-processing view and extracts
//! the route key from it.
//!
//! Route shape: `/forms/{asset_uid}/data/processing/{question_name}/{submission_uuid}`

use qproc_common::types::RouteKey;

/// Parse a location path into a processing route key
///
/// Returns `None` for any path that is not a single-processing route. A
/// trailing slash is tolerated; empty segments are not.
pub fn parse_processing_path(path: &str) -> Option<RouteKey> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let mut segments = trimmed.split('/');

    // Leading slash yields an empty first segment.
    if !segments.next()?.is_empty() {
        return None;
    }
    if segments.next()? != "forms" {
        return None;
    }
    let asset_uid = segments.next()?;
    if segments.next()? != "data" {
        return None;
    }
    if segments.next()? != "processing" {
        return None;
    }
    let question_name = segments.next()?;
    let submission_uuid = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    if asset_uid.is_empty() || question_name.is_empty() || submission_uuid.is_empty() {
        return None;
    }

    Some(RouteKey {
        asset_uid: asset_uid.to_string(),
        question_name: question_name.to_string(),
        submission_uuid: submission_uuid.to_string(),
    })
}
