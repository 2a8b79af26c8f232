//! Pure matching of capture records to steps and passes.
//!
//! Time windows are closed: a record stamped exactly at a window edge is inside.

use std::collections::HashSet;

use crate::models::{CaptureRecord, Pass, Step};

use super::artifact_key::ArtifactKey;

/// Records whose filename names both the step's pass and the step, in input order.
///
/// Naming alone decides; no time window applies to videos.
pub fn match_step_videos<'a>(step: &Step, records: &'a [CaptureRecord]) -> Vec<&'a CaptureRecord> {
    let key = ArtifactKey::for_step(step);
    records
        .iter()
        .filter(|record| key.matches_filename(&record.filename))
        .collect()
}

/// Earliest and latest image of a component inside a pass window.
///
/// When exactly one image matches, `before` and `after` are the same record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeforeAfter<'a> {
    pub before: Option<&'a CaptureRecord>,
    pub after: Option<&'a CaptureRecord>,
}

impl<'a> BeforeAfter<'a> {
    /// True when one record plays both roles and should only be shown once.
    pub fn is_single(&self) -> bool {
        match (self.before, self.after) {
            (Some(before), Some(after)) => before.id == after.id,
            _ => false,
        }
    }
}

pub fn match_before_after_images<'a>(
    pass: &Pass,
    records: &'a [CaptureRecord],
    component_name: &str,
) -> BeforeAfter<'a> {
    let mut in_window: Vec<&CaptureRecord> = records
        .iter()
        .filter(|record| record.is_from_component(component_name) && pass.contains(record.timestamp_utc))
        .collect();
    in_window.sort_by_key(|record| record.timestamp_utc);

    BeforeAfter {
        before: in_window.first().copied(),
        after: in_window.last().copied(),
    }
}

/// Every record tied to a pass, either by a path segment equal to the pass id
/// or by falling inside the pass window. Deduplicated by id, oldest first.
pub fn match_pass_files<'a>(pass: &Pass, records: &'a [CaptureRecord]) -> Vec<&'a CaptureRecord> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for record in records {
        let related = record.has_path_segment(&pass.pass_id) || pass.contains(record.timestamp_utc);
        if related && seen.insert(record.id.as_str()) {
            matched.push(record);
        }
    }
    matched.sort_by_key(|record| record.timestamp_utc);
    matched
}
