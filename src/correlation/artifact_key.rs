//! The `(pass_id, step_name)` pair linking a generation request to its output.
//!
//! Encoding (metadata sent to the device) and decoding/matching (filenames the
//! device produces) live together here so they cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Step;

const METADATA_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactKey {
    pub pass_id: String,
    pub step_name: String,
}

impl ArtifactKey {
    pub fn new(pass_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            pass_id: pass_id.into(),
            step_name: step_name.into(),
        }
    }

    pub fn for_step(step: &Step) -> Self {
        Self::new(step.pass_id.clone(), step.name.clone())
    }

    /// Key of the live polling request, `{pass_id}-{step_name}`.
    pub fn request_key(&self) -> String {
        format!("{}-{}", self.pass_id, self.step_name)
    }

    /// Metadata attached to a `save` command; the device embeds it in the filename.
    pub fn metadata_tag(&self) -> String {
        format!("{}{}{}", self.pass_id, METADATA_SEPARATOR, self.step_name)
    }

    /// Inverse of [`metadata_tag`](Self::metadata_tag). Pass ids never contain `_`.
    pub fn from_metadata_tag(tag: &str) -> Option<Self> {
        let (pass_id, step_name) = tag.split_once(METADATA_SEPARATOR)?;
        if pass_id.is_empty() || step_name.is_empty() {
            return None;
        }
        Some(Self::new(pass_id, step_name))
    }

    /// Videos are named after the metadata they were generated with, so a
    /// filename belongs to this key when it contains both halves.
    pub fn matches_filename(&self, filename: &str) -> bool {
        filename.contains(&self.pass_id) && filename.contains(&self.step_name)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request_key())
    }
}
