//! Per-pass operator notes.
//!
//! A note's logical identity is its `pass_id`. Physically every save is a new
//! immutable capture record tagged `pass:{pass_id}`; the current value is the
//! one with the greatest `created_at_utc`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassNote {
    pub pass_id: String,
    pub note_text: String,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
    pub created_by: String,
    /// Assigned by the store once written; never part of the payload.
    #[serde(skip)]
    pub storage_id: Option<String>,
}

impl PassNote {
    pub fn pass_tag(pass_id: &str) -> String {
        format!("pass:{pass_id}")
    }

    /// Payload written to the capture store.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&NotePayload {
            pass_id: &self.pass_id,
            note_text: &self.note_text,
            created_at: self
                .created_at_utc
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            created_by: &self.created_by,
        })
    }

    pub fn from_bytes(bytes: &[u8], storage_id: &str) -> serde_json::Result<Self> {
        let mut note: PassNote = serde_json::from_slice(bytes)?;
        note.storage_id = Some(storage_id.to_string());
        Ok(note)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotePayload<'a> {
    pass_id: &'a str,
    note_text: &'a str,
    created_at: String,
    created_by: &'a str,
}

/// Newest first. The sort is stable so equal timestamps keep listing order.
pub fn sort_newest_first(notes: &mut [PassNote]) {
    notes.sort_by(|a, b| b.created_at_utc.cmp(&a.created_at_utc));
}
