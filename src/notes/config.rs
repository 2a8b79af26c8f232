use serde::{Deserialize, Serialize};

/// Where notes live in the capture store and how they are listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    /// Component name every note record is written under.
    pub component_name: String,
    pub component_type: String,
    /// Source tag recorded as `created_by`.
    pub created_by: String,
    pub page_size: usize,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            component_name: "sanding-notes".into(),
            component_type: "pass-note".into(),
            created_by: "sandwatch".into(),
            page_size: 100,
        }
    }
}
