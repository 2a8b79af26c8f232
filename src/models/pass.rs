use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named phase within a pass with its own time window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub pass_id: String,
}

impl Step {
    pub fn new(
        pass_id: impl Into<String>,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self> {
        let step = Self {
            name: name.into(),
            start,
            end,
            pass_id: pass_id.into(),
        };
        step.validate()?;
        Ok(step)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            bail!(
                "step '{}' of pass {} starts after it ends ({} > {})",
                self.name,
                self.pass_id,
                self.start,
                self.end
            );
        }
        Ok(())
    }
}

/// One end-to-end execution of the monitored process.
///
/// `steps` are ordered by `start`. Overlap is not checked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    pub pass_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub success: bool,
    pub err_string: Option<String>,
}

impl Pass {
    /// Closed-interval containment: both window edges count as inside.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }
}
