pub mod artifact_key;
pub mod matching;

pub use artifact_key::ArtifactKey;
pub use matching::{match_before_after_images, match_pass_files, match_step_videos, BeforeAfter};
