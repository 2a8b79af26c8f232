pub mod capture;
pub mod note;
pub mod pass;

pub use capture::CaptureRecord;
pub use note::PassNote;
pub use pass::{Pass, Step};
