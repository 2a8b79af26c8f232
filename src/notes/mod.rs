pub mod config;
pub mod store;

pub use config::NoteConfig;
pub use store::NoteStore;
