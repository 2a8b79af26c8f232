pub mod config;
pub mod coordinator;
mod poll_worker;
pub mod request;
pub mod source;

pub use config::{PollingConfig, SubscriberPolicy};
pub use coordinator::{Completion, CompletionCallback, GenerationCoordinator};
pub use request::StepVideoRequester;
pub use source::{RecordSource, StoreRecordSource};
