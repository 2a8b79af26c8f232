pub mod capture_store;
pub mod deadline;
pub mod device;
pub mod device_time;
pub mod memory;
pub mod paging;

pub use capture_store::{CaptureFilter, CapturePage, CaptureStore, PageRequest, SortOrder, Upload};
pub use deadline::{with_deadline, RemoteError};
pub use device::{DeviceChannel, DeviceCommand, FetchedVideo, SaveAck, StorageState, VideoService};
