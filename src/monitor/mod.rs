pub mod silence;
pub mod storage;

pub use silence::{SilenceEvent, SilenceMonitor};
pub use storage::{FreeSpaceProbe, StorageInfo, StorageMonitor, StorageStatus, StorageUpdate};
