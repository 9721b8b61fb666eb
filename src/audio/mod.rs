pub mod device;
pub mod merger;
pub mod wav;

pub use device::{best_route, CaptureDevice, CaptureError, InputDeviceKind, InputRoute, PlaybackDevice, RouteApplied};
pub use merger::{estimate_duration_ms, merge_files, MergeError};
pub use wav::{SampleSink, WavCaptureConfig, WavCaptureDevice};
