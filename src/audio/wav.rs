// WAV capture backend
//
// File-backed CaptureDevice used on desktop builds and in tests. Platform
// audio callbacks push f32 frames through a SampleSink; samples are
// encoded as 16-bit PCM into the currently open chunk file. Frames that
// arrive while no chunk is open, or while paused, are dropped.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::device::{CaptureDevice, CaptureError, InputRoute, RouteApplied};
use crate::session::model::AudioSourceKind;

type ChunkWriter = hound::WavWriter<BufWriter<File>>;

/// Format of the produced WAV files.
#[derive(Debug, Clone, Copy)]
pub struct WavCaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for WavCaptureConfig {
    fn default() -> Self {
        Self { sample_rate: 44_100, channels: 1 }
    }
}

struct Shared {
    writer: Option<ChunkWriter>,
    path: Option<PathBuf>,
    paused: bool,
}

/// CaptureDevice writing pushed samples into WAV chunk files.
pub struct WavCaptureDevice {
    config: WavCaptureConfig,
    shared: Arc<Mutex<Shared>>,
    route: InputRoute,
}

/// Producer handle for the platform audio callback.
#[derive(Clone)]
pub struct SampleSink {
    shared: Arc<Mutex<Shared>>,
}

impl WavCaptureDevice {
    pub fn new(config: WavCaptureConfig) -> (Self, SampleSink) {
        let shared = Arc::new(Mutex::new(Shared { writer: None, path: None, paused: false }));
        let sink = SampleSink { shared: shared.clone() };
        let device = Self { config, shared, route: InputRoute::builtin() };
        (device, sink)
    }

    /// Route most recently requested through `set_input_route`.
    pub fn current_route(&self) -> &InputRoute {
        &self.route
    }
}

impl SampleSink {
    /// Push a frame of samples in [-1.0, 1.0].
    ///
    /// Returns the number of samples written; zero while closed or paused.
    pub fn push(&self, samples: &[f32]) -> usize {
        let mut shared = self.shared.lock();
        if shared.paused {
            return 0;
        }
        let writer = match shared.writer.as_mut() {
            Some(w) => w,
            None => return 0,
        };
        let mut written = 0;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            if let Err(e) = writer.write_sample(value) {
                crate::warn!("[wav] dropping frame tail, write failed: {}", e);
                break;
            }
            written += 1;
        }
        written
    }
}

impl CaptureDevice for WavCaptureDevice {
    fn open(&mut self, output_path: &Path, source: AudioSourceKind) -> Result<(), CaptureError> {
        let mut shared = self.shared.lock();
        if shared.writer.is_some() {
            return Err(CaptureError::Backend("capture session already open".to_string()));
        }
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CaptureError::Open(e.to_string()))?;
        }
        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer =
            hound::WavWriter::create(output_path, spec).map_err(|e| CaptureError::Open(e.to_string()))?;
        crate::debug!(
            "[wav] capture opened: {} ({} Hz, source {})",
            output_path.display(),
            self.config.sample_rate,
            source.as_str()
        );
        shared.writer = Some(writer);
        shared.path = Some(output_path.to_path_buf());
        shared.paused = false;
        Ok(())
    }

    fn supports_pause(&self) -> bool {
        true
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        let mut shared = self.shared.lock();
        if shared.writer.is_none() {
            return Err(CaptureError::NotOpen);
        }
        shared.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        let mut shared = self.shared.lock();
        if shared.writer.is_none() {
            return Err(CaptureError::NotOpen);
        }
        shared.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<u64, CaptureError> {
        let mut shared = self.shared.lock();
        let writer = shared.writer.take().ok_or(CaptureError::NotOpen)?;
        let path = shared.path.take();
        shared.paused = false;
        drop(shared);

        writer.finalize().map_err(|e| CaptureError::Backend(e.to_string()))?;
        let size = match path {
            Some(p) => std::fs::metadata(&p)
                .map(|m| m.len())
                .map_err(|e| CaptureError::Backend(e.to_string()))?,
            None => 0,
        };
        crate::debug!("[wav] capture stopped, {} bytes", size);
        Ok(size)
    }

    fn set_input_route(&mut self, route: &InputRoute) -> Result<RouteApplied, CaptureError> {
        // A WAV file sink has no physical input binding; the platform layer
        // retargets its callback. Nothing to restart.
        self.route = route.clone();
        Ok(RouteApplied::InPlace)
    }
}

#[cfg(test)]
#[path = "wav_test.rs"]
mod tests;
