// Advisory silence detection
//
// Tracks the running length of silent input and fires a warning after a
// sustained quiet stretch. Purely advisory: nothing here pauses or stops
// the session, the engine only surfaces the warning to the UI.

use crate::config::SilenceConfig;

/// Advisory notification from the silence monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceEvent {
    /// Input has been silent for at least the configured warning window.
    Warning { silent_secs: u32 },
}

/// Per-frame RMS tracker over the live sample stream.
pub struct SilenceMonitor {
    config: SilenceConfig,
    sample_rate: u32,
    silent_samples: u64,
    cooldown_samples: u64,
}

impl SilenceMonitor {
    pub fn new(config: SilenceConfig, sample_rate: u32) -> Self {
        Self { config, sample_rate, silent_samples: 0, cooldown_samples: 0 }
    }

    /// Feed one frame of normalized samples; returns a warning when the
    /// silent run crosses the threshold.
    pub fn feed(&mut self, samples: &[f32]) -> Option<SilenceEvent> {
        if samples.is_empty() {
            return None;
        }
        let frame_len = samples.len() as u64;
        if rms(samples) >= self.config.rms_threshold {
            self.silent_samples = 0;
            self.cooldown_samples = self.cooldown_samples.saturating_sub(frame_len);
            return None;
        }

        self.silent_samples += frame_len;
        if self.cooldown_samples > 0 {
            self.cooldown_samples = self.cooldown_samples.saturating_sub(frame_len);
            return None;
        }

        let warning_window = self.config.warning_secs as u64 * self.sample_rate as u64;
        if self.silent_samples < warning_window {
            return None;
        }

        let silent_secs = (self.silent_samples / self.sample_rate as u64) as u32;
        crate::info!("[silence] sustained silence detected ({}s)", silent_secs);
        self.silent_samples = 0;
        self.cooldown_samples = self.config.cooldown_secs as u64 * self.sample_rate as u64;
        Some(SilenceEvent::Warning { silent_secs })
    }

    /// Clear accumulated state; called around pause/resume boundaries so
    /// paused stretches never count as silence.
    pub fn reset(&mut self) {
        self.silent_samples = 0;
        self.cooldown_samples = 0;
    }
}

fn rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
#[path = "silence_test.rs"]
mod tests;
