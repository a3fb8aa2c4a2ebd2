//! Engine configuration
//!
//! A single TOML-backed config struct covering the recognized playback
//! options: output device selection, buffer sizing and the overrun, pause
//! and resample policies.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the feed thread does when the ring buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Wait for the consumer to drain space (decode thread is not real-time).
    Block,
    /// Discard the frames that do not fit, counting them in the ring stats.
    DropNewest,
}

/// Resampler quality selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleQuality {
    /// Polynomial interpolation. Cheap, fine for playback.
    Linear,
    /// Windowed-sinc interpolation. Higher CPU cost.
    HighQuality,
}

/// What `pause()` does with the device stream.
///
/// `Starve` keeps the stream running and lets ring reads yield silence, so
/// resume is instant. `SuspendDevice` stops the stream and releases the
/// device period clock, trading resume latency for idle CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausePolicy {
    Starve,
    SuspendDevice,
}

/// Playback engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device id (None = system default device)
    pub device_id: Option<String>,

    /// Requested device callback granularity in frames
    pub buffer_period_frames: u32,

    /// Ring buffer depth in frames (rounded up to a power of two, and to at
    /// least two device periods at open time)
    pub ring_capacity_frames: usize,

    /// Producer behavior when the ring buffer is full
    pub overrun_policy: OverrunPolicy,

    /// Sample-rate conversion quality
    pub resample_quality: ResampleQuality,

    /// Device stream behavior while paused
    pub pause_policy: PausePolicy,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            buffer_period_frames: 1024,
            ring_capacity_frames: 16384,
            overrun_policy: OverrunPolicy::Block,
            resample_quality: ResampleQuality::Linear,
            pause_policy: PausePolicy::Starve,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing keys fall back to defaults; the file may be sparse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate option ranges.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_period_frames == 0 {
            return Err(Error::Config("buffer_period_frames must be > 0".into()));
        }
        if self.ring_capacity_frames == 0 {
            return Err(Error::Config("ring_capacity_frames must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overrun_policy, OverrunPolicy::Block);
        assert_eq!(config.resample_quality, ResampleQuality::Linear);
        assert_eq!(config.pause_policy, PausePolicy::Starve);
    }

    #[test]
    fn sparse_toml_fills_defaults() {
        let config: PlayerConfig =
            toml::from_str("buffer_period_frames = 256\noverrun_policy = \"drop_newest\"")
                .unwrap();
        assert_eq!(config.buffer_period_frames, 256);
        assert_eq!(config.overrun_policy, OverrunPolicy::DropNewest);
        assert_eq!(config.ring_capacity_frames, 16384);
    }

    #[test]
    fn zero_period_rejected() {
        let config = PlayerConfig {
            buffer_period_frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
