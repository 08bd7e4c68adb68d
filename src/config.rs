use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: u32 = 4096;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FLASH_VERSION: &str = "FMLE/3.0 (compatible; flvcast)";

/// Settings of one publishing session.
///
/// ```rust,ignore
/// let config = PublishConfig::new()
///     .set_chunk_size(8192)
///     .set_debug_flv("out.flv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Outbound RTMP chunk size announced right after the handshake.
    pub chunk_size: u32,
    /// Applies to connecting, to every blocking write and to waiting for the
    /// server's replies during setup.
    pub timeout: Duration,
    pub flash_version: String,
    /// Sidecar FLV file receiving a copy of every record sent.
    pub debug_flv: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishConfig {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
            flash_version: DEFAULT_FLASH_VERSION.to_string(),
            debug_flv: None,
        }
    }

    /// Values below 128 (the protocol default) or above 0x7FFFFFFF are clamped.
    pub fn set_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size.clamp(128, 0x7FFF_FFFF);
        self
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_flash_version(mut self, flash_version: impl Into<String>) -> Self {
        self.flash_version = flash_version.into();
        self
    }

    pub fn set_debug_flv(mut self, path: impl AsRef<Path>) -> Self {
        self.debug_flv = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Command-line options shared by every publishing binary.
#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Also write every record sent to this FLV file
    #[arg(long, value_name = "PATH")]
    pub debug_flv: Option<PathBuf>,

    /// Outbound RTMP chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Network timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl PublishArgs {
    pub fn to_config(&self) -> PublishConfig {
        let config = PublishConfig::new()
            .set_chunk_size(self.chunk_size)
            .set_timeout(Duration::from_secs(self.timeout_secs.max(1)));
        match &self.debug_flv {
            Some(path) => config.set_debug_flv(path),
            None => config,
        }
    }
}

/// Parameters of a generated video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    /// Frame rate as numerator / denominator.
    pub frame_rate: (u32, u32),
    /// Maximum distance between keyframes, in frames.
    pub keyframe_interval: u32,
    /// Average bitrate in kbit/s, `None` for constant quality.
    pub bitrate_kbps: Option<u32>,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            frame_rate: (24, 1),
            keyframe_interval: 24,
            bitrate_kbps: None,
        }
    }
}

impl VideoParams {
    pub fn set_frame_rate(mut self, num: u32, den: u32) -> Self {
        self.frame_rate = (num, den.max(1));
        self
    }

    pub fn set_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames.max(1);
        self
    }

    pub fn set_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frame_rate.0 as f64 / self.frame_rate.1 as f64
    }

    /// Nominal duration of one frame, exact to the nanosecond.
    pub fn frame_duration(&self) -> Duration {
        let (num, den) = self.frame_rate;
        Duration::from_nanos(1_000_000_000u64 * den as u64 / num.max(1) as u64)
    }
}

/// Parameters of a generated audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one encoder input block.
    pub block_samples: u32,
    pub bitrate_kbps: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            block_samples: 1024,
            bitrate_kbps: 128,
        }
    }
}

impl AudioParams {
    pub fn block_duration(&self) -> Duration {
        Duration::from_nanos(
            1_000_000_000u64 * self.block_samples as u64 / self.sample_rate.max(1) as u64,
        )
    }

    /// Video parameters whose frame rate equals the audio block rate, so one
    /// picture goes with each audio block.
    pub fn coupled_video(&self, video: VideoParams) -> VideoParams {
        let blocks_per_second = self.sample_rate / self.block_samples.max(1);
        video
            .set_frame_rate(self.sample_rate, self.block_samples)
            .set_keyframe_interval(blocks_per_second * 4)
    }
}
