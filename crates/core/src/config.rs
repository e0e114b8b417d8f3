//! Presentation configuration.
//!
//! The presenter is configured through [`PresentConfig`]. Defaults describe a
//! triple-buffered FIFO presenter with a double-buffered swapchain request;
//! a handful of values can be overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `VKPRESENT_FRAMES_IN_FLIGHT` | `frames_in_flight` |
//! | `VKPRESENT_MIN_IMAGES` | `min_image_count` |
//! | `VKPRESENT_GPU_TIMEOUT_MS` | `gpu_timeout` |
//! | `VKPRESENT_VALIDATION` | `enable_validation` |
//! | `VKPRESENT_STRICT_VALIDATION` | `strict_validation` |

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of frame slots.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Upper bound on frame slots.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Default minimum swapchain image count requested from the driver.
pub const DEFAULT_MIN_IMAGE_COUNT: u32 = 2;

/// Default hard timeout on GPU waits.
pub const DEFAULT_GPU_TIMEOUT: Duration = Duration::from_secs(10);

/// Presentation mode. Only strict FIFO is supported: no tearing, bounded latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentMode {
    #[default]
    Fifo,
}

/// Swapchain pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceFormat {
    /// 8-bit BGRA, UNORM storage, sRGB non-linear color space.
    #[default]
    Bgra8Unorm,
}

/// Configuration surface of the presenter.
#[derive(Debug, Clone)]
pub struct PresentConfig {
    /// Number of reusable frame slots (N).
    pub frames_in_flight: usize,
    /// Minimum swapchain image count to request.
    pub min_image_count: u32,
    pub present_mode: PresentMode,
    pub surface_format: SurfaceFormat,
    /// Hard timeout applied to fence waits and image acquisition.
    pub gpu_timeout: Duration,
    /// Enable the Khronos validation layer.
    pub enable_validation: bool,
    /// Abort after a frame that produced a validation error.
    pub strict_validation: bool,
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            min_image_count: DEFAULT_MIN_IMAGE_COUNT,
            present_mode: PresentMode::Fifo,
            surface_format: SurfaceFormat::Bgra8Unorm,
            gpu_timeout: DEFAULT_GPU_TIMEOUT,
            enable_validation: cfg!(debug_assertions),
            strict_validation: false,
            title: "vkpresent".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl PresentConfig {
    /// Builds a configuration from defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults overlaid with values returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VKPRESENT_FRAMES_IN_FLIGHT") {
            config.frames_in_flight = parse("VKPRESENT_FRAMES_IN_FLIGHT", &v)?;
        }
        if let Some(v) = lookup("VKPRESENT_MIN_IMAGES") {
            config.min_image_count = parse("VKPRESENT_MIN_IMAGES", &v)?;
        }
        if let Some(v) = lookup("VKPRESENT_GPU_TIMEOUT_MS") {
            config.gpu_timeout = Duration::from_millis(parse("VKPRESENT_GPU_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("VKPRESENT_VALIDATION") {
            config.enable_validation = parse_flag("VKPRESENT_VALIDATION", &v)?;
        }
        if let Some(v) = lookup("VKPRESENT_STRICT_VALIDATION") {
            config.strict_validation = parse_flag("VKPRESENT_STRICT_VALIDATION", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is within its supported range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        if self.min_image_count < 2 {
            return Err(Error::Config(format!(
                "min_image_count must be at least 2, got {}",
                self.min_image_count
            )));
        }
        if self.gpu_timeout.is_zero() {
            return Err(Error::Config("gpu_timeout must be non-zero".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "initial window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// GPU timeout in nanoseconds, the unit Vulkan waits take.
    pub fn gpu_timeout_ns(&self) -> u64 {
        u64::try_from(self.gpu_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: invalid value '{value}'")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key}: invalid flag '{value}'"))),
    }
}
