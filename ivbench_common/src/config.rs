//! Configuration loading and validation.
//!
//! Both peers load the same TOML file so the region path, size and
//! timeout bounds cannot drift apart. CLI flags override individual
//! fields after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Payload size presets named after the video frames they correspond to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePreset {
    /// 1920x1080, 24 bpp.
    Fhd,
    /// 2560x1440, 24 bpp.
    Qhd,
    /// 3840x2160, 24 bpp.
    Uhd,
}

impl FramePreset {
    /// Payload size in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            FramePreset::Fhd => consts::FHD_FRAME_BYTES,
            FramePreset::Qhd => consts::QHD_FRAME_BYTES,
            FramePreset::Uhd => consts::UHD_FRAME_BYTES,
        }
    }

    /// Human-readable label used in logs and records.
    pub const fn label(self) -> &'static str {
        match self {
            FramePreset::Fhd => "1080p",
            FramePreset::Qhd => "1440p",
            FramePreset::Uhd => "4K",
        }
    }
}

/// Backing region parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Host-visible backing file.
    pub path: PathBuf,
    /// Guest-side PCI BAR resource node; the reader falls back to `path`
    /// when this node does not exist.
    pub pci_resource: PathBuf,
    /// Total mapped size in bytes (header plus payload capacity).
    pub size: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(consts::DEFAULT_REGION_PATH),
            pci_resource: PathBuf::from(consts::DEFAULT_PCI_RESOURCE_PATH),
            size: consts::DEFAULT_REGION_SIZE,
        }
    }
}

/// Polling cadence and wait bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Yield between counterparty state reads [µs].
    pub poll_interval_us: u64,
    /// Bound on the reader's initial handshake wait [s].
    pub handshake_timeout_s: u64,
    /// Bound on the post-SENDING wait for PROCESSING [ms], latency suite.
    pub processing_timeout_ms: u64,
    /// Bound on the post-SENDING wait for PROCESSING [ms], bandwidth suite.
    pub bandwidth_processing_timeout_ms: u64,
    /// Bound on the wait for ACKNOWLEDGED [ms].
    pub ack_timeout_ms: u64,
    /// Bound on the wait for the counterparty READY [ms].
    pub ready_timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: consts::POLL_INTERVAL_US,
            handshake_timeout_s: consts::HANDSHAKE_TIMEOUT_S,
            processing_timeout_ms: consts::PROCESSING_TIMEOUT_MS,
            bandwidth_processing_timeout_ms: consts::BANDWIDTH_PROCESSING_TIMEOUT_MS,
            ack_timeout_ms: consts::ACK_TIMEOUT_MS,
            ready_timeout_ms: consts::READY_TIMEOUT_MS,
        }
    }
}

impl ProtocolConfig {
    /// Polling yield as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Handshake bound as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_s)
    }

    /// PROCESSING bound for the given suite kind.
    pub fn processing_timeout(&self, bandwidth: bool) -> Duration {
        if bandwidth {
            Duration::from_millis(self.bandwidth_processing_timeout_ms)
        } else {
            Duration::from_millis(self.processing_timeout_ms)
        }
    }

    /// ACKNOWLEDGED bound as a [`Duration`].
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// READY bound as a [`Duration`].
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Latency suite parameters: many iterations of one fixed large payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySuiteConfig {
    /// Number of messages.
    pub iterations: u32,
    /// Payload preset used for every message.
    pub frame: FramePreset,
}

impl Default for LatencySuiteConfig {
    fn default() -> Self {
        Self {
            iterations: consts::DEFAULT_LATENCY_ITERATIONS,
            frame: FramePreset::Uhd,
        }
    }
}

/// Bandwidth suite parameters: a schedule of payload sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthSuiteConfig {
    /// Iterations per payload size.
    pub iterations: u32,
    /// Settle delay between iterations [ms].
    pub settle_ms: u64,
    /// Payload sizes to sweep; entries larger than the region's payload
    /// capacity are skipped with a warning.
    pub frames: Vec<FramePreset>,
}

impl Default for BandwidthSuiteConfig {
    fn default() -> Self {
        Self {
            iterations: consts::DEFAULT_BANDWIDTH_ITERATIONS,
            settle_ms: consts::DEFAULT_SETTLE_MS,
            frames: vec![FramePreset::Fhd, FramePreset::Qhd, FramePreset::Uhd],
        }
    }
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Backing region parameters.
    pub region: RegionConfig,
    /// Polling cadence and wait bounds.
    pub protocol: ProtocolConfig,
    /// Latency suite parameters.
    pub latency: LatencySuiteConfig,
    /// Bandwidth suite parameters.
    pub bandwidth: BandwidthSuiteConfig,
}

impl ConfigLoader for BenchConfig {}

impl BenchConfig {
    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - the region size is outside `[REGION_MIN_SIZE, REGION_MAX_SIZE]`
    /// - any timeout bound or the poll interval is zero
    /// - a suite has zero iterations
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.size < consts::REGION_MIN_SIZE
            || self.region.size > consts::REGION_MAX_SIZE
        {
            return Err(ConfigError::ValidationError(format!(
                "region size {} outside [{}, {}]",
                self.region.size,
                consts::REGION_MIN_SIZE,
                consts::REGION_MAX_SIZE
            )));
        }
        if self.protocol.poll_interval_us == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_us must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("handshake_timeout_s", self.protocol.handshake_timeout_s),
            ("processing_timeout_ms", self.protocol.processing_timeout_ms),
            (
                "bandwidth_processing_timeout_ms",
                self.protocol.bandwidth_processing_timeout_ms,
            ),
            ("ack_timeout_ms", self.protocol.ack_timeout_ms),
            ("ready_timeout_ms", self.protocol.ready_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be non-zero"
                )));
            }
        }
        if self.latency.iterations == 0 || self.bandwidth.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "suite iteration counts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Total number of messages the reader should expect from a run of
    /// both suites.
    pub fn expected_message_budget(&self) -> u32 {
        let bandwidth_total = self.bandwidth.iterations * self.bandwidth.frames.len() as u32;
        self.latency.iterations + bandwidth_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.region.size, consts::DEFAULT_REGION_SIZE);
        assert_eq!(config.latency.frame, FramePreset::Uhd);
    }

    #[test]
    fn message_budget_sums_suites() {
        let config = BenchConfig::default();
        assert_eq!(config.expected_message_budget(), 100 + 10 * 3);
    }

    #[test]
    fn rejects_undersized_region() {
        let mut config = BenchConfig::default();
        config.region.size = 1024;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = BenchConfig::default();
        config.protocol.poll_interval_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[region]
path = "/tmp/ivbench_test_region"
pci_resource = "/nonexistent/resource2"
size = 8388608

[latency]
iterations = 5
frame = "fhd"
"#
        )
        .unwrap();

        let config = BenchConfig::load(file.path()).unwrap();
        assert_eq!(config.region.size, 8 * 1024 * 1024);
        assert_eq!(config.latency.iterations, 5);
        assert_eq!(config.latency.frame, FramePreset::Fhd);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.bandwidth.iterations, consts::DEFAULT_BANDWIDTH_ITERATIONS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = BenchConfig::load(Path::new("/nonexistent/ivbench.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn preset_sizes() {
        assert_eq!(FramePreset::Fhd.bytes(), 6_220_800);
        assert_eq!(FramePreset::Qhd.bytes(), 11_059_200);
        assert_eq!(FramePreset::Uhd.bytes(), 24_883_200);
        assert_eq!(FramePreset::Uhd.label(), "4K");
    }
}
