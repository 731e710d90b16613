//! # Streaming Configuration
//!
//! Configuration and statistics types for the streaming engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Streaming engine configuration.
///
/// Controls the size of the hardware buffer ring, how much audio each ring
/// slot carries, how often the background loop polls the voice, and how
/// patient it is with empty reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Number of hardware buffers kept in flight with the backend.
    ///
    /// Default: 3.
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    /// Additional attempts made when the source returns an empty chunk,
    /// before the empty chunk is taken as end of stream.
    ///
    /// Default: 2.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Sleep between two iterations of the background loop.
    ///
    /// Must stay well under `chunk_duration`, otherwise the voice starves
    /// before processed buffers are noticed.
    ///
    /// Default: 50ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Amount of audio decoded into each ring slot.
    ///
    /// Default: 1 second.
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            read_retries: default_read_retries(),
            poll_interval: default_poll_interval(),
            chunk_duration: default_chunk_duration(),
        }
    }
}

impl StreamingConfig {
    /// Create a configuration optimized for low latency.
    ///
    /// - Short chunks (250ms), so seeks and restarts refill quickly
    /// - One extra ring slot to compensate for the smaller chunks
    /// - Faster polling
    pub fn low_latency() -> Self {
        Self {
            buffer_count: 4,
            poll_interval: Duration::from_millis(10),
            chunk_duration: Duration::from_millis(250),
            ..Default::default()
        }
    }

    /// Create a configuration that tolerates slow decoders.
    ///
    /// - Two seconds of audio per chunk
    /// - More retries on empty reads
    pub fn high_stability() -> Self {
        Self {
            buffer_count: 3,
            read_retries: 4,
            poll_interval: Duration::from_millis(100),
            chunk_duration: Duration::from_secs(2),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_count == 0 {
            return Err("buffer_count must be > 0".to_string());
        }

        if self.chunk_duration.is_zero() {
            return Err("chunk_duration must be > 0".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0".to_string());
        }

        if self.poll_interval >= self.chunk_duration {
            return Err("poll_interval must be shorter than chunk_duration".to_string());
        }

        Ok(())
    }

    /// Samples (all channels) decoded into one ring slot.
    pub fn chunk_samples(&self, channels: u16, sample_rate: u32) -> usize {
        let frames = (self.chunk_duration.as_secs_f64() * sample_rate as f64).round() as usize;
        frames.max(1) * channels as usize
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_buffer_count() -> usize {
    3
}

fn default_read_retries() -> u32 {
    2
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_chunk_duration() -> Duration {
    Duration::from_secs(1)
}

// ============================================================================
// Streaming Statistics
// ============================================================================

/// Counters collected by a stream's background loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Background loops started (one per play, seek or restart).
    pub loops_started: u64,
    /// Chunks uploaded and queued on the voice.
    pub buffers_submitted: u64,
    /// Samples uploaded to the backend.
    pub samples_submitted: u64,
    /// Samples the backend reported as played.
    pub samples_consumed: u64,
    /// Empty chunks returned by the source, retried or not.
    pub empty_reads: u64,
    /// Times the voice starved and had to be restarted.
    pub underrun_count: u32,
}

impl StreamingStats {
    /// Samples submitted but not yet reported as played.
    pub fn samples_in_flight(&self) -> u64 {
        self.samples_submitted.saturating_sub(self.samples_consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.read_retries, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.chunk_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_presets_are_valid() {
        let low = StreamingConfig::low_latency();
        assert!(low.validate().is_ok());
        assert!(low.chunk_duration < StreamingConfig::default().chunk_duration);

        let stable = StreamingConfig::high_stability();
        assert!(stable.validate().is_ok());
        assert!(stable.read_retries > StreamingConfig::default().read_retries);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StreamingConfig::default();

        // Invalid: zero buffers
        config.buffer_count = 0;
        assert!(config.validate().is_err());
        config.buffer_count = 3;

        // Invalid: polling slower than a chunk plays
        config.poll_interval = Duration::from_secs(2);
        assert!(config.validate().is_err());
        config.poll_interval = Duration::from_millis(50);

        // Invalid: empty chunks
        config.chunk_duration = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_samples_calculation() {
        let config = StreamingConfig::default();

        // One second of 44.1kHz stereo
        assert_eq!(config.chunk_samples(2, 44_100), 88_200);

        // Mono
        assert_eq!(config.chunk_samples(1, 22_050), 22_050);

        let low = StreamingConfig::low_latency();
        assert_eq!(low.chunk_samples(2, 48_000), 24_000);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: StreamingConfig = serde_json::from_str(r#"{"buffer_count": 5}"#).unwrap();
        assert_eq!(config.buffer_count, 5);
        assert_eq!(config.read_retries, 2);
        assert_eq!(config.chunk_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_stats_in_flight() {
        let stats = StreamingStats {
            samples_submitted: 300,
            samples_consumed: 100,
            ..Default::default()
        };
        assert_eq!(stats.samples_in_flight(), 200);
    }
}
