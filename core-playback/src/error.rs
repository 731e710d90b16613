//! # Playback Error Types
//!
//! Error types for decoding, streaming and backend operations.
//!
//! Only format and open failures ever reach the caller of `Music::open` or
//! `SoundBuffer::load`. Failures inside a running stream are logged and end
//! the stream the same way a natural end-of-stream does.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// No registered decoder recognised the source.
    #[error("Unknown audio format: no registered decoder matched the source")]
    UnknownFormat,

    /// Audio format was recognised but its header cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// The decoded layout has no matching backend PCM format.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannelCount(u16),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred during audio decoding.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio stream is corrupted or contains invalid data.
    #[error("Corrupted audio stream: {0}")]
    CorruptedStream(String),

    /// Seeking is not supported for this audio source.
    #[error("Seeking not supported")]
    SeekNotSupported,

    /// A sound buffer was loaded from a source with no samples.
    #[error("Audio source contains no samples")]
    EmptyBuffer,

    // ========================================================================
    // Streaming Errors
    // ========================================================================
    /// A ring slot was resubmitted while the backend still had it queued.
    #[error("Buffer ring slot {0} is still queued on the voice")]
    BufferStillQueued(usize),

    /// The backend handed back a slot's buffer that the ring never queued.
    #[error("Buffer ring slot {0} came back without being queued")]
    BufferNotQueued(usize),

    /// The backend returned a buffer handle the ring does not own.
    #[error("Buffer {0} does not belong to this stream")]
    ForeignBuffer(u32),

    /// Invalid streaming configuration.
    #[error("Invalid streaming configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The process-wide audio device has not been initialised.
    #[error("Audio device not initialized")]
    DeviceNotInitialized,

    /// `device::init` was called twice without `device::shutdown`.
    #[error("Audio device already initialized")]
    DeviceAlreadyInitialized,

    /// The host backend rejected an operation.
    #[error("Audio backend error: {0}")]
    Backend(#[from] BridgeError),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::IoError(err) if err.kind() == std::io::ErrorKind::Interrupted)
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::UnknownFormat
                | PlaybackError::InvalidFormat(_)
                | PlaybackError::UnsupportedChannelCount(_)
        )
    }

    /// Returns `true` if the engine's own bookkeeping disagreed with the backend.
    pub fn is_ring_violation(&self) -> bool {
        matches!(
            self,
            PlaybackError::BufferStillQueued(_)
                | PlaybackError::BufferNotQueued(_)
                | PlaybackError::ForeignBuffer(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
