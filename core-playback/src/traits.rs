//! # Core Playback Traits
//!
//! The two seams of the streaming pipeline:
//!
//! - **[`AudioDecoder`]**: turns an encoded, seekable byte source into
//!   interleaved 16-bit PCM. One implementation per container format.
//! - **[`StreamSource`]**: what the streaming engine pulls from. It hands out
//!   one chunk of PCM at a time and can be repositioned. `Music` implements it
//!   on top of a decoder; tests and procedural audio implement it directly.
//!
//! ## Architecture
//!
//! ```text
//! SeekableSource → AudioDecoder → DecoderFeed (StreamSource) → SoundStream → AudioBackend
//! ```
//!
//! ## Threading Model
//!
//! Decoders and stream sources are driven from the stream's background
//! thread, so both must be `Send`. They are never used from two threads at
//! once.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek};
use std::time::Duration;

// ============================================================================
// Stream Description
// ============================================================================

/// Immutable description of an opened PCM stream.
///
/// `sample_count` counts samples across all channels: one second of 44.1kHz
/// stereo is 88200 samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Total samples, all channels included.
    pub sample_count: u64,
    /// Interleaved channels per frame.
    pub channel_count: u16,
    /// Frames per second.
    pub sample_rate: u32,
}

impl StreamInfo {
    pub fn new(sample_count: u64, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            sample_count,
            channel_count,
            sample_rate,
        }
    }

    /// Total playing time: `sample_count / channel_count / sample_rate`.
    pub fn duration(&self) -> Duration {
        self.samples_to_duration(self.sample_count)
    }

    /// Convert an all-channel sample count into time.
    pub fn samples_to_duration(&self, samples: u64) -> Duration {
        if self.channel_count == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = samples as f64 / f64::from(self.channel_count);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }

    /// Convert time into an all-channel sample offset, aligned to whole frames.
    pub fn duration_to_samples(&self, offset: Duration) -> u64 {
        let frames = (offset.as_secs_f64() * f64::from(self.sample_rate)) as u64;
        frames * u64::from(self.channel_count)
    }

    pub fn frame_count(&self) -> u64 {
        if self.channel_count == 0 {
            return 0;
        }
        self.sample_count / u64::from(self.channel_count)
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples, {} channels, {} Hz, {:.3} s",
            self.sample_count,
            self.channel_count,
            self.sample_rate,
            self.duration().as_secs_f64()
        )
    }
}

// ============================================================================
// Decoder Contract
// ============================================================================

/// Encoded input a decoder can read and reposition.
///
/// Implemented for every `Read + Seek + Send + Sync` type: files,
/// `Cursor<Vec<u8>>`, `Cursor<&'static [u8]>`.
pub trait SeekableSource: Read + Seek + Send + Sync {}

impl<T> SeekableSource for T where T: Read + Seek + Send + Sync {}

/// Result of a successful [`AudioDecoder::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many samples were written and more may follow. The count can be
    /// shorter than the buffer, for example at a packet boundary.
    Samples(usize),
    /// The stream is exhausted after this many samples (possibly zero).
    EndOfStream(usize),
}

impl ReadOutcome {
    /// Number of samples written into the caller's buffer.
    pub fn count(self) -> usize {
        match self {
            ReadOutcome::Samples(n) | ReadOutcome::EndOfStream(n) => n,
        }
    }

    pub fn is_end_of_stream(self) -> bool {
        matches!(self, ReadOutcome::EndOfStream(_))
    }

    /// Outcome of a read of `count` samples; `exhausted` is the decoder's
    /// own knowledge that nothing follows.
    pub fn new(count: usize, exhausted: bool) -> Self {
        if exhausted {
            ReadOutcome::EndOfStream(count)
        } else {
            ReadOutcome::Samples(count)
        }
    }
}

/// Format-specific PCM decoder.
///
/// Instances are created unopened by the decoder registry. `open` must be
/// called exactly once before any other method.
///
/// # Panics
///
/// Implementations panic when `info`, `seek` or `read` are called before a
/// successful `open`; that is a programming error, not a recoverable one.
///
/// # Example
///
/// ```ignore
/// use core_playback::{AudioDecoder, ReadOutcome};
///
/// fn drain(decoder: &mut dyn AudioDecoder) -> core_playback::Result<Vec<i16>> {
///     let mut pcm = Vec::new();
///     let mut chunk = vec![0i16; 4096];
///     loop {
///         let outcome = decoder.read(&mut chunk)?;
///         pcm.extend_from_slice(&chunk[..outcome.count()]);
///         if outcome.is_end_of_stream() {
///             return Ok(pcm);
///         }
///     }
/// }
/// ```
pub trait AudioDecoder: Send {
    /// Parse headers from `source` and prepare to decode.
    ///
    /// Header problems are returned as format errors.
    fn open(&mut self, source: Box<dyn SeekableSource>) -> Result<StreamInfo>;

    fn info(&self) -> StreamInfo;

    /// Move to an all-channel sample offset. Offsets past the end clamp to
    /// end of stream.
    fn seek(&mut self, sample_offset: u64) -> Result<()>;

    /// Fill `buffer` with interleaved samples.
    ///
    /// A short read is not an error and does not by itself mean end of
    /// stream: decoders return [`ReadOutcome::EndOfStream`] only once the
    /// source is exhausted. A read that produces nothing at all must report
    /// `EndOfStream(0)`.
    fn read(&mut self, buffer: &mut [i16]) -> Result<ReadOutcome>;

    /// Release the underlying source.
    fn close(&mut self) -> Result<()>;
}

// ============================================================================
// Stream Source Contract
// ============================================================================

/// Chunked PCM producer consumed by the streaming engine.
pub trait StreamSource: Send {
    /// Produce the next chunk. An empty slice signals end of stream; the
    /// engine retries a bounded number of times before believing it.
    fn get_data(&mut self) -> &[i16];

    /// Reposition so the next chunk starts at `offset`.
    fn seek(&mut self, offset: Duration);

    /// Release whatever the source holds. Called once by `SoundStream::close`.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_info_duration() {
        let info = StreamInfo::new(88_200, 2, 44_100);
        assert_eq!(info.duration(), Duration::from_secs(1));
        assert_eq!(info.frame_count(), 44_100);
    }

    #[test]
    fn test_stream_info_conversions() {
        let info = StreamInfo::new(441_000, 2, 44_100);
        assert_eq!(info.duration_to_samples(Duration::from_millis(500)), 44_100);
        assert_eq!(
            info.samples_to_duration(44_100),
            Duration::from_millis(500)
        );

        let empty = StreamInfo::default();
        assert_eq!(empty.duration(), Duration::ZERO);
        assert_eq!(empty.frame_count(), 0);
    }

    #[test]
    fn test_stream_info_display() {
        let info = StreamInfo::new(88_200, 2, 44_100);
        assert_eq!(info.to_string(), "88200 samples, 2 channels, 44100 Hz, 1.000 s");
    }

    #[test]
    fn test_read_outcome() {
        assert_eq!(ReadOutcome::new(10, false), ReadOutcome::Samples(10));
        // A short read stays recoverable unless the decoder says otherwise
        assert_eq!(ReadOutcome::new(4, false), ReadOutcome::Samples(4));
        assert_eq!(ReadOutcome::new(4, true), ReadOutcome::EndOfStream(4));
        assert_eq!(ReadOutcome::new(10, true), ReadOutcome::EndOfStream(10));
        assert_eq!(ReadOutcome::EndOfStream(4).count(), 4);
        assert!(ReadOutcome::EndOfStream(0).is_end_of_stream());
        assert!(!ReadOutcome::Samples(3).is_end_of_stream());
    }
}
