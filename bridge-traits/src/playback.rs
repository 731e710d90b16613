//! Playback bridge traits and supporting audio types.
//!
//! These abstractions describe the object model of a 3D audio device in the
//! style of OpenAL: the host owns *buffers* (fixed PCM containers) and
//! *voices* (playback units that walk through a queue of buffers in real
//! time), plus a single *listener*. The playback core only ever holds opaque
//! handles and drives them through [`AudioBackend`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque handle to a backend-owned PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque handle to a backend voice (an OpenAL "source").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u32);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// Interleaved 16-bit PCM layouts a backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    Mono16,
    Stereo16,
    Quad16,
    /// 5.1 surround.
    Surround51,
    /// 6.1 surround.
    Surround61,
    /// 7.1 surround.
    Surround71,
}

impl SampleFormat {
    /// Select the PCM layout for a channel count.
    ///
    /// Returns `None` for layouts without a 16-bit backend format (3 and 5
    /// channels, or more than 8).
    pub fn from_channel_count(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono16),
            2 => Some(Self::Stereo16),
            4 => Some(Self::Quad16),
            6 => Some(Self::Surround51),
            7 => Some(Self::Surround61),
            8 => Some(Self::Surround71),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u16 {
        match self {
            Self::Mono16 => 1,
            Self::Stereo16 => 2,
            Self::Quad16 => 4,
            Self::Surround51 => 6,
            Self::Surround61 => 7,
            Self::Surround71 => 8,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        16
    }
}

/// Play state of a backend voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceState {
    /// Freshly created or rewound; nothing has been played yet.
    Initial,
    Playing,
    Paused,
    Stopped,
}

impl VoiceState {
    /// `Initial` and `Stopped` are both "not producing sound, not resumable".
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Initial | Self::Stopped)
    }
}

/// What a buffer was last filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub size_bytes: usize,
    pub bits: u16,
    pub channels: u16,
    pub sample_rate: u32,
}

impl BufferInfo {
    /// Number of samples (all channels) held by the buffer.
    pub fn sample_count(&self) -> usize {
        let bytes_per_sample = (self.bits / 8).max(1) as usize;
        self.size_bytes / bytes_per_sample
    }

    /// Playback length of the buffer at unit pitch.
    pub fn duration(&self) -> Duration {
        if self.channels == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.sample_count() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

/// Per-voice scalar parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceParam {
    /// Playback speed and perceived frequency multiplier (1.0 = unchanged).
    Pitch(f32),
    /// Linear gain (1.0 = unity).
    Gain(f32),
    Position([f32; 3]),
    RelativeToListener(bool),
    /// Distance under which the voice is heard at full gain.
    ReferenceDistance(f32),
    /// Attenuation factor applied past the reference distance.
    Rolloff(f32),
}

/// Listener parameters shared by every voice of a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListenerParam {
    Gain(f32),
    Position([f32; 3]),
    /// Facing direction and up vector; neither needs to be normalized.
    Orientation { at: [f32; 3], up: [f32; 3] },
}

/// Host audio device contract.
///
/// All calls are synchronous and expected to return quickly. Implementations
/// must enforce the queue rules below, since the playback core relies on them
/// to detect its own bookkeeping mistakes:
///
/// - data cannot be uploaded into a buffer that is currently queued or attached
/// - a buffer cannot be queued twice
/// - only processed buffers can be unqueued, oldest first
/// - a buffer that is queued or attached cannot be deleted
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{AudioBackend, SampleFormat};
///
/// fn beep(backend: &dyn AudioBackend, pcm: &[i16]) -> bridge_traits::Result<()> {
///     let buffer = backend.create_buffers(1)?[0];
///     backend.buffer_data(buffer, SampleFormat::Mono16, pcm, 44_100)?;
///     let voice = backend.create_voice()?;
///     backend.attach_buffer(voice, Some(buffer))?;
///     backend.play(voice)
/// }
/// ```
pub trait AudioBackend: Send + Sync {
    /// Allocate `count` empty buffers.
    fn create_buffers(&self, count: usize) -> Result<Vec<BufferHandle>>;

    fn delete_buffers(&self, buffers: &[BufferHandle]) -> Result<()>;

    /// Replace the contents of `buffer` with interleaved PCM.
    fn buffer_data(
        &self,
        buffer: BufferHandle,
        format: SampleFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<()>;

    fn buffer_info(&self, buffer: BufferHandle) -> Result<BufferInfo>;

    fn create_voice(&self) -> Result<VoiceHandle>;

    fn delete_voice(&self, voice: VoiceHandle) -> Result<()>;

    /// Bind a single static buffer to a stopped voice, replacing its queue.
    /// `None` detaches everything.
    fn attach_buffer(&self, voice: VoiceHandle, buffer: Option<BufferHandle>) -> Result<()>;

    /// Append buffers to the voice's play queue.
    fn queue_buffers(&self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()>;

    /// Remove `count` processed buffers from the head of the queue.
    fn unqueue_buffers(&self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>>;

    fn play(&self, voice: VoiceHandle) -> Result<()>;

    fn pause(&self, voice: VoiceHandle) -> Result<()>;

    /// Stop the voice; every queued buffer becomes processed.
    fn stop(&self, voice: VoiceHandle) -> Result<()>;

    fn voice_state(&self, voice: VoiceHandle) -> Result<VoiceState>;

    /// Number of queued buffers the voice has fully consumed.
    fn processed_buffers(&self, voice: VoiceHandle) -> Result<usize>;

    fn queued_buffers(&self, voice: VoiceHandle) -> Result<usize>;

    /// Position within the buffers currently queued on the voice, including
    /// processed buffers that have not been unqueued yet.
    fn playback_offset(&self, voice: VoiceHandle) -> Result<Duration>;

    fn set_playback_offset(&self, voice: VoiceHandle, offset: Duration) -> Result<()>;

    fn set_voice_param(&self, voice: VoiceHandle, param: VoiceParam) -> Result<()>;

    fn set_listener_param(&self, param: ListenerParam) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_channel_count() {
        assert_eq!(SampleFormat::from_channel_count(1), Some(SampleFormat::Mono16));
        assert_eq!(SampleFormat::from_channel_count(2), Some(SampleFormat::Stereo16));
        assert_eq!(SampleFormat::from_channel_count(6), Some(SampleFormat::Surround51));
        assert_eq!(SampleFormat::from_channel_count(3), None);
        assert_eq!(SampleFormat::from_channel_count(0), None);
        assert_eq!(SampleFormat::from_channel_count(9), None);

        for channels in [1, 2, 4, 6, 7, 8] {
            let format = SampleFormat::from_channel_count(channels).unwrap();
            assert_eq!(format.channel_count(), channels);
        }
    }

    #[test]
    fn test_buffer_info_sample_count() {
        let info = BufferInfo {
            size_bytes: 176_400,
            bits: 16,
            channels: 2,
            sample_rate: 44_100,
        };
        assert_eq!(info.sample_count(), 88_200);
        assert_eq!(info.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_voice_state_is_stopped() {
        assert!(VoiceState::Initial.is_stopped());
        assert!(VoiceState::Stopped.is_stopped());
        assert!(!VoiceState::Paused.is_stopped());
        assert!(!VoiceState::Playing.is_stopped());
    }
}
