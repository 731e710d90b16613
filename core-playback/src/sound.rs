//! One-shot playback of a [`SoundBuffer`].

use crate::device::AudioDevice;
use crate::error::Result;
use crate::sound_buffer::SoundBuffer;
use crate::source::SoundSource;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A voice bound to a static buffer. Position and state come straight from
/// the backend voice.
pub struct Sound {
    source: SoundSource,
    buffer: Option<Arc<SoundBuffer>>,
}

impl Sound {
    /// Create a sound with no buffer.
    pub fn new(device: &AudioDevice) -> Result<Self> {
        Ok(Self {
            source: SoundSource::new(device.backend())?,
            buffer: None,
        })
    }

    pub fn with_buffer(device: &AudioDevice, buffer: Arc<SoundBuffer>) -> Result<Self> {
        let mut sound = Self::new(device)?;
        sound.set_buffer(Some(buffer))?;
        Ok(sound)
    }

    /// Replace the buffer, stopping the sound first. `None` detaches it.
    pub fn set_buffer(&mut self, buffer: Option<Arc<SoundBuffer>>) -> Result<()> {
        let backend = self.source.backend();
        let voice = self.source.voice();
        backend.stop(voice)?;
        backend.attach_buffer(voice, buffer.as_ref().map(|buffer| buffer.handle()))?;
        debug!(%voice, attached = buffer.is_some(), "sound buffer changed");
        self.buffer = buffer;
        Ok(())
    }

    pub fn buffer(&self) -> Option<&Arc<SoundBuffer>> {
        self.buffer.as_ref()
    }

    /// Start, resume, or restart from the beginning once finished.
    pub fn play(&self) -> Result<()> {
        Ok(self.source.backend().play(self.source.voice())?)
    }

    pub fn pause(&self) -> Result<()> {
        Ok(self.source.backend().pause(self.source.voice())?)
    }

    pub fn stop(&self) -> Result<()> {
        Ok(self.source.backend().stop(self.source.voice())?)
    }

    pub fn playing_offset(&self) -> Duration {
        self.source
            .backend()
            .playback_offset(self.source.voice())
            .unwrap_or_default()
    }

    /// Move within the buffer. On a stopped sound the offset applies at the
    /// next `play`.
    pub fn set_playing_offset(&self, offset: Duration) -> Result<()> {
        Ok(self
            .source
            .backend()
            .set_playback_offset(self.source.voice(), offset)?)
    }
}

impl Deref for Sound {
    type Target = SoundSource;

    fn deref(&self) -> &SoundSource {
        &self.source
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            if let Err(e) = self.set_buffer(None) {
                warn!("Failed to detach sound buffer: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PlayStatus;
    use crate::traits::StreamInfo;
    use bridge_desktop::SoftwareBackend;
    use std::thread;

    fn setup() -> (Arc<SoftwareBackend>, AudioDevice, Arc<SoundBuffer>) {
        let backend = Arc::new(SoftwareBackend::new());
        let device = AudioDevice::new(backend.clone()).unwrap();
        // 200ms of 1kHz mono
        let buffer = SoundBuffer::from_samples(&device, vec![0; 200], StreamInfo::new(200, 1, 1_000))
            .unwrap();
        (backend, device, Arc::new(buffer))
    }

    #[test]
    fn test_play_pause_stop() {
        let (_backend, device, buffer) = setup();
        let sound = Sound::with_buffer(&device, buffer).unwrap();
        assert_eq!(sound.status(), PlayStatus::Stopped);

        sound.play().unwrap();
        assert_eq!(sound.status(), PlayStatus::Playing);
        thread::sleep(Duration::from_millis(50));
        sound.pause().unwrap();
        assert_eq!(sound.status(), PlayStatus::Paused);
        assert!(sound.playing_offset() >= Duration::from_millis(40));

        sound.stop().unwrap();
        assert_eq!(sound.status(), PlayStatus::Stopped);
        assert_eq!(sound.playing_offset(), Duration::ZERO);
    }

    #[test]
    fn test_offset_applies_on_next_play() {
        let (_backend, device, buffer) = setup();
        let sound = Sound::with_buffer(&device, buffer).unwrap();
        sound.set_playing_offset(Duration::from_millis(150)).unwrap();
        sound.play().unwrap();
        assert!(sound.playing_offset() >= Duration::from_millis(150));

        thread::sleep(Duration::from_millis(100));
        assert_eq!(sound.status(), PlayStatus::Stopped);
    }

    #[test]
    fn test_buffer_outlives_sound() {
        let (backend, device, buffer) = setup();
        let sound = Sound::with_buffer(&device, buffer.clone()).unwrap();
        drop(sound);
        assert_eq!(backend.voice_count(), 0);
        assert_eq!(backend.buffer_count(), 1);

        drop(buffer);
        assert_eq!(backend.buffer_count(), 0);
    }
}
