//! # Sound Sources
//!
//! [`SoundSource`] wraps one backend voice and the spatial parameters
//! common to one-shot sounds and streams.
//!
//! Every parameter is cached locally so getters never touch the backend.
//! Setters forward the new value first and only update the cache once the
//! backend accepted it.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{AudioBackend, VoiceHandle, VoiceParam, VoiceState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Observable state of a sound or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayStatus {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl From<VoiceState> for PlayStatus {
    fn from(state: VoiceState) -> Self {
        match state {
            VoiceState::Playing => PlayStatus::Playing,
            VoiceState::Paused => PlayStatus::Paused,
            VoiceState::Initial | VoiceState::Stopped => PlayStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SourceParams {
    pitch: f32,
    volume: f32,
    position: [f32; 3],
    relative_to_listener: bool,
    min_distance: f32,
    attenuation: f32,
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            volume: 100.0,
            position: [0.0; 3],
            relative_to_listener: false,
            min_distance: 1.0,
            attenuation: 1.0,
        }
    }
}

/// One backend voice plus its cached parameters.
///
/// Dropping the source deletes the voice.
pub struct SoundSource {
    backend: Arc<dyn AudioBackend>,
    voice: VoiceHandle,
    params: Mutex<SourceParams>,
}

impl SoundSource {
    /// Create a voice with default parameters.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Result<Self> {
        let voice = backend.create_voice()?;
        Ok(Self {
            backend,
            voice,
            params: Mutex::new(SourceParams::default()),
        })
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn voice(&self) -> VoiceHandle {
        self.voice
    }

    /// Raw play state of the voice.
    pub fn voice_state(&self) -> Result<VoiceState> {
        Ok(self.backend.voice_state(self.voice)?)
    }

    /// Voice state as a [`PlayStatus`]; an unreachable voice reads as stopped.
    pub fn status(&self) -> PlayStatus {
        match self.voice_state() {
            Ok(state) => state.into(),
            Err(e) => {
                warn!(voice = %self.voice, "Failed to query voice state: {}", e);
                PlayStatus::Stopped
            }
        }
    }

    /// Playback speed multiplier; also shifts the perceived frequency.
    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.backend
            .set_voice_param(self.voice, VoiceParam::Pitch(pitch))?;
        self.params.lock().pitch = pitch;
        Ok(())
    }

    /// Volume in `[0, 100]`, sent to the backend as a linear gain.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.backend
            .set_voice_param(self.voice, VoiceParam::Gain(volume * 0.01))?;
        self.params.lock().volume = volume;
        Ok(())
    }

    pub fn set_position(&self, x: f32, y: f32, z: f32) -> Result<()> {
        self.backend
            .set_voice_param(self.voice, VoiceParam::Position([x, y, z]))?;
        self.params.lock().position = [x, y, z];
        Ok(())
    }

    /// Interpret the position relative to the listener instead of absolutely.
    pub fn set_relative_to_listener(&self, relative: bool) -> Result<()> {
        self.backend
            .set_voice_param(self.voice, VoiceParam::RelativeToListener(relative))?;
        self.params.lock().relative_to_listener = relative;
        Ok(())
    }

    /// Distance under which the source is heard at full volume. Must be positive.
    pub fn set_min_distance(&self, distance: f32) -> Result<()> {
        if distance <= 0.0 {
            return Err(PlaybackError::Backend(
                bridge_traits::BridgeError::InvalidOperation(format!(
                    "min distance must be positive, got {distance}"
                )),
            ));
        }
        self.backend
            .set_voice_param(self.voice, VoiceParam::ReferenceDistance(distance))?;
        self.params.lock().min_distance = distance;
        Ok(())
    }

    /// Attenuation factor; 0 disables distance attenuation.
    pub fn set_attenuation(&self, attenuation: f32) -> Result<()> {
        self.backend
            .set_voice_param(self.voice, VoiceParam::Rolloff(attenuation))?;
        self.params.lock().attenuation = attenuation;
        Ok(())
    }

    pub fn pitch(&self) -> f32 {
        self.params.lock().pitch
    }

    pub fn volume(&self) -> f32 {
        self.params.lock().volume
    }

    pub fn position(&self) -> [f32; 3] {
        self.params.lock().position
    }

    pub fn is_relative_to_listener(&self) -> bool {
        self.params.lock().relative_to_listener
    }

    pub fn min_distance(&self) -> f32 {
        self.params.lock().min_distance
    }

    pub fn attenuation(&self) -> f32 {
        self.params.lock().attenuation
    }
}

impl Drop for SoundSource {
    fn drop(&mut self) {
        if let Err(e) = self.backend.delete_voice(self.voice) {
            warn!(voice = %self.voice, "Failed to delete voice: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SoftwareBackend;

    fn source() -> (Arc<SoftwareBackend>, SoundSource) {
        let backend = Arc::new(SoftwareBackend::new());
        let source = SoundSource::new(backend.clone()).unwrap();
        (backend, source)
    }

    #[test]
    fn test_defaults() {
        let (_backend, source) = source();
        assert_eq!(source.pitch(), 1.0);
        assert_eq!(source.volume(), 100.0);
        assert_eq!(source.position(), [0.0, 0.0, 0.0]);
        assert!(!source.is_relative_to_listener());
        assert_eq!(source.min_distance(), 1.0);
        assert_eq!(source.attenuation(), 1.0);
        assert_eq!(source.voice_state().unwrap(), VoiceState::Initial);
    }

    #[test]
    fn test_setters_reach_backend() {
        let (backend, source) = source();
        source.set_volume(50.0).unwrap();
        source.set_pitch(2.0).unwrap();
        source.set_position(1.0, 2.0, 3.0).unwrap();
        source.set_relative_to_listener(true).unwrap();

        let snapshot = backend.voice_snapshot(source.voice()).unwrap();
        assert!((snapshot.gain - 0.5).abs() < f32::EPSILON);
        assert_eq!(snapshot.pitch, 2.0);
        assert_eq!(snapshot.position, [1.0, 2.0, 3.0]);
        assert!(snapshot.relative_to_listener);
        assert_eq!(source.volume(), 50.0);
    }

    #[test]
    fn test_rejected_values_leave_cache_untouched() {
        let (_backend, source) = source();
        assert!(source.set_min_distance(0.0).is_err());
        assert_eq!(source.min_distance(), 1.0);

        assert!(source.set_pitch(-1.0).is_err());
        assert_eq!(source.pitch(), 1.0);
    }

    #[test]
    fn test_drop_deletes_voice() {
        let (backend, source) = source();
        assert_eq!(backend.voice_count(), 1);
        drop(source);
        assert_eq!(backend.voice_count(), 0);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlayStatus::from(VoiceState::Initial), PlayStatus::Stopped);
        assert_eq!(PlayStatus::from(VoiceState::Stopped), PlayStatus::Stopped);
        assert_eq!(PlayStatus::from(VoiceState::Paused), PlayStatus::Paused);
        assert_eq!(PlayStatus::from(VoiceState::Playing), PlayStatus::Playing);
    }
}
