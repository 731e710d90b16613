//! # Audio Device
//!
//! The backend handle shared by every sound, plus the single listener.
//!
//! Applications normally call [`init`] once at startup and [`shutdown`] on
//! exit; [`current`] hands out the process-wide device in between. Each
//! playback constructor also accepts an explicit [`AudioDevice`], so
//! independent devices can coexist (tests rely on this).

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{AudioBackend, ListenerParam};
use parking_lot::{const_rwlock, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

static DEVICE: RwLock<Option<AudioDevice>> = const_rwlock(None);

#[derive(Debug, Clone, Copy, PartialEq)]
struct ListenerState {
    volume: f32,
    position: [f32; 3],
    direction: [f32; 3],
    up: [f32; 3],
}

impl Default for ListenerState {
    fn default() -> Self {
        Self {
            volume: 100.0,
            position: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

/// Shared audio backend and listener. Cloning is cheap and clones share
/// the listener state.
#[derive(Clone)]
pub struct AudioDevice {
    backend: Arc<dyn AudioBackend>,
    listener: Arc<Mutex<ListenerState>>,
}

impl fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDevice")
            .field("listener", &*self.listener.lock())
            .finish_non_exhaustive()
    }
}

impl AudioDevice {
    /// Wrap `backend` and push the default listener parameters to it.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Result<Self> {
        let state = ListenerState::default();
        backend.set_listener_param(ListenerParam::Gain(state.volume * 0.01))?;
        backend.set_listener_param(ListenerParam::Position(state.position))?;
        backend.set_listener_param(ListenerParam::Orientation {
            at: state.direction,
            up: state.up,
        })?;

        Ok(Self {
            backend,
            listener: Arc::new(Mutex::new(state)),
        })
    }

    pub fn backend(&self) -> Arc<dyn AudioBackend> {
        Arc::clone(&self.backend)
    }

    /// Master volume in `[0, 100]`.
    pub fn set_global_volume(&self, volume: f32) -> Result<()> {
        let mut listener = self.listener.lock();
        self.backend
            .set_listener_param(ListenerParam::Gain(volume * 0.01))?;
        listener.volume = volume;
        Ok(())
    }

    pub fn global_volume(&self) -> f32 {
        self.listener.lock().volume
    }

    pub fn set_listener_position(&self, x: f32, y: f32, z: f32) -> Result<()> {
        let mut listener = self.listener.lock();
        self.backend
            .set_listener_param(ListenerParam::Position([x, y, z]))?;
        listener.position = [x, y, z];
        Ok(())
    }

    pub fn listener_position(&self) -> [f32; 3] {
        self.listener.lock().position
    }

    /// Facing direction of the listener; need not be normalized.
    pub fn set_listener_direction(&self, x: f32, y: f32, z: f32) -> Result<()> {
        let mut listener = self.listener.lock();
        self.backend.set_listener_param(ListenerParam::Orientation {
            at: [x, y, z],
            up: listener.up,
        })?;
        listener.direction = [x, y, z];
        Ok(())
    }

    pub fn listener_direction(&self) -> [f32; 3] {
        self.listener.lock().direction
    }

    pub fn set_listener_up_vector(&self, x: f32, y: f32, z: f32) -> Result<()> {
        let mut listener = self.listener.lock();
        self.backend.set_listener_param(ListenerParam::Orientation {
            at: listener.direction,
            up: [x, y, z],
        })?;
        listener.up = [x, y, z];
        Ok(())
    }

    pub fn listener_up_vector(&self) -> [f32; 3] {
        self.listener.lock().up
    }
}

/// Install the process-wide device.
///
/// # Errors
///
/// [`PlaybackError::DeviceAlreadyInitialized`] unless [`shutdown`] was
/// called since the last `init`.
pub fn init(backend: Arc<dyn AudioBackend>) -> Result<AudioDevice> {
    let mut slot = DEVICE.write();
    if slot.is_some() {
        return Err(PlaybackError::DeviceAlreadyInitialized);
    }
    let device = AudioDevice::new(backend)?;
    *slot = Some(device.clone());
    info!("audio device initialized");
    Ok(device)
}

/// The process-wide device.
pub fn current() -> Result<AudioDevice> {
    DEVICE
        .read()
        .clone()
        .ok_or(PlaybackError::DeviceNotInitialized)
}

/// Drop the process-wide device. Sounds created from it keep their own
/// handle to the backend.
pub fn shutdown() {
    if DEVICE.write().take().is_some() {
        debug!("audio device shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SoftwareBackend;

    #[test]
    fn test_defaults_applied_on_creation() {
        let backend = Arc::new(SoftwareBackend::new());
        let device = AudioDevice::new(backend.clone()).unwrap();

        assert_eq!(device.global_volume(), 100.0);
        assert_eq!(device.listener_direction(), [0.0, 0.0, -1.0]);
        assert_eq!(device.listener_up_vector(), [0.0, 1.0, 0.0]);

        let listener = backend.listener();
        assert_eq!(listener.gain, 1.0);
        assert_eq!(listener.at, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_orientation_resent_with_both_vectors() {
        let backend = Arc::new(SoftwareBackend::new());
        let device = AudioDevice::new(backend.clone()).unwrap();

        device.set_listener_direction(1.0, 0.0, 0.0).unwrap();
        device.set_listener_up_vector(0.0, 0.0, 1.0).unwrap();
        device.set_global_volume(25.0).unwrap();

        let listener = backend.listener();
        assert_eq!(listener.at, [1.0, 0.0, 0.0]);
        assert_eq!(listener.up, [0.0, 0.0, 1.0]);
        assert_eq!(listener.gain, 0.25);
    }

    #[test]
    fn test_clones_share_listener() {
        let device = AudioDevice::new(Arc::new(SoftwareBackend::new())).unwrap();
        let other = device.clone();
        other.set_listener_position(1.0, 2.0, 3.0).unwrap();
        assert_eq!(device.listener_position(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_global_lifecycle() {
        shutdown();
        assert!(matches!(current(), Err(PlaybackError::DeviceNotInitialized)));

        init(Arc::new(SoftwareBackend::new())).unwrap();
        assert!(current().is_ok());
        assert!(matches!(
            init(Arc::new(SoftwareBackend::new())),
            Err(PlaybackError::DeviceAlreadyInitialized)
        ));

        shutdown();
        assert!(current().is_err());
    }
}
