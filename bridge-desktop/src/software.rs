//! Software audio device.
//!
//! [`SoftwareBackend`] implements the full [`AudioBackend`] object model in
//! memory. Voices do not produce sound; they consume their queued buffers
//! against the wall clock (scaled by pitch and by the backend's time scale),
//! which is enough to drive the streaming engine exactly the way a hardware
//! device would: buffers become processed as time passes, a voice starves
//! when nothing is left to play, and offsets track the consumed audio.
//!
//! Voice positions are advanced lazily, on every call that touches a voice.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::playback::{
    AudioBackend, BufferHandle, BufferInfo, ListenerParam, SampleFormat, VoiceHandle, VoiceParam,
    VoiceState,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Snapshot of a voice, for inspection and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSnapshot {
    pub state: VoiceState,
    pub queued: usize,
    pub processed: usize,
    pub pitch: f32,
    pub gain: f32,
    pub position: [f32; 3],
    pub relative_to_listener: bool,
    pub reference_distance: f32,
    pub rolloff: f32,
}

/// Current listener parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerSnapshot {
    pub gain: f32,
    pub position: [f32; 3],
    pub at: [f32; 3],
    pub up: [f32; 3],
}

impl Default for ListenerSnapshot {
    fn default() -> Self {
        Self {
            gain: 1.0,
            position: [0.0, 0.0, 0.0],
            at: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Default)]
struct StoredBuffer {
    samples: Vec<i16>,
    format: Option<SampleFormat>,
    sample_rate: u32,
    /// Number of voice queues currently holding this buffer.
    users: usize,
}

impl StoredBuffer {
    fn info(&self) -> BufferInfo {
        BufferInfo {
            size_bytes: self.samples.len() * 2,
            bits: 16,
            channels: self.format.map(SampleFormat::channel_count).unwrap_or(0),
            sample_rate: self.sample_rate,
        }
    }

    /// Length in seconds at unit pitch.
    fn seconds(&self) -> f64 {
        self.info().duration().as_secs_f64()
    }
}

#[derive(Debug)]
struct Voice {
    state: VoiceState,
    queue: VecDeque<BufferHandle>,
    processed: usize,
    /// Seconds consumed inside `queue[processed]`.
    cursor: f64,
    /// Offset reads as zero after creation, attach and explicit stop.
    rewound: bool,
    pending_offset: Option<f64>,
    last_tick: Instant,
    pitch: f32,
    gain: f32,
    position: [f32; 3],
    relative_to_listener: bool,
    reference_distance: f32,
    rolloff: f32,
}

impl Voice {
    fn new(now: Instant) -> Self {
        Self {
            state: VoiceState::Initial,
            queue: VecDeque::new(),
            processed: 0,
            cursor: 0.0,
            rewound: true,
            pending_offset: None,
            last_tick: now,
            pitch: 1.0,
            gain: 1.0,
            position: [0.0; 3],
            relative_to_listener: false,
            reference_distance: 1.0,
            rolloff: 1.0,
        }
    }

    fn advance(&mut self, buffers: &HashMap<BufferHandle, StoredBuffer>, now: Instant, scale: f64) {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        if self.state != VoiceState::Playing {
            return;
        }

        let mut budget = elapsed * scale * f64::from(self.pitch);
        while self.processed < self.queue.len() {
            let length = buffers
                .get(&self.queue[self.processed])
                .map(StoredBuffer::seconds)
                .unwrap_or(0.0);
            let remaining = length - self.cursor;
            if budget < remaining {
                self.cursor += budget;
                return;
            }
            budget -= remaining;
            self.processed += 1;
            self.cursor = 0.0;
        }

        self.state = VoiceState::Stopped;
        trace!(queued = self.queue.len(), "voice drained its queue");
    }

    fn seek(&mut self, buffers: &HashMap<BufferHandle, StoredBuffer>, seconds: f64) {
        self.processed = 0;
        self.cursor = 0.0;
        let mut remaining = seconds.max(0.0);
        while self.processed < self.queue.len() {
            let length = buffers
                .get(&self.queue[self.processed])
                .map(StoredBuffer::seconds)
                .unwrap_or(0.0);
            if remaining < length {
                self.cursor = remaining;
                return;
            }
            remaining -= length;
            self.processed += 1;
        }
    }

    fn offset(&self, buffers: &HashMap<BufferHandle, StoredBuffer>) -> f64 {
        if self.rewound {
            return 0.0;
        }
        let consumed: f64 = self
            .queue
            .iter()
            .take(self.processed)
            .filter_map(|handle| buffers.get(handle))
            .map(StoredBuffer::seconds)
            .sum();
        consumed + self.cursor
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: u32,
    buffers: HashMap<BufferHandle, StoredBuffer>,
    voices: HashMap<VoiceHandle, Voice>,
    listener: ListenerSnapshot,
}

impl DeviceState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn release_queue(buffers: &mut HashMap<BufferHandle, StoredBuffer>, queue: &mut VecDeque<BufferHandle>) {
        for handle in queue.drain(..) {
            if let Some(buffer) = buffers.get_mut(&handle) {
                buffer.users = buffer.users.saturating_sub(1);
            }
        }
    }
}

/// Headless [`AudioBackend`] that plays voices against the wall clock.
///
/// # Example
///
/// ```ignore
/// use bridge_desktop::SoftwareBackend;
/// use std::sync::Arc;
///
/// // Four seconds of audio pass for every real second.
/// let backend = Arc::new(SoftwareBackend::new().with_time_scale(4.0));
/// ```
#[derive(Debug)]
pub struct SoftwareBackend {
    state: Mutex<DeviceState>,
    time_scale: f64,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// Create a device that plays in real time.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            time_scale: 1.0,
        }
    }

    /// Play `scale` seconds of audio per wall-clock second.
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        self
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Number of live buffer objects.
    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of live voices.
    pub fn voice_count(&self) -> usize {
        self.state.lock().voices.len()
    }

    /// Copy of the samples last uploaded into `buffer`.
    pub fn buffer_samples(&self, buffer: BufferHandle) -> Result<Vec<i16>> {
        let state = self.state.lock();
        state
            .buffers
            .get(&buffer)
            .map(|stored| stored.samples.clone())
            .ok_or_else(|| BridgeError::invalid_buffer(buffer.0))
    }

    pub fn voice_snapshot(&self, voice: VoiceHandle) -> Result<VoiceSnapshot> {
        self.with_voice(voice, |voice, _| {
            Ok(VoiceSnapshot {
                state: voice.state,
                queued: voice.queue.len(),
                processed: voice.processed,
                pitch: voice.pitch,
                gain: voice.gain,
                position: voice.position,
                relative_to_listener: voice.relative_to_listener,
                reference_distance: voice.reference_distance,
                rolloff: voice.rolloff,
            })
        })
    }

    pub fn listener(&self) -> ListenerSnapshot {
        self.state.lock().listener
    }

    /// Advance `voice` to now, then run `f` on it.
    fn with_voice<T>(
        &self,
        voice: VoiceHandle,
        f: impl FnOnce(&mut Voice, &mut HashMap<BufferHandle, StoredBuffer>) -> Result<T>,
    ) -> Result<T> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let DeviceState {
            voices, buffers, ..
        } = &mut *guard;
        let entry = voices
            .get_mut(&voice)
            .ok_or_else(|| BridgeError::invalid_voice(voice.0))?;
        entry.advance(buffers, now, self.time_scale);
        f(entry, buffers)
    }
}

impl AudioBackend for SoftwareBackend {
    fn create_buffers(&self, count: usize) -> Result<Vec<BufferHandle>> {
        let mut state = self.state.lock();
        let handles: Vec<BufferHandle> = (0..count).map(|_| BufferHandle(state.next_id())).collect();
        for handle in &handles {
            state.buffers.insert(*handle, StoredBuffer::default());
        }
        trace!(count, "created buffers");
        Ok(handles)
    }

    fn delete_buffers(&self, buffers: &[BufferHandle]) -> Result<()> {
        let mut state = self.state.lock();
        for handle in buffers {
            match state.buffers.get(handle) {
                None => return Err(BridgeError::invalid_buffer(handle.0)),
                Some(stored) if stored.users > 0 => {
                    return Err(BridgeError::InvalidOperation(format!(
                        "{handle} is still queued on a voice"
                    )))
                }
                Some(_) => {}
            }
        }
        for handle in buffers {
            state.buffers.remove(handle);
        }
        Ok(())
    }

    fn buffer_data(
        &self,
        buffer: BufferHandle,
        format: SampleFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<()> {
        if sample_rate == 0 {
            return Err(BridgeError::InvalidOperation(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if samples.len() % format.channel_count() as usize != 0 {
            return Err(BridgeError::InvalidOperation(format!(
                "{} samples do not form whole {:?} frames",
                samples.len(),
                format
            )));
        }

        let mut state = self.state.lock();
        let stored = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BridgeError::invalid_buffer(buffer.0))?;
        if stored.users > 0 {
            return Err(BridgeError::InvalidOperation(format!(
                "{buffer} is queued and cannot be refilled"
            )));
        }

        stored.samples.clear();
        stored.samples.extend_from_slice(samples);
        stored.format = Some(format);
        stored.sample_rate = sample_rate;
        Ok(())
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Result<BufferInfo> {
        let state = self.state.lock();
        state
            .buffers
            .get(&buffer)
            .map(StoredBuffer::info)
            .ok_or_else(|| BridgeError::invalid_buffer(buffer.0))
    }

    fn create_voice(&self) -> Result<VoiceHandle> {
        let mut state = self.state.lock();
        let handle = VoiceHandle(state.next_id());
        state.voices.insert(handle, Voice::new(Instant::now()));
        Ok(handle)
    }

    fn delete_voice(&self, voice: VoiceHandle) -> Result<()> {
        let mut guard = self.state.lock();
        let DeviceState {
            voices, buffers, ..
        } = &mut *guard;
        let mut removed = voices
            .remove(&voice)
            .ok_or_else(|| BridgeError::invalid_voice(voice.0))?;
        DeviceState::release_queue(buffers, &mut removed.queue);
        Ok(())
    }

    fn attach_buffer(&self, voice: VoiceHandle, buffer: Option<BufferHandle>) -> Result<()> {
        self.with_voice(voice, |entry, buffers| {
            if !entry.state.is_stopped() {
                return Err(BridgeError::InvalidOperation(format!(
                    "{voice} must be stopped to change its buffer"
                )));
            }
            if let Some(handle) = buffer {
                if !buffers.contains_key(&handle) {
                    return Err(BridgeError::invalid_buffer(handle.0));
                }
            }

            DeviceState::release_queue(buffers, &mut entry.queue);
            if let Some(handle) = buffer {
                entry.queue.push_back(handle);
                if let Some(stored) = buffers.get_mut(&handle) {
                    stored.users += 1;
                }
            }
            entry.state = VoiceState::Initial;
            entry.processed = 0;
            entry.cursor = 0.0;
            entry.rewound = true;
            Ok(())
        })
    }

    fn queue_buffers(&self, voice: VoiceHandle, handles: &[BufferHandle]) -> Result<()> {
        self.with_voice(voice, |entry, buffers| {
            for handle in handles {
                if !buffers.contains_key(handle) {
                    return Err(BridgeError::invalid_buffer(handle.0));
                }
                if entry.queue.contains(handle) {
                    return Err(BridgeError::InvalidOperation(format!(
                        "{handle} is already queued on {voice}"
                    )));
                }
            }
            for handle in handles {
                entry.queue.push_back(*handle);
                if let Some(stored) = buffers.get_mut(handle) {
                    stored.users += 1;
                }
            }
            Ok(())
        })
    }

    fn unqueue_buffers(&self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>> {
        self.with_voice(voice, |entry, buffers| {
            if count > entry.processed {
                return Err(BridgeError::InvalidOperation(format!(
                    "cannot unqueue {count} buffers, only {} processed",
                    entry.processed
                )));
            }
            let mut removed: VecDeque<BufferHandle> = entry.queue.drain(..count).collect();
            entry.processed -= count;
            let handles = removed.iter().copied().collect();
            DeviceState::release_queue(buffers, &mut removed);
            Ok(handles)
        })
    }

    fn play(&self, voice: VoiceHandle) -> Result<()> {
        self.with_voice(voice, |entry, buffers| {
            match entry.state {
                VoiceState::Playing => {}
                VoiceState::Paused => entry.state = VoiceState::Playing,
                VoiceState::Initial | VoiceState::Stopped => {
                    let start = entry.pending_offset.take().unwrap_or(0.0);
                    entry.seek(buffers, start);
                    entry.rewound = false;
                    entry.state = if entry.processed < entry.queue.len() {
                        VoiceState::Playing
                    } else {
                        VoiceState::Stopped
                    };
                    debug!(%voice, queued = entry.queue.len(), state = ?entry.state, "voice started");
                }
            }
            Ok(())
        })
    }

    fn pause(&self, voice: VoiceHandle) -> Result<()> {
        self.with_voice(voice, |entry, _| {
            if entry.state == VoiceState::Playing {
                entry.state = VoiceState::Paused;
            }
            Ok(())
        })
    }

    fn stop(&self, voice: VoiceHandle) -> Result<()> {
        self.with_voice(voice, |entry, _| {
            entry.state = VoiceState::Stopped;
            entry.processed = entry.queue.len();
            entry.cursor = 0.0;
            entry.rewound = true;
            entry.pending_offset = None;
            Ok(())
        })
    }

    fn voice_state(&self, voice: VoiceHandle) -> Result<VoiceState> {
        self.with_voice(voice, |entry, _| Ok(entry.state))
    }

    fn processed_buffers(&self, voice: VoiceHandle) -> Result<usize> {
        self.with_voice(voice, |entry, _| Ok(entry.processed))
    }

    fn queued_buffers(&self, voice: VoiceHandle) -> Result<usize> {
        self.with_voice(voice, |entry, _| Ok(entry.queue.len()))
    }

    fn playback_offset(&self, voice: VoiceHandle) -> Result<Duration> {
        self.with_voice(voice, |entry, buffers| {
            Ok(Duration::from_secs_f64(entry.offset(buffers)))
        })
    }

    fn set_playback_offset(&self, voice: VoiceHandle, offset: Duration) -> Result<()> {
        self.with_voice(voice, |entry, buffers| {
            let seconds = offset.as_secs_f64();
            if entry.state.is_stopped() {
                entry.pending_offset = Some(seconds);
                return Ok(());
            }
            entry.seek(buffers, seconds);
            if entry.processed >= entry.queue.len() && entry.state == VoiceState::Playing {
                entry.state = VoiceState::Stopped;
            }
            Ok(())
        })
    }

    fn set_voice_param(&self, voice: VoiceHandle, param: VoiceParam) -> Result<()> {
        self.with_voice(voice, |entry, _| {
            match param {
                VoiceParam::Pitch(pitch) if pitch > 0.0 => entry.pitch = pitch,
                VoiceParam::Gain(gain) if gain >= 0.0 => entry.gain = gain,
                VoiceParam::Position(position) => entry.position = position,
                VoiceParam::RelativeToListener(relative) => entry.relative_to_listener = relative,
                VoiceParam::ReferenceDistance(distance) if distance >= 0.0 => {
                    entry.reference_distance = distance
                }
                VoiceParam::Rolloff(rolloff) if rolloff >= 0.0 => entry.rolloff = rolloff,
                other => {
                    return Err(BridgeError::InvalidOperation(format!(
                        "value out of range: {other:?}"
                    )))
                }
            }
            Ok(())
        })
    }

    fn set_listener_param(&self, param: ListenerParam) -> Result<()> {
        let mut state = self.state.lock();
        match param {
            ListenerParam::Gain(gain) if gain >= 0.0 => state.listener.gain = gain,
            ListenerParam::Gain(gain) => {
                return Err(BridgeError::InvalidOperation(format!(
                    "listener gain out of range: {gain}"
                )))
            }
            ListenerParam::Position(position) => state.listener.position = position,
            ListenerParam::Orientation { at, up } => {
                state.listener.at = at;
                state.listener.up = up;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const RATE: u32 = 1_000;

    /// One buffer of `millis` ms of mono audio.
    fn filled_buffer(backend: &SoftwareBackend, millis: usize) -> BufferHandle {
        let handle = backend.create_buffers(1).unwrap()[0];
        let samples = vec![0i16; RATE as usize * millis / 1000];
        backend
            .buffer_data(handle, SampleFormat::Mono16, &samples, RATE)
            .unwrap();
        handle
    }

    #[test]
    fn test_buffer_info_reports_upload() {
        let backend = SoftwareBackend::new();
        let handle = backend.create_buffers(1).unwrap()[0];
        backend
            .buffer_data(handle, SampleFormat::Stereo16, &[0; 8], 44_100)
            .unwrap();

        let info = backend.buffer_info(handle).unwrap();
        assert_eq!(info.size_bytes, 16);
        assert_eq!(info.bits, 16);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_count(), 8);
    }

    #[test]
    fn test_buffer_data_rejects_partial_frames() {
        let backend = SoftwareBackend::new();
        let handle = backend.create_buffers(1).unwrap()[0];
        let result = backend.buffer_data(handle, SampleFormat::Stereo16, &[0; 3], 44_100);
        assert!(matches!(result, Err(BridgeError::InvalidOperation(_))));
    }

    #[test]
    fn test_queued_buffer_cannot_be_refilled_or_deleted() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 100);
        backend.queue_buffers(voice, &[handle]).unwrap();

        assert!(backend
            .buffer_data(handle, SampleFormat::Mono16, &[0; 10], RATE)
            .is_err());
        assert!(backend.delete_buffers(&[handle]).is_err());
        assert!(backend.queue_buffers(voice, &[handle]).is_err());
    }

    #[test]
    fn test_voice_consumes_queue_in_real_time() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let first = filled_buffer(&backend, 100);
        let second = filled_buffer(&backend, 100);
        backend.queue_buffers(voice, &[first, second]).unwrap();
        backend.play(voice).unwrap();

        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Playing);
        assert_eq!(backend.processed_buffers(voice).unwrap(), 0);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(backend.processed_buffers(voice).unwrap(), 1);
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Playing);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(backend.processed_buffers(voice).unwrap(), 2);
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Stopped);

        // Starved voices keep their position at the end of the queue.
        let offset = backend.playback_offset(voice).unwrap();
        assert!((offset.as_secs_f64() - 0.2).abs() < 1e-6);

        let removed = backend.unqueue_buffers(voice, 2).unwrap();
        assert_eq!(removed, vec![first, second]);
        assert_eq!(backend.queued_buffers(voice).unwrap(), 0);
    }

    #[test]
    fn test_unqueue_requires_processed_buffers() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 500);
        backend.queue_buffers(voice, &[handle]).unwrap();
        backend.play(voice).unwrap();

        assert!(matches!(
            backend.unqueue_buffers(voice, 1),
            Err(BridgeError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_pause_freezes_offset() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 1000);
        backend.queue_buffers(voice, &[handle]).unwrap();
        backend.play(voice).unwrap();

        thread::sleep(Duration::from_millis(30));
        backend.pause(voice).unwrap();
        let paused_at = backend.playback_offset(voice).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(backend.playback_offset(voice).unwrap(), paused_at);
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Paused);

        backend.play(voice).unwrap();
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Playing);
        assert!(backend.playback_offset(voice).unwrap() >= paused_at);
    }

    #[test]
    fn test_stop_marks_everything_processed() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let first = filled_buffer(&backend, 500);
        let second = filled_buffer(&backend, 500);
        backend.queue_buffers(voice, &[first, second]).unwrap();
        backend.play(voice).unwrap();
        backend.stop(voice).unwrap();

        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Stopped);
        assert_eq!(backend.processed_buffers(voice).unwrap(), 2);
        assert_eq!(backend.playback_offset(voice).unwrap(), Duration::ZERO);

        backend.unqueue_buffers(voice, 2).unwrap();
        backend.delete_buffers(&[first, second]).unwrap();
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn test_play_on_empty_queue_stays_stopped() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        backend.play(voice).unwrap();
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Stopped);
    }

    #[test]
    fn test_time_scale_and_pitch_speed_up_consumption() {
        let backend = SoftwareBackend::new().with_time_scale(5.0);
        let voice = backend.create_voice().unwrap();
        backend.set_voice_param(voice, VoiceParam::Pitch(2.0)).unwrap();
        let handle = filled_buffer(&backend, 1000);
        backend.queue_buffers(voice, &[handle]).unwrap();
        backend.play(voice).unwrap();

        thread::sleep(Duration::from_millis(120));
        assert_eq!(backend.voice_state(voice).unwrap(), VoiceState::Stopped);
    }

    #[test]
    fn test_static_buffer_offset() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 1000);
        backend.attach_buffer(voice, Some(handle)).unwrap();

        backend
            .set_playback_offset(voice, Duration::from_millis(400))
            .unwrap();
        backend.play(voice).unwrap();
        let offset = backend.playback_offset(voice).unwrap();
        assert!(offset >= Duration::from_millis(400));
        assert!(offset < Duration::from_millis(500));

        backend.stop(voice).unwrap();
        backend.attach_buffer(voice, None).unwrap();
        backend.delete_buffers(&[handle]).unwrap();
    }

    #[test]
    fn test_attach_requires_stopped_voice() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 1000);
        backend.attach_buffer(voice, Some(handle)).unwrap();
        backend.play(voice).unwrap();

        assert!(backend.attach_buffer(voice, None).is_err());
    }

    #[test]
    fn test_voice_params_are_validated() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();

        backend.set_voice_param(voice, VoiceParam::Gain(0.5)).unwrap();
        backend
            .set_voice_param(voice, VoiceParam::Position([1.0, 2.0, 3.0]))
            .unwrap();
        assert!(backend.set_voice_param(voice, VoiceParam::Pitch(0.0)).is_err());
        assert!(backend
            .set_voice_param(voice, VoiceParam::ReferenceDistance(-1.0))
            .is_err());

        let snapshot = backend.voice_snapshot(voice).unwrap();
        assert_eq!(snapshot.gain, 0.5);
        assert_eq!(snapshot.position, [1.0, 2.0, 3.0]);
        assert_eq!(snapshot.pitch, 1.0);
    }

    #[test]
    fn test_listener_params() {
        let backend = SoftwareBackend::new();
        assert_eq!(backend.listener(), ListenerSnapshot::default());

        backend.set_listener_param(ListenerParam::Gain(0.25)).unwrap();
        backend
            .set_listener_param(ListenerParam::Orientation {
                at: [1.0, 0.0, 0.0],
                up: [0.0, 0.0, 1.0],
            })
            .unwrap();

        let listener = backend.listener();
        assert_eq!(listener.gain, 0.25);
        assert_eq!(listener.at, [1.0, 0.0, 0.0]);
        assert_eq!(listener.up, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_invalid_handles() {
        let backend = SoftwareBackend::new();
        assert!(matches!(
            backend.play(VoiceHandle(42)),
            Err(BridgeError::InvalidHandle { kind: "voice", id: 42 })
        ));
        assert!(matches!(
            backend.buffer_info(BufferHandle(7)),
            Err(BridgeError::InvalidHandle { kind: "buffer", id: 7 })
        ));
    }

    #[test]
    fn test_delete_voice_releases_queue() {
        let backend = SoftwareBackend::new();
        let voice = backend.create_voice().unwrap();
        let handle = filled_buffer(&backend, 100);
        backend.queue_buffers(voice, &[handle]).unwrap();

        backend.delete_voice(voice).unwrap();
        assert_eq!(backend.voice_count(), 0);
        backend.delete_buffers(&[handle]).unwrap();
    }
}
