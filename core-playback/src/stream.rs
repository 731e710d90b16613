//! # Streaming Engine
//!
//! [`SoundStream`] keeps a [`StreamSource`] playing gaplessly through a small
//! ring of backend buffers.
//!
//! ## Architecture
//!
//! ```text
//! caller thread                       "sound-stream" thread
//! ─────────────                       ─────────────────────
//! play()  ──launch──────────────────▶ allocate ring, fill every slot
//! pause()                             play voice (pause if launched paused)
//! status()      ◀── StreamControl ──▶ loop:
//! playing_offset()    (one mutex)       recycle processed buffers
//! set_playing_offset()                  refill from the source
//! stop()  ──streaming=false──────────▶  re-play on underrun
//!         ◀──────────done signal───── cleanup: stop, unqueue, delete ring
//! ```
//!
//! ## Concurrency
//!
//! `state`, `streaming` and `seek_offset` live in one [`Mutex`] shared by
//! the control calls and the loop. The loop is the only code that touches
//! the ring; control calls that reposition or restart the stream first halt
//! the running loop, blocking until it has released every backend buffer
//! and signalled completion on a one-shot channel.
//!
//! Calls that start or halt a loop (`play`, `stop`, `set_playing_offset`,
//! `close`) hold a separate lifecycle lock for their whole duration, so at
//! most one loop runs per stream even when several threads drive it.
//!
//! ## Position Accounting
//!
//! The backend only knows the position inside the buffers still queued on
//! the voice. Every buffer the loop unqueues adds its sample count to
//! `seek_offset` under the control lock, and [`SoundStream::playing_offset`]
//! reads the backend offset under the same lock, so the reported position
//! never runs backwards while a stream plays.

use crate::config::{StreamingConfig, StreamingStats};
use crate::device::AudioDevice;
use crate::error::{PlaybackError, Result};
use crate::ring::BufferRing;
use crate::source::{PlayStatus, SoundSource};
use crate::traits::{StreamInfo, StreamSource};
use bridge_traits::playback::{SampleFormat, VoiceState};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// How a run of the background loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// `stop()` cleared `streaming`.
    Stopped,
    /// The source ran dry and the voice drained its queue.
    EndOfStream,
    /// The backend or the ring reported an error.
    Failed,
}

/// Lock-protected state shared between control calls and the loop.
#[derive(Debug, Default)]
struct StreamControl {
    state: PlayStatus,
    streaming: bool,
    /// Samples (all channels) consumed by the backend since the last seek or stop.
    seek_offset: u64,
    /// The last loop reached the end of the source; the next `play` rewinds.
    finished: bool,
    /// Completion signal of the running loop.
    done: Option<Receiver<()>>,
}

struct StreamShared {
    source: SoundSource,
    info: StreamInfo,
    format: SampleFormat,
    config: StreamingConfig,
    feeder: Mutex<Box<dyn StreamSource>>,
    /// Held across halt and relaunch; never taken by the loop.
    lifecycle: Mutex<()>,
    control: Mutex<StreamControl>,
    stats: Mutex<StreamingStats>,
}

/// A continuously streamed sound.
///
/// The stream owns one backend voice for its whole life; the buffer ring
/// exists only while a background loop runs. Spatial parameters are set
/// through [`SoundSource`], which the stream dereferences to.
///
/// # Example
///
/// ```ignore
/// use core_playback::{SoundStream, StreamInfo};
///
/// let stream = SoundStream::new(&device, MySynth::default(), StreamInfo::new(88_200, 2, 44_100))?;
/// stream.set_volume(60.0)?;
/// stream.play()?;
/// ```
pub struct SoundStream {
    shared: Arc<StreamShared>,
}

impl SoundStream {
    /// Create a stream with the default [`StreamingConfig`].
    pub fn new(
        device: &AudioDevice,
        source: impl StreamSource + 'static,
        info: StreamInfo,
    ) -> Result<Self> {
        Self::with_config(device, Box::new(source), info, StreamingConfig::default())
    }

    /// Create a stream over an already boxed source.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidConfig`] if `config` fails validation
    /// - [`PlaybackError::UnsupportedChannelCount`] if the backend has no PCM
    ///   layout for `info.channel_count`
    /// - [`PlaybackError::InvalidFormat`] for a zero sample rate
    pub fn with_config(
        device: &AudioDevice,
        source: Box<dyn StreamSource>,
        info: StreamInfo,
        config: StreamingConfig,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let format = SampleFormat::from_channel_count(info.channel_count)
            .ok_or(PlaybackError::UnsupportedChannelCount(info.channel_count))?;
        if info.sample_rate == 0 {
            return Err(PlaybackError::InvalidFormat(
                "sample rate must be non-zero".to_string(),
            ));
        }

        let voice = SoundSource::new(device.backend())?;
        debug!(%info, voice = %voice.voice(), "created sound stream");

        Ok(Self {
            shared: Arc::new(StreamShared {
                source: voice,
                info,
                format,
                config,
                feeder: Mutex::new(source),
                lifecycle: Mutex::new(()),
                control: Mutex::new(StreamControl::default()),
                stats: Mutex::new(StreamingStats::default()),
            }),
        })
    }

    /// Start or resume playback.
    ///
    /// - running and paused: the voice resumes in place
    /// - running and playing: the loop is torn down and restarted at the
    ///   current position
    /// - otherwise a new loop starts; after a natural end of stream the
    ///   source is rewound first
    pub fn play(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock();
        let finished = {
            let mut control = self.shared.control.lock();
            if control.streaming {
                let state = control.state;
                match state {
                    PlayStatus::Paused => {
                        control.state = PlayStatus::Playing;
                        self.shared.source.backend().play(self.shared.source.voice())?;
                        debug!("resumed stream");
                        return Ok(());
                    }
                    PlayStatus::Playing => {
                        drop(control);
                        let offset = self.playing_offset();
                        debug!(?offset, "restarting stream");
                        self.halt();
                        return self.restart_at(offset, PlayStatus::Playing);
                    }
                    PlayStatus::Stopped => {}
                }
            }
            control.finished
        };

        if finished {
            self.halt();
        }
        self.launch(PlayStatus::Playing)
    }

    /// Pause the voice. The loop keeps refilling in the background.
    pub fn pause(&self) -> Result<()> {
        let mut control = self.shared.control.lock();
        if !control.streaming {
            return Ok(());
        }
        control.state = PlayStatus::Paused;
        self.shared
            .source
            .backend()
            .pause(self.shared.source.voice())?;
        debug!("paused stream");
        Ok(())
    }

    /// Stop playback and rewind to the start.
    ///
    /// Blocks until the background loop has released its buffers. Calling it
    /// on a stopped stream only rewinds.
    pub fn stop(&self) {
        let _lifecycle = self.shared.lifecycle.lock();
        self.halt();
    }

    /// Stop the loop and rewind. Callers hold the lifecycle lock.
    fn halt(&self) {
        let done = {
            let mut control = self.shared.control.lock();
            control.streaming = false;
            control.done.take()
        };

        if let Some(done) = done {
            trace!("waiting for stream loop");
            // A disconnect means the loop exited without signalling
            let _ = done.recv();
        }

        {
            let mut control = self.shared.control.lock();
            control.state = PlayStatus::Stopped;
            control.seek_offset = 0;
            control.finished = false;
        }
        self.shared.feeder.lock().seek(Duration::ZERO);
    }

    /// Current status, corrected for the delay between launching the loop
    /// and the voice actually starting.
    pub fn status(&self) -> PlayStatus {
        let voice_state = match self.shared.source.voice_state() {
            Ok(state) => state,
            Err(e) => {
                debug!("voice state unavailable: {}", e);
                VoiceState::Stopped
            }
        };

        if voice_state.is_stopped() {
            let control = self.shared.control.lock();
            if control.streaming {
                return control.state;
            }
        }
        voice_state.into()
    }

    /// Position of playback from the start of the source.
    pub fn playing_offset(&self) -> Duration {
        let control = self.shared.control.lock();
        let within_queue = self
            .shared
            .source
            .backend()
            .playback_offset(self.shared.source.voice())
            .unwrap_or_else(|e| {
                debug!("playback offset unavailable: {}", e);
                Duration::ZERO
            });
        within_queue + self.shared.info.samples_to_duration(control.seek_offset)
    }

    /// Jump to `offset`, keeping the current playing or paused state.
    ///
    /// Has no effect on a stopped stream. Offsets past the end play nothing
    /// and end the stream.
    pub fn set_playing_offset(&self, offset: Duration) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock();
        let status = self.status();
        if status == PlayStatus::Stopped {
            return Ok(());
        }

        debug!(?offset, ?status, "seeking stream");
        self.halt();
        self.restart_at(offset, status)
    }

    /// Stop the stream and release the source. The stream must not be
    /// played again.
    pub fn close(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock();
        self.halt();
        self.shared.feeder.lock().close()
    }

    pub fn info(&self) -> StreamInfo {
        self.shared.info
    }

    pub fn duration(&self) -> Duration {
        self.shared.info.duration()
    }

    /// Total samples, all channels counted.
    pub fn sample_count(&self) -> u64 {
        self.shared.info.sample_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.info.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.shared.info.channel_count
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.shared.config
    }

    /// Counters accumulated over every loop this stream has run.
    pub fn stats(&self) -> StreamingStats {
        self.shared.stats.lock().clone()
    }

    pub fn source(&self) -> &SoundSource {
        &self.shared.source
    }

    fn restart_at(&self, offset: Duration, state: PlayStatus) -> Result<()> {
        self.shared.feeder.lock().seek(offset);
        {
            let mut control = self.shared.control.lock();
            let info = self.shared.info;
            let mut samples = info.duration_to_samples(offset);
            if info.sample_count > 0 {
                samples = samples.min(info.sample_count);
            }
            control.seek_offset = samples;
        }
        self.launch(state)
    }

    fn launch(&self, initial: PlayStatus) -> Result<()> {
        let (done_tx, done_rx) = bounded(1);
        {
            let mut control = self.shared.control.lock();
            control.streaming = true;
            control.state = initial;
            control.finished = false;
            control.done = Some(done_rx);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("sound-stream".to_string())
            .spawn(move || {
                shared.stream_data();
                drop(shared);
                let _ = done_tx.send(());
            });

        if let Err(e) = spawned {
            let mut control = self.shared.control.lock();
            control.streaming = false;
            control.state = PlayStatus::Stopped;
            control.done = None;
            return Err(PlaybackError::Internal(format!(
                "failed to spawn stream thread: {e}"
            )));
        }
        Ok(())
    }
}

impl Deref for SoundStream {
    type Target = SoundSource;

    fn deref(&self) -> &SoundSource {
        &self.shared.source
    }
}

impl Drop for SoundStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl StreamShared {
    /// Body of the background thread.
    fn stream_data(&self) {
        {
            let control = self.control.lock();
            // stop() may have run before this thread was scheduled
            if control.state == PlayStatus::Stopped || !control.streaming {
                return;
            }
        }
        self.stats.lock().loops_started += 1;

        let backend = Arc::clone(self.source.backend());
        let mut ring = match BufferRing::allocate(backend, self.config.buffer_count) {
            Ok(ring) => ring,
            Err(e) => {
                error!("Failed to allocate stream buffers: {}", e);
                self.finish(LoopExit::Failed);
                return;
            }
        };

        let exit = match self.pump(&mut ring) {
            Ok(exit) => exit,
            Err(e) => {
                error!("Stream loop aborted: {}", e);
                LoopExit::Failed
            }
        };
        self.cleanup(&mut ring, exit);
        info!(?exit, "stream loop finished");
    }

    /// Fill the ring, start the voice, then keep it fed until told to stop or
    /// the source runs dry.
    fn pump(&self, ring: &mut BufferRing) -> Result<LoopExit> {
        let backend = self.source.backend();
        let voice = self.source.voice();
        let mut want_stop = false;

        for index in 0..ring.len() {
            if !self.fill_slot(ring, index)? {
                want_stop = true;
                break;
            }
        }

        {
            let control = self.control.lock();
            backend.play(voice)?;
            if control.state == PlayStatus::Paused {
                backend.pause(voice)?;
            }
        }
        debug!(queued = ring.queued_count(), want_stop, "stream started");

        loop {
            if !self.control.lock().streaming {
                return Ok(LoopExit::Stopped);
            }

            let voice_state = backend.voice_state(voice)?;
            if voice_state.is_stopped() && want_stop {
                return Ok(LoopExit::EndOfStream);
            }

            let processed = backend.processed_buffers(voice)?;
            for _ in 0..processed {
                let index = self.recycle_one(ring)?;
                if !want_stop && !self.fill_slot(ring, index)? {
                    debug!(
                        pending = ring.pending_refill_count(),
                        "source exhausted, draining queue"
                    );
                    want_stop = true;
                }
            }

            let voice_state = if voice_state.is_stopped() {
                self.recover_underrun(want_stop)?
            } else {
                voice_state
            };

            // A drained, stopped voice ends the loop on the next pass
            if !(want_stop && voice_state.is_stopped()) {
                thread::sleep(self.config.poll_interval);
            }
        }
    }

    /// Unqueue the oldest processed buffer and account for its samples.
    fn recycle_one(&self, ring: &mut BufferRing) -> Result<usize> {
        let backend = self.source.backend();
        let voice = self.source.voice();

        let mut control = self.control.lock();
        let handle = backend
            .unqueue_buffers(voice, 1)?
            .first()
            .copied()
            .ok_or_else(|| PlaybackError::Internal("backend unqueued no buffer".to_string()))?;
        let samples = backend.buffer_info(handle)?.sample_count() as u64;
        let (index, _) = ring.reclaim(handle)?;

        control.seek_offset += samples;
        self.stats.lock().samples_consumed += samples;
        trace!(index, samples, seek_offset = control.seek_offset, "recycled buffer");
        Ok(index)
    }

    /// Re-play a voice that starved while there is still audio queued.
    fn recover_underrun(&self, want_stop: bool) -> Result<VoiceState> {
        let backend = self.source.backend();
        let voice = self.source.voice();

        let control = self.control.lock();
        if want_stop || control.state != PlayStatus::Playing {
            return Ok(backend.voice_state(voice)?);
        }
        if backend.queued_buffers(voice)? == 0 {
            return Ok(VoiceState::Stopped);
        }

        backend.play(voice)?;
        let mut stats = self.stats.lock();
        stats.underrun_count += 1;
        warn!(underruns = stats.underrun_count, "stream underrun, restarting voice");
        Ok(backend.voice_state(voice)?)
    }

    /// Pull one chunk into ring slot `index`. Returns `false` once the source
    /// stays empty through every retry.
    fn fill_slot(&self, ring: &mut BufferRing, index: usize) -> Result<bool> {
        let voice = self.source.voice();
        let mut feeder = self.feeder.lock();

        for attempt in 0..=self.config.read_retries {
            let data = feeder.get_data();
            if data.is_empty() {
                self.stats.lock().empty_reads += 1;
                trace!(attempt, "source returned no data");
                continue;
            }

            ring.submit(index, voice, self.format, data, self.info.sample_rate)?;
            let mut stats = self.stats.lock();
            stats.buffers_submitted += 1;
            stats.samples_submitted += data.len() as u64;
            return Ok(true);
        }
        Ok(false)
    }

    /// Release everything the loop acquired. Runs on every exit path.
    fn cleanup(&self, ring: &mut BufferRing, exit: LoopExit) {
        let backend = self.source.backend();
        let voice = self.source.voice();
        let mut control = self.control.lock();

        if let Err(e) = backend.stop(voice) {
            warn!("Failed to stop voice: {}", e);
        }

        let drained = backend
            .queued_buffers(voice)
            .and_then(|queued| backend.unqueue_buffers(voice, queued));
        match drained {
            Ok(handles) => {
                for handle in handles {
                    match ring.reclaim(handle) {
                        // Whatever was still queued at a natural end has been heard
                        Ok((_, samples)) if exit == LoopExit::EndOfStream => {
                            control.seek_offset += samples as u64;
                            self.stats.lock().samples_consumed += samples as u64;
                        }
                        Ok(_) => {}
                        Err(e) => warn!("{}", e),
                    }
                }
            }
            Err(e) => warn!("Failed to clear voice queue: {}", e),
        }

        if self.info.sample_count > 0 {
            control.seek_offset = control.seek_offset.min(self.info.sample_count);
        }

        if let Err(e) = backend.attach_buffer(voice, None) {
            warn!("Failed to detach stream buffers: {}", e);
        }
        if let Err(e) = ring.release() {
            warn!("Failed to delete stream buffers: {}", e);
        }

        Self::settle(&mut control, exit);
    }

    fn finish(&self, exit: LoopExit) {
        Self::settle(&mut self.control.lock(), exit);
    }

    fn settle(control: &mut StreamControl, exit: LoopExit) {
        control.streaming = false;
        match exit {
            LoopExit::Stopped => {}
            LoopExit::EndOfStream => {
                control.state = PlayStatus::Stopped;
                control.finished = true;
            }
            LoopExit::Failed => control.state = PlayStatus::Stopped,
        }
    }
}
