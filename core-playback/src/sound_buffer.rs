//! Fully decoded audio held in a single backend buffer.

use crate::device::AudioDevice;
use crate::error::{PlaybackError, Result};
use crate::registry::DecoderRegistry;
use crate::traits::{SeekableSource, StreamInfo};
use bridge_traits::playback::{AudioBackend, BufferHandle, SampleFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Read granularity while decoding a whole file.
const LOAD_CHUNK_SAMPLES: usize = 16 * 1024;

/// Decoded samples plus the backend buffer they were uploaded to.
///
/// Share it between sounds with an `Arc`; the backend buffer is deleted when
/// the last reference goes away.
pub struct SoundBuffer {
    backend: Arc<dyn AudioBackend>,
    handle: BufferHandle,
    samples: Vec<i16>,
    info: StreamInfo,
}

impl SoundBuffer {
    /// Decode `source` with the process-wide registry.
    pub fn load(device: &AudioDevice, source: impl SeekableSource + 'static) -> Result<Self> {
        Self::load_with(device, DecoderRegistry::global(), Box::new(source))
    }

    pub fn load_file(device: &AudioDevice, path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(device, BufReader::new(file))
    }

    /// Decode `source` completely and upload it.
    ///
    /// # Errors
    ///
    /// Format errors from detection and opening, decoding errors,
    /// [`PlaybackError::EmptyBuffer`] when the source holds no samples.
    #[instrument(skip_all)]
    pub fn load_with(
        device: &AudioDevice,
        registry: &DecoderRegistry,
        mut source: Box<dyn SeekableSource>,
    ) -> Result<Self> {
        let mut decoder = registry.detect(&mut *source)?;
        let opened = decoder.open(source)?;

        let mut samples = Vec::with_capacity(opened.sample_count as usize);
        let mut chunk = vec![0i16; LOAD_CHUNK_SAMPLES];
        loop {
            let outcome = decoder.read(&mut chunk)?;
            samples.extend_from_slice(&chunk[..outcome.count()]);
            if outcome.is_end_of_stream() {
                break;
            }
        }
        if let Err(e) = decoder.close() {
            warn!("Failed to close decoder: {}", e);
        }

        // Trust what was decoded over the header
        let info = StreamInfo::new(samples.len() as u64, opened.channel_count, opened.sample_rate);
        Self::from_samples(device, samples, info)
    }

    /// Upload already decoded interleaved samples.
    pub fn from_samples(device: &AudioDevice, samples: Vec<i16>, info: StreamInfo) -> Result<Self> {
        if samples.is_empty() {
            return Err(PlaybackError::EmptyBuffer);
        }
        let format = SampleFormat::from_channel_count(info.channel_count)
            .ok_or(PlaybackError::UnsupportedChannelCount(info.channel_count))?;

        let backend = device.backend();
        let handle = backend
            .create_buffers(1)?
            .first()
            .copied()
            .ok_or_else(|| PlaybackError::Internal("backend created no buffer".to_string()))?;

        if let Err(e) = backend.buffer_data(handle, format, &samples, info.sample_rate) {
            let _ = backend.delete_buffers(&[handle]);
            return Err(e.into());
        }
        debug!(%info, buffer = %handle, "loaded sound buffer");

        Ok(Self {
            backend,
            handle,
            samples,
            info,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    pub fn sample_count(&self) -> u64 {
        self.info.sample_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.info.channel_count
    }

    pub fn duration(&self) -> Duration {
        self.info.duration()
    }
}

impl Drop for SoundBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.backend.delete_buffers(&[self.handle]) {
            warn!(buffer = %self.handle, "Failed to delete sound buffer: {}", e);
        }
    }
}
