//! # Music
//!
//! Streamed playback of an encoded file.
//!
//! [`Music`] picks a decoder from the registry, opens it, and drives a
//! [`SoundStream`] through a [`DecoderFeed`], the [`StreamSource`] adapter
//! that decodes one chunk at a time into a fixed scratch buffer.

use crate::config::StreamingConfig;
use crate::device::AudioDevice;
use crate::error::{PlaybackError, Result};
use crate::registry::DecoderRegistry;
use crate::stream::SoundStream;
use crate::traits::{AudioDecoder, SeekableSource, StreamInfo, StreamSource};
use bridge_traits::playback::SampleFormat;
use std::fs::File;
use std::io::BufReader;
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// [`StreamSource`] over an opened decoder.
pub struct DecoderFeed {
    decoder: Box<dyn AudioDecoder>,
    info: StreamInfo,
    scratch: Vec<i16>,
}

impl DecoderFeed {
    /// Wrap an opened decoder with a scratch buffer of `chunk_samples`.
    pub fn new(decoder: Box<dyn AudioDecoder>, chunk_samples: usize) -> Self {
        let info = decoder.info();
        Self {
            decoder,
            info,
            scratch: vec![0; chunk_samples.max(1)],
        }
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }
}

impl StreamSource for DecoderFeed {
    fn get_data(&mut self) -> &[i16] {
        match self.decoder.read(&mut self.scratch) {
            Ok(outcome) => &self.scratch[..outcome.count()],
            Err(e) => {
                warn!("Decoder read failed: {}", e);
                &[]
            }
        }
    }

    fn seek(&mut self, offset: Duration) {
        let sample_offset = self.info.duration_to_samples(offset);
        if let Err(e) = self.decoder.seek(sample_offset) {
            debug!(?offset, "seek ignored: {}", e);
        }
    }

    fn close(&mut self) -> Result<()> {
        self.decoder.close()
    }
}

/// A streamed music track.
///
/// Dereferences to [`SoundStream`] for playback control and to
/// [`SoundSource`](crate::SoundSource) for spatial parameters.
///
/// # Example
///
/// ```ignore
/// use core_playback::{device, Music};
///
/// let music = Music::open_file(&device::current()?, "theme.ogg")?;
/// music.set_volume(80.0)?;
/// music.play()?;
/// ```
pub struct Music {
    stream: SoundStream,
}

impl Music {
    /// Open `source` with the process-wide decoder registry.
    pub fn open(device: &AudioDevice, source: impl SeekableSource + 'static) -> Result<Self> {
        Self::open_with(
            device,
            DecoderRegistry::global(),
            Box::new(source),
            StreamingConfig::default(),
        )
    }

    /// Open a file by path.
    pub fn open_file(device: &AudioDevice, path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(device, BufReader::new(file))
    }

    /// Open `source` with an explicit registry and streaming configuration.
    ///
    /// # Errors
    ///
    /// Only format errors are returned: no decoder matched, the header could
    /// not be parsed, or the channel layout has no backend format.
    #[instrument(skip_all)]
    pub fn open_with(
        device: &AudioDevice,
        registry: &DecoderRegistry,
        mut source: Box<dyn SeekableSource>,
        config: StreamingConfig,
    ) -> Result<Self> {
        let mut decoder = registry.detect(&mut *source)?;
        let info = decoder.open(source)?;

        if SampleFormat::from_channel_count(info.channel_count).is_none() {
            let _ = decoder.close();
            return Err(PlaybackError::UnsupportedChannelCount(info.channel_count));
        }

        let chunk = config.chunk_samples(info.channel_count, info.sample_rate);
        let feed = DecoderFeed::new(decoder, chunk);
        let stream = SoundStream::with_config(device, Box::new(feed), info, config)?;
        info!(%info, "opened music");

        Ok(Self { stream })
    }

    /// Stop playback and close the decoder.
    pub fn close(&self) -> Result<()> {
        self.stream.close()
    }
}

impl Deref for Music {
    type Target = SoundStream;

    fn deref(&self) -> &SoundStream {
        &self.stream
    }
}
