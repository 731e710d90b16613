//! # Symphonia Decoder Implementation
//!
//! Ogg Vorbis and FLAC decoding through Symphonia's demuxers and codecs.
//!
//! The decoder pulls one packet at a time, converts it to interleaved `i16`
//! and serves `read` calls out of that pending packet. Seeking is sample
//! accurate: Symphonia lands on the packet boundary before the target and
//! the surplus is dropped from the next decoded packet.

use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::traits::{AudioDecoder, ReadOutcome, SeekableSource, StreamInfo};
use std::io::{Read, Seek, SeekFrom};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, info, instrument, trace, warn};

const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Adapts a boxed [`SeekableSource`] to Symphonia's [`MediaSource`].
struct SourceAdapter {
    inner: Box<dyn SeekableSource>,
    byte_len: Option<u64>,
}

impl SourceAdapter {
    fn new(mut inner: Box<dyn SeekableSource>) -> Result<Self> {
        let byte_len = inner.seek(SeekFrom::End(0)).ok();
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, byte_len })
    }
}

impl Read for SourceAdapter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SourceAdapter {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl MediaSource for SourceAdapter {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }
}

/// Live decode pipeline, present between `open` and `close`.
struct SymphoniaState {
    /// Demuxer; owns the media source stream
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    converter: SampleConverter,
    /// Interleaved samples of the last decoded packet not yet handed out
    pending: Vec<i16>,
    pending_pos: usize,
    /// Samples to drop from the front of the next packet after a seek
    skip_samples: usize,
    eof: bool,
}

impl SymphoniaState {
    /// Decode the next packet of our track into `pending`.
    ///
    /// Corrupted packets are skipped up to [`MAX_CONSECUTIVE_ERRORS`] in a
    /// row. Returns `Ok(false)` at end of stream.
    #[instrument(skip(self), level = "trace")]
    fn decode_next_packet(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained Ogg streams change the track list mid-file
                    warn!("Track list changed, treating as end of stream");
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many consecutive I/O errors, giving up");
                        return Err(PlaybackError::IoError(e));
                    }
                    continue;
                }
                Err(e) => {
                    error!("Fatal format reader error: {}", e);
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            // Drain metadata revisions read along with the packet
            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let samples = self.converter.convert(decoded);
                    let skip = self.skip_samples.min(samples.len());
                    self.skip_samples -= skip;

                    self.pending.clear();
                    self.pending.extend_from_slice(&samples[skip..]);
                    self.pending_pos = 0;

                    trace!(samples = self.pending.len(), skipped = skip, "decoded packet");
                    return Ok(true);
                }
                Err(SymphoniaError::IoError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (I/O error, attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many consecutive decode errors, stream may be corrupted");
                        return Err(PlaybackError::CorruptedStream(format!(
                            "Stream corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                    continue;
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping packet with decode error (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many consecutive decode errors, codec may be incompatible");
                        return Err(PlaybackError::DecodingError(format!(
                            "Decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    error!("Fatal decode error: {}", e);
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }
}

/// Decoder for the compressed formats handled by Symphonia.
///
/// Built unopened by the registry with a container hint; the hint only
/// speeds up probing, the container is still identified from its content.
pub struct SymphoniaDecoder {
    extension: &'static str,
    state: Option<SymphoniaState>,
    info: StreamInfo,
}

impl SymphoniaDecoder {
    /// Create an unopened decoder hinted with a file extension.
    pub fn with_extension(extension: &'static str) -> Self {
        Self {
            extension,
            state: None,
            info: StreamInfo::default(),
        }
    }

    /// Ogg Vorbis decoder.
    pub fn ogg() -> Self {
        Self::with_extension("ogg")
    }

    /// FLAC decoder.
    pub fn flac() -> Self {
        Self::with_extension("flac")
    }

    fn state_mut(&mut self) -> &mut SymphoniaState {
        self.state
            .as_mut()
            .expect("SymphoniaDecoder used before open")
    }
}

impl AudioDecoder for SymphoniaDecoder {
    #[instrument(skip(self, source), fields(hint = self.extension))]
    fn open(&mut self, source: Box<dyn SeekableSource>) -> Result<StreamInfo> {
        let media_source = SourceAdapter::new(source)?;
        let mss = MediaSourceStream::new(Box::new(media_source), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(self.extension);

        let format_options = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_options, &MetadataOptions::default())
            .map_err(|e| {
                error!("Format probe failed: {}", e);
                PlaybackError::InvalidFormat(format!("Failed to probe format: {}", e))
            })?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::InvalidFormat("No supported audio tracks".to_string()))?;
        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing sample rate".to_string()))?;
        let channels = params
            .channels
            .map(|ch| ch.count() as u16)
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing channel layout".to_string()))?;
        let frames = params.n_frames.unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                PlaybackError::InvalidFormat(format!("Failed to create codec decoder: {}", e))
            })?;

        let info = StreamInfo::new(frames * u64::from(channels), channels, sample_rate);
        info!(%info, track_id, "Decoder initialized");

        self.info = info;
        self.state = Some(SymphoniaState {
            format_reader,
            decoder,
            track_id,
            converter: SampleConverter::new(),
            pending: Vec::new(),
            pending_pos: 0,
            skip_samples: 0,
            eof: false,
        });
        Ok(info)
    }

    fn info(&self) -> StreamInfo {
        self.info
    }

    /// # Panics
    ///
    /// Panics if called before [`AudioDecoder::open`].
    fn seek(&mut self, sample_offset: u64) -> Result<()> {
        let info = self.info;
        let channels = u64::from(info.channel_count.max(1));
        let frame = sample_offset / channels;
        let state = self.state_mut();

        state.pending.clear();
        state.pending_pos = 0;
        state.skip_samples = 0;

        if info.frame_count() > 0 && frame >= info.frame_count() {
            debug!(frame, "seek past the end");
            state.eof = true;
            return Ok(());
        }

        let seeked = match state.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: frame,
                track_id: state.track_id,
            },
        ) {
            Ok(seeked) => seeked,
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                state.eof = true;
                return Ok(());
            }
            Err(SymphoniaError::SeekError(_)) | Err(SymphoniaError::Unsupported(_)) => {
                return Err(PlaybackError::SeekNotSupported);
            }
            Err(SymphoniaError::IoError(e)) => return Err(PlaybackError::IoError(e)),
            Err(e) => return Err(PlaybackError::DecodingError(e.to_string())),
        };

        state.decoder.reset();
        state.eof = false;
        state.skip_samples =
            (seeked.required_ts.saturating_sub(seeked.actual_ts) * channels) as usize;
        debug!(
            required = seeked.required_ts,
            actual = seeked.actual_ts,
            "seek completed"
        );
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if called before [`AudioDecoder::open`].
    fn read(&mut self, buffer: &mut [i16]) -> Result<ReadOutcome> {
        let state = self.state_mut();
        let mut filled = 0;

        while filled < buffer.len() {
            let available = &state.pending[state.pending_pos..];
            if !available.is_empty() {
                let n = available.len().min(buffer.len() - filled);
                buffer[filled..filled + n].copy_from_slice(&available[..n]);
                state.pending_pos += n;
                filled += n;
                continue;
            }
            if !state.decode_next_packet()? {
                break;
            }
        }

        let exhausted = state.eof && state.pending_pos >= state.pending.len();
        Ok(ReadOutcome::new(filled, exhausted))
    }

    fn close(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}
