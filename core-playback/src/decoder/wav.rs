//! RIFF/WAVE decoder built on `hound`.

use crate::decoder::sample_converter::{f32_to_i16, int_to_i16};
use crate::error::{PlaybackError, Result};
use crate::traits::{AudioDecoder, ReadOutcome, SeekableSource, StreamInfo};
use hound::{SampleFormat as WavSampleFormat, WavReader, WavSpec};
use tracing::{debug, instrument};

struct WavState {
    reader: WavReader<Box<dyn SeekableSource>>,
    spec: WavSpec,
    /// All-channel samples handed out since the last seek.
    position: u64,
}

/// Decoder for uncompressed WAV files (8/16/24/32-bit integer, 32-bit float).
#[derive(Default)]
pub struct WavDecoder {
    state: Option<WavState>,
    info: StreamInfo,
}

impl WavDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut WavState {
        self.state
            .as_mut()
            .expect("WavDecoder used before open")
    }
}

fn map_hound_error(err: hound::Error) -> PlaybackError {
    match err {
        hound::Error::IoError(io) => PlaybackError::IoError(io),
        other => PlaybackError::DecodingError(other.to_string()),
    }
}

impl AudioDecoder for WavDecoder {
    #[instrument(skip(self, source))]
    fn open(&mut self, source: Box<dyn SeekableSource>) -> Result<StreamInfo> {
        let reader = WavReader::new(source)
            .map_err(|e| PlaybackError::InvalidFormat(format!("Invalid WAV header: {e}")))?;
        let spec = reader.spec();

        let info = StreamInfo::new(
            u64::from(reader.len()),
            spec.channels,
            spec.sample_rate,
        );
        debug!(%info, bits = spec.bits_per_sample, "opened WAV stream");

        self.info = info;
        self.state = Some(WavState {
            reader,
            spec,
            position: 0,
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
        let state = self.state_mut();
        let channels = u64::from(info.channel_count.max(1));
        let frame = (sample_offset / channels).min(info.frame_count());

        state.reader.seek(frame as u32)?;
        state.position = frame * channels;
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if called before [`AudioDecoder::open`].
    fn read(&mut self, buffer: &mut [i16]) -> Result<ReadOutcome> {
        let total = self.info.sample_count;
        let state = self.state_mut();
        let remaining = total.saturating_sub(state.position);
        let wanted = (buffer.len() as u64).min(remaining) as usize;

        let WavSpec {
            sample_format,
            bits_per_sample: bits,
            ..
        } = state.spec;

        let mut count = 0;
        match sample_format {
            WavSampleFormat::Int => {
                for sample in state.reader.samples::<i32>().take(wanted) {
                    buffer[count] = int_to_i16(sample.map_err(map_hound_error)?, bits);
                    count += 1;
                }
            }
            WavSampleFormat::Float => {
                for sample in state.reader.samples::<f32>().take(wanted) {
                    buffer[count] = f32_to_i16(sample.map_err(map_hound_error)?);
                    count += 1;
                }
            }
        }

        state.position += count as u64;
        // The reader running dry before `wanted` means the data chunk was short
        let exhausted = count < wanted || state.position >= total;
        Ok(ReadOutcome::new(count, exhausted))
    }

    fn close(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}
