//! # Sample Format Converter
//!
//! Reduces decoded audio of any width to interleaved signed 16-bit samples,
//! the only PCM layout the backend accepts.

#[cfg(feature = "core-decoder")]
use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};

/// Scale an integer sample of `bits` significant bits to 16 bits.
///
/// 8-bit input is shifted up, 24 and 32-bit input is shifted down.
pub fn int_to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (sample << (16 - bits)) as i16,
        _ => (sample >> (bits.min(32) - 16)) as i16,
    }
}

/// Scale a float sample in `[-1.0, 1.0]` to 16 bits, clamping overshoot.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Converter that interleaves Symphonia buffers into `i16` samples.
///
/// Symphonia outputs audio in various formats (i8 up to f64) and planar
/// layouts. The converter keeps one scratch [`SampleBuffer`] and reuses it
/// across packets, growing it only when a packet is larger or the signal
/// layout changes.
///
/// # Example
///
/// ```rust,ignore
/// let decoded = decoder.decode(&packet)?;
/// let samples: &[i16] = converter.convert(decoded);
/// ```
#[cfg(feature = "core-decoder")]
#[derive(Default)]
pub struct SampleConverter {
    scratch: Option<(SignalSpec, SampleBuffer<i16>)>,
}

#[cfg(feature = "core-decoder")]
impl SampleConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleave `decoded` as `i16`. The slice is valid until the next call.
    pub fn convert(&mut self, decoded: AudioBufferRef<'_>) -> &[i16] {
        let spec = *decoded.spec();
        let capacity = decoded.capacity();
        let needed = capacity * spec.channels.count();

        let reusable = matches!(
            &self.scratch,
            Some((scratch_spec, buffer)) if *scratch_spec == spec && buffer.capacity() >= needed
        );
        if !reusable {
            self.scratch = None;
        }

        let (_, buffer) = self
            .scratch
            .get_or_insert_with(|| (spec, SampleBuffer::new(capacity as u64, spec)));
        buffer.copy_interleaved_ref(decoded);
        buffer.samples()
    }
}
