//! # Audio Decoder Module
//!
//! Built-in implementations of [`AudioDecoder`](crate::traits::AudioDecoder).
//!
//! ## Supported Formats
//!
//! | Format | Signature | Backend | Feature Flag |
//! |--------|-----------|---------|--------------|
//! | WAV (PCM 8/16/24/32-bit, float) | `RIFF` @0 + `WAVE` @8 | `hound` | always |
//! | Ogg Vorbis | `OggS` @0 | `symphonia` | `decoder-vorbis` |
//! | FLAC | `fLaC` @0 | `symphonia` | `decoder-flac` |
//!
//! Every decoder produces interleaved 16-bit samples. Wider formats are
//! reduced by [`sample_converter`].
//!
//! ## Threading Model
//!
//! Decoders are `Send` and are driven by a stream's background thread, one
//! call at a time.

pub mod sample_converter;
mod wav;

#[cfg(feature = "core-decoder")]
mod symphonia;

#[cfg(feature = "core-decoder")]
pub use self::symphonia::SymphoniaDecoder;
#[cfg(feature = "core-decoder")]
pub use sample_converter::SampleConverter;
pub use wav::WavDecoder;

use crate::registry::{matches_at, DecoderRegistry};
#[cfg(any(feature = "decoder-flac", feature = "decoder-vorbis"))]
use crate::registry::check_magic;

/// Register the built-in formats, WAV first.
pub(crate) fn register_builtin_decoders(registry: &DecoderRegistry) {
    registry.register(
        "wav",
        |source| matches_at(source, b"RIFF", 0) && matches_at(source, b"WAVE", 8),
        || Box::new(WavDecoder::new()),
    );

    #[cfg(feature = "decoder-vorbis")]
    registry.register("ogg", check_magic(b"OggS", 0), || {
        Box::new(SymphoniaDecoder::ogg())
    });

    #[cfg(feature = "decoder-flac")]
    registry.register("flac", check_magic(b"fLaC", 0), || {
        Box::new(SymphoniaDecoder::flac())
    });
}
