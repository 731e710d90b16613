//! # Playback & Streaming Module
//!
//! Sound playback on top of a host [`AudioBackend`](bridge_traits::AudioBackend).
//!
//! ## Overview
//!
//! This module handles:
//! - Streaming playback through a ring of backend buffers ([`SoundStream`], [`Music`])
//! - One-shot sounds from fully decoded buffers ([`Sound`], [`SoundBuffer`])
//! - Audio decoding: WAV via hound, Ogg Vorbis and FLAC via symphonia (feature-gated)
//! - Format detection through a registry of magic-signature checks
//! - The process-wide device and listener ([`device`])

pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod music;
pub mod registry;
pub mod ring;
pub mod sound;
pub mod sound_buffer;
pub mod source;
pub mod stream;
pub mod traits;

pub use config::{StreamingConfig, StreamingStats};
pub use device::AudioDevice;
pub use error::{PlaybackError, Result};
pub use music::{DecoderFeed, Music};
pub use registry::{check_magic, register_decoder, DecoderRegistry};
pub use sound::Sound;
pub use sound_buffer::SoundBuffer;
pub use source::{PlayStatus, SoundSource};
pub use stream::SoundStream;
pub use traits::{AudioDecoder, ReadOutcome, SeekableSource, StreamInfo, StreamSource};
