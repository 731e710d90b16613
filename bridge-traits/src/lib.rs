//! # Host Bridge Traits
//!
//! Contracts that a host audio platform implements so the playback core can
//! drive it.
//!
//! ## Overview
//!
//! The playback core never talks to an audio API directly. Everything it needs
//! from the host is expressed here:
//!
//! - [`AudioBackend`](playback::AudioBackend) - hardware buffers, voices and the
//!   listener of a 3D audio device (OpenAL-style object model)
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Software device |
//! | OpenAL   | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Reject misuse of handles (`InvalidHandle`) and of queue state (`InvalidOperation`)
//!   instead of silently corrupting playback
//!
//! ## Thread Safety
//!
//! Backends are shared between the caller thread and one background thread per
//! streaming voice, so every trait here requires `Send + Sync`.

pub mod error;
pub mod logging;
pub mod playback;

pub use error::{BridgeError, Result};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioBackend, BufferHandle, BufferInfo, ListenerParam, SampleFormat, VoiceHandle, VoiceParam,
    VoiceState,
};
