//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SoftwareBackend` - an in-memory [`AudioBackend`](bridge_traits::AudioBackend)
//!   whose voices consume queued buffers against the wall clock. It needs no
//!   audio hardware, which makes it the backend of choice for headless hosts,
//!   CI and tests.
//! - `ConsoleLogger` is re-exported from `bridge-traits` as the default
//!   [`LoggerSink`](bridge_traits::LoggerSink).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::SoftwareBackend;
//! use core_playback::device;
//! use std::sync::Arc;
//!
//! fn main() -> core_playback::Result<()> {
//!     device::init(Arc::new(SoftwareBackend::new()))?;
//!     // Open music and sounds against device::current()?
//!     Ok(())
//! }
//! ```

mod software;

pub use bridge_traits::logging::ConsoleLogger;
pub use software::{ListenerSnapshot, SoftwareBackend, VoiceSnapshot};
