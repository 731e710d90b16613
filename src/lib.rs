//! Facade over the workspace crates.
//!
//! Hosts depend on `soundkit` alone and pick decoders and the desktop
//! backend through features:
//!
//! - `desktop-shims` (default) re-exports [`SoftwareBackend`]
//! - `decoder-flac`, `decoder-vorbis`, `decoder-all` (default) forward to
//!   `core-playback`
//!
//! ```ignore
//! use soundkit::{device, Music, SoftwareBackend};
//! use std::sync::Arc;
//!
//! let device = device::init(Arc::new(SoftwareBackend::new()))?;
//! let music = Music::open_file(&device, "theme.ogg")?;
//! music.play()?;
//! ```

pub use bridge_traits::{AudioBackend, BridgeError, LogLevel, LoggerSink};
pub use core_playback::*;
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::SoftwareBackend;
