//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing initialization
//! - Forwarding of log events to a host `LoggerSink`
//!
//! ## Overview
//!
//! Library crates in this workspace only emit `tracing` events. The
//! application owns the subscriber and installs it once through
//! [`logging::init_logging`].

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
