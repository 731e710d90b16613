//! # Decoder Registry
//!
//! Maps magic-signature predicates to decoder constructors.
//!
//! ## Overview
//!
//! Format detection never trusts file extensions. Each registration pairs a
//! [`FormatCheck`] (does this source look like my format?) with a
//! [`DecoderFactory`] (build an unopened decoder). [`DecoderRegistry::detect`]
//! rewinds the source to offset 0, runs the checks in registration order, and
//! hands back the first match with the source rewound again.
//!
//! The process-wide registry returned by [`DecoderRegistry::global`] starts
//! with the built-in formats (WAV, then Ogg Vorbis, then FLAC, subject to
//! feature flags). Applications can append their own formats with
//! [`register_decoder`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::registry::{check_magic, register_decoder};
//!
//! register_decoder("mp3", check_magic(b"ID3", 0), || Box::new(MyMp3Decoder::default()));
//! ```

use crate::error::{PlaybackError, Result};
use crate::traits::{AudioDecoder, SeekableSource};
use parking_lot::RwLock;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Predicate deciding whether a source holds a given format.
///
/// Called with the source positioned at offset 0. It may read and seek
/// freely; the registry rewinds afterwards.
pub type FormatCheck = Arc<dyn Fn(&mut dyn SeekableSource) -> bool + Send + Sync>;

/// Constructor for an unopened decoder.
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn AudioDecoder> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    name: &'static str,
    check: FormatCheck,
    factory: DecoderFactory,
}

/// Ordered list of known formats.
#[derive(Default)]
pub struct DecoderRegistry {
    entries: RwLock<Vec<Registration>>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in formats.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        crate::decoder::register_builtin_decoders(&registry);
        registry
    }

    /// The process-wide registry, created with the built-in formats on first use.
    pub fn global() -> &'static DecoderRegistry {
        static GLOBAL: OnceLock<DecoderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DecoderRegistry::with_defaults)
    }

    /// Append a format. Earlier registrations win when several checks match.
    pub fn register<C, F>(&self, name: &'static str, check: C, factory: F)
    where
        C: Fn(&mut dyn SeekableSource) -> bool + Send + Sync + 'static,
        F: Fn() -> Box<dyn AudioDecoder> + Send + Sync + 'static,
    {
        debug!(format = name, "registering decoder");
        self.entries.write().push(Registration {
            name,
            check: Arc::new(check),
            factory: Arc::new(factory),
        });
    }

    /// Names of the registered formats, in probing order.
    pub fn formats(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|entry| entry.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Select an unopened decoder for `source`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::UnknownFormat`] when no check matches
    /// - [`PlaybackError::IoError`] when the source cannot be rewound
    pub fn detect(&self, source: &mut dyn SeekableSource) -> Result<Box<dyn AudioDecoder>> {
        // Snapshot so checks run without holding the lock
        let entries: Vec<Registration> = self.entries.read().clone();

        for entry in entries {
            source.seek(SeekFrom::Start(0))?;
            let matched = (entry.check)(source);
            trace!(format = entry.name, matched, "probed format");
            if matched {
                source.seek(SeekFrom::Start(0))?;
                debug!(format = entry.name, "detected audio format");
                return Ok((entry.factory)());
            }
        }

        source.seek(SeekFrom::Start(0))?;
        Err(PlaybackError::UnknownFormat)
    }
}

/// Append a format to the process-wide registry.
pub fn register_decoder<C, F>(name: &'static str, check: C, factory: F)
where
    C: Fn(&mut dyn SeekableSource) -> bool + Send + Sync + 'static,
    F: Fn() -> Box<dyn AudioDecoder> + Send + Sync + 'static,
{
    DecoderRegistry::global().register(name, check, factory);
}

/// Build a check that compares the bytes at `offset` with `magic`.
///
/// Short sources simply fail the check.
pub fn check_magic(
    magic: &'static [u8],
    offset: u64,
) -> impl Fn(&mut dyn SeekableSource) -> bool + Send + Sync + 'static {
    move |source: &mut dyn SeekableSource| matches_at(source, magic, offset)
}

pub(crate) fn matches_at(source: &mut dyn SeekableSource, magic: &[u8], offset: u64) -> bool {
    if source.seek(SeekFrom::Start(offset)).is_err() {
        return false;
    }
    let mut found = vec![0u8; magic.len()];
    match source.read_exact(&mut found) {
        Ok(()) => found == magic,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ReadOutcome, StreamInfo};
    use std::io::Cursor;

    struct NamedDecoder(&'static str);

    impl AudioDecoder for NamedDecoder {
        fn open(&mut self, _source: Box<dyn SeekableSource>) -> Result<StreamInfo> {
            Ok(StreamInfo::default())
        }

        fn info(&self) -> StreamInfo {
            StreamInfo::default()
        }

        fn seek(&mut self, _sample_offset: u64) -> Result<()> {
            Err(PlaybackError::Internal(self.0.to_string()))
        }

        fn read(&mut self, _buffer: &mut [i16]) -> Result<ReadOutcome> {
            Ok(ReadOutcome::EndOfStream(0))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn decoder_name(decoder: &mut Box<dyn AudioDecoder>) -> String {
        decoder.seek(0).unwrap_err().to_string()
    }

    #[test]
    fn test_check_magic() {
        let check = check_magic(b"WAVE", 8);
        let mut wav = Cursor::new(b"RIFF\0\0\0\0WAVEfmt ".to_vec());
        let mut short = Cursor::new(b"RIFF".to_vec());
        let mut other = Cursor::new(b"RIFF\0\0\0\0AVI LIST".to_vec());

        assert!(check(&mut wav));
        assert!(!check(&mut short));
        assert!(!check(&mut other));
    }

    #[test]
    fn test_detect_uses_registration_order() {
        let registry = DecoderRegistry::new();
        registry.register("first", check_magic(b"AB", 0), || Box::new(NamedDecoder("first")));
        registry.register("second", check_magic(b"A", 0), || Box::new(NamedDecoder("second")));

        let mut source = Cursor::new(b"ABCD".to_vec());
        let mut decoder = registry.detect(&mut source).unwrap();
        assert!(decoder_name(&mut decoder).contains("first"));

        let mut source = Cursor::new(b"AXCD".to_vec());
        let mut decoder = registry.detect(&mut source).unwrap();
        assert!(decoder_name(&mut decoder).contains("second"));
        assert_eq!(registry.formats(), vec!["first", "second"]);
    }

    #[test]
    fn test_detect_rewinds_between_checks() {
        let registry = DecoderRegistry::new();
        // A check that consumes the whole source must not disturb the next one
        registry.register(
            "greedy",
            |source: &mut dyn SeekableSource| {
                let mut sink = Vec::new();
                let _ = source.read_to_end(&mut sink);
                false
            },
            || Box::new(NamedDecoder("greedy")),
        );
        registry.register("magic", check_magic(b"OggS", 0), || Box::new(NamedDecoder("magic")));

        let mut source = Cursor::new(b"OggS and more".to_vec());
        registry.detect(&mut source).unwrap();
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn test_detect_unknown_format() {
        let registry = DecoderRegistry::new();
        registry.register("ogg", check_magic(b"OggS", 0), || Box::new(NamedDecoder("ogg")));

        let mut source = Cursor::new(b"not audio".to_vec());
        let result = registry.detect(&mut source);
        assert!(matches!(result, Err(PlaybackError::UnknownFormat)));
    }

    #[test]
    fn test_builtin_registry_order() {
        let registry = DecoderRegistry::with_defaults();
        let formats = registry.formats();
        assert_eq!(formats.first(), Some(&"wav"));
        #[cfg(feature = "decoder-vorbis")]
        assert!(formats.contains(&"ogg"));
        #[cfg(feature = "decoder-flac")]
        assert!(formats.contains(&"flac"));
    }
}
