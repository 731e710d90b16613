//! # Streaming Playback Example
//!
//! Synthesizes a short WAV file in memory, streams it as music through the
//! software backend and drives it through play, seek, pause and stop. A
//! one-shot sound plays over it from a decoded buffer.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use anyhow::Context;
use bridge_desktop::SoftwareBackend;
use bridge_traits::logging::LogLevel;
use core_playback::{device, Music, PlayStatus, Sound, SoundBuffer, StreamingConfig};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Render `seconds` of a sine tone as a 16-bit WAV file.
fn synth_wav(seconds: f32, frequency: f32, channels: u16) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    let frames = (seconds * spec.sample_rate as f32) as u32;
    for frame in 0..frames {
        let t = frame as f32 / spec.sample_rate as f32;
        let sample = ((t * frequency * std::f32::consts::TAU).sin() * 12_000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

fn report(label: &str, music: &Music) {
    println!(
        "  {:<10} status={:?} offset={:.2}s",
        label,
        music.status(),
        music.playing_offset().as_secs_f64()
    );
}

fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info)
            .with_thread_info(true),
    )?;

    println!("=== Streaming Playback Demo ===\n");

    // Four times faster than real time keeps the demo short
    let backend = Arc::new(SoftwareBackend::new().with_time_scale(4.0));
    let device = device::init(backend.clone())?;
    device.set_global_volume(80.0)?;

    let music = Music::open_with(
        &device,
        core_playback::DecoderRegistry::global(),
        Box::new(Cursor::new(synth_wav(8.0, 220.0, 2)?)),
        StreamingConfig::low_latency(),
    )
    .context("opening synthesized music")?;
    println!("Music: {}", music.info());

    music.set_volume(60.0)?;
    music.play()?;
    thread::sleep(Duration::from_millis(250));
    report("playing", &music);

    let click = Arc::new(SoundBuffer::load(
        &device,
        Cursor::new(synth_wav(0.1, 880.0, 1)?),
    )?);
    let sound = Sound::with_buffer(&device, click)?;
    sound.set_position(2.0, 0.0, -1.0)?;
    sound.play()?;
    println!("  one-shot  status={:?}", sound.status());

    music.set_playing_offset(Duration::from_secs(6))?;
    report("seeked", &music);

    music.pause()?;
    thread::sleep(Duration::from_millis(100));
    report("paused", &music);

    music.play()?;
    while music.status() == PlayStatus::Playing {
        thread::sleep(Duration::from_millis(50));
    }
    report("finished", &music);

    let stats = music.stats();
    println!(
        "\nStats: {} buffers, {} samples submitted, {} underruns",
        stats.buffers_submitted, stats.samples_submitted, stats.underrun_count
    );

    music.stop();
    drop(sound);
    drop(music);
    device::shutdown();
    println!("Voices left on the backend: {}", backend.voice_count());

    Ok(())
}
