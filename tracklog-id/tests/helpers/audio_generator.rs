//! WAV fixture generation
//!
//! Fixtures use a low sample rate to keep them small; the pipeline reads
//! durations from the header, so the rate does not matter to it.

use std::path::{Path, PathBuf};

/// Sample rate of generated fixtures
pub const FIXTURE_SAMPLE_RATE: u32 = 8_000;

/// Write a mono 16-bit tone of `duration_seconds` to `path`
pub fn generate_test_wav(path: &Path, duration_seconds: f64) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: FIXTURE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (duration_seconds * FIXTURE_SAMPLE_RATE as f64).round() as usize;

    // 440 Hz at a quarter of full scale
    for i in 0..total_samples {
        let t = i as f64 / FIXTURE_SAMPLE_RATE as f64;
        let sample = (t * 440.0 * 2.0 * std::f64::consts::PI).sin() * (i16::MAX as f64 / 4.0);
        writer.write_sample(sample as i16)?;
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Duration of a WAV fixture in seconds
pub fn wav_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = hound::WavReader::open(path)?;
    Ok(reader.duration() as f64 / reader.spec().sample_rate as f64)
}
