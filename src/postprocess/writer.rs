//! WAV output for rendered channels.

use super::ChannelData;
use crate::error::{AuralizeError, Result};
use crate::output::{BitDepth, OutputConfig, compute_output_path};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one rendered channel to its deterministic output path.
///
/// Samples are expected in [-1, 1]; anything outside is clamped. The file
/// is written to a temporary sibling first and renamed into place, so a
/// failed write never leaves a truncated file at the final path.
pub fn write_channel(output: &OutputConfig, channel: &ChannelData) -> Result<PathBuf> {
    fs::create_dir_all(&output.directory)?;
    let path = compute_output_path(
        output,
        &channel.source_name,
        &channel.receiver_name,
        &channel.capsule_name,
    );
    let temp_path = path.with_extension(format!("{}.tmp", output.format.extension()));

    match write_samples(&temp_path, output, &channel.samples) {
        Ok(()) => {
            fs::rename(&temp_path, &path)?;
            Ok(path)
        }
        Err(error) => {
            let _ = fs::remove_file(&temp_path);
            Err(error)
        }
    }
}

fn write_samples(path: &Path, output: &OutputConfig, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: output.sample_rate,
        bits_per_sample: output.bit_depth.bits(),
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        AuralizeError::AudioWrite(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let write_result = match output.bit_depth {
            BitDepth::Pcm16 => writer.write_sample((clamped * f32::from(i16::MAX)) as i16),
            BitDepth::Pcm24 => writer.write_sample((clamped * 8_388_607.0) as i32),
        };
        write_result
            .map_err(|e| AuralizeError::AudioWrite(format!("Failed to write sample: {}", e)))?;
    }

    writer.finalize().map_err(|e| {
        AuralizeError::AudioWrite(format!("Failed to finalize {}: {}", path.display(), e))
    })?;
    Ok(())
}
