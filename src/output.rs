//! Output configuration and file naming.
//!
//! One render writes one audio file per (source, receiver, capsule) triple.
//! File names are deterministic so a host application can predict them before
//! the render finishes: `[unique_id.]s_<source>.r_<receiver>.c_<capsule>.<ext>`
//! inside the configured directory.

use crate::error::{AuralizeError, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Container format for rendered impulse responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Wav,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }
}

/// Integer sample depth of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Pcm16,
    Pcm24,
}

impl BitDepth {
    pub fn bits(&self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
        }
    }
}

/// Silence trimming applied after normalization.
///
/// Trimming removes leading and trailing samples whose level stays below
/// `threshold_db` relative to full scale. The same offsets are removed from
/// every channel of the render so inter-channel timing survives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimPolicy {
    pub trim_lead_in: bool,
    pub trim_tail: bool,
    /// Threshold relative to full scale, in dB (negative)
    pub threshold_db: f32,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            trim_lead_in: false,
            trim_tail: false,
            threshold_db: -60.0,
        }
    }
}

/// Where and how rendered impulse responses are written.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory receiving the output files; created if missing
    pub directory: PathBuf,
    /// Optional prefix so repeated renders into the same directory do not
    /// overwrite each other; an empty string behaves like `None`
    pub unique_id: Option<String>,
    /// Sample rate of the output files in Hz
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    pub format: OutputFormat,
    pub trim: TrimPolicy,
}

impl OutputConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            unique_id: None,
            sample_rate: 44_100,
            bit_depth: BitDepth::default(),
            format: OutputFormat::default(),
            trim: TrimPolicy::default(),
        }
    }

    /// Sets `unique_id` to a fresh UUID and returns it.
    pub fn generate_unique_id(&mut self) -> &str {
        self.unique_id = Some(Uuid::new_v4().simple().to_string());
        self.unique_id.as_deref().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AuralizeError::Configuration(
                "Output sample rate must be greater than 0".to_string(),
            ));
        }
        if !self.trim.threshold_db.is_finite() {
            return Err(AuralizeError::Configuration(format!(
                "Trim threshold must be finite, got {}",
                self.trim.threshold_db
            )));
        }
        Ok(())
    }
}

/// Deterministic output path for one rendered channel.
pub fn compute_output_path(
    output: &OutputConfig,
    source_name: &str,
    receiver_name: &str,
    capsule_name: &str,
) -> PathBuf {
    let mut file_name = String::new();
    if let Some(unique_id) = output.unique_id.as_deref() {
        if !unique_id.is_empty() {
            file_name.push_str(unique_id);
            file_name.push('.');
        }
    }
    file_name.push_str(&format!(
        "s_{}.r_{}.c_{}.{}",
        source_name,
        receiver_name,
        capsule_name,
        output.format.extension()
    ));
    Path::new(&output.directory).join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_without_unique_id() {
        let output = OutputConfig::new("/tmp");
        let path = compute_output_path(&output, "S1", "R1", "C1");
        assert_eq!(path, PathBuf::from("/tmp/s_S1.r_R1.c_C1.wav"));
    }

    #[test]
    fn test_output_path_with_unique_id() {
        let mut output = OutputConfig::new("/tmp");
        output.unique_id = Some("run1".to_string());
        let path = compute_output_path(&output, "S1", "R1", "C1");
        assert_eq!(path, PathBuf::from("/tmp/run1.s_S1.r_R1.c_C1.wav"));
    }

    #[test]
    fn test_empty_unique_id_behaves_like_none() {
        let mut output = OutputConfig::new("/tmp");
        output.unique_id = Some(String::new());
        let path = compute_output_path(&output, "a", "b", "c");
        assert_eq!(path, PathBuf::from("/tmp/s_a.r_b.c_c.wav"));
    }

    #[test]
    fn test_generate_unique_id_is_non_empty_and_fresh() {
        let mut output = OutputConfig::new("/tmp");
        let first = output.generate_unique_id().to_string();
        let second = output.generate_unique_id().to_string();
        assert!(!first.is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut output = OutputConfig::new("/tmp");
        output.sample_rate = 0;
        assert!(output.validate().is_err());
    }

    #[test]
    fn test_bit_depths() {
        assert_eq!(BitDepth::Pcm16.bits(), 16);
        assert_eq!(BitDepth::Pcm24.bits(), 24);
    }
}
