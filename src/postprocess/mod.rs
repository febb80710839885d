//! Turns cached simulation results into normalized audio channels.
//!
//! Postprocessing runs once per render, after every source/receiver pair
//! has finished simulating:
//!
//! 1. [`render_channel`] mixes one pair's raytracer impulses and waveguide
//!    band into one sampled channel per capsule
//! 2. [`normalize`] scales every channel of the render by one shared factor
//!    so the loudest sample reaches full scale
//! 3. [`trim`] drops leading and trailing silence shared by all channels
//! 4. [`writer::write_channel`] writes each channel to disk

pub mod attenuator;
pub mod writer;

use crate::compute::{RaytraceResults, WaveguideResults};
use crate::error::{AuralizeError, Result};
use crate::job::{Capsule, CapsuleKind};
use crate::math::{Orientation, Vec3};
use crate::output::TrimPolicy;
use crate::scene::{Environment, SIMULATION_BANDS};
use attenuator::{HrtfEar, Microphone};

/// One rendered output channel, named after the source, receiver and
/// capsule that produced it.
#[derive(Debug, Clone)]
pub struct ChannelData {
    pub source_name: String,
    pub receiver_name: String,
    pub capsule_name: String,
    pub samples: Vec<f32>,
}

/// Capsule model with the receiver's orientation folded in.
enum CapsuleModel {
    Microphone(Microphone),
    Ear(HrtfEar),
}

impl CapsuleModel {
    fn build(capsule: &Capsule, receiver_orientation: &Orientation) -> Self {
        match &capsule.kind {
            CapsuleKind::Microphone { orientation, shape } => CapsuleModel::Microphone(
                Microphone::new(orientation.relative_to(receiver_orientation), *shape),
            ),
            CapsuleKind::Hrtf {
                orientation,
                channel,
            } => CapsuleModel::Ear(HrtfEar::new(
                orientation.relative_to(receiver_orientation),
                *channel,
            )),
        }
    }

    /// Collapses one arrival into a sample value and an extra delay in
    /// seconds.
    fn arrival(
        &self,
        incident: Vec3,
        volume: &[f32; SIMULATION_BANDS],
        speed_of_sound: f32,
    ) -> (f32, f32) {
        match self {
            CapsuleModel::Microphone(microphone) => {
                let mean = volume.iter().sum::<f32>() / SIMULATION_BANDS as f32;
                (microphone.attenuation(incident) * mean, 0.0)
            }
            CapsuleModel::Ear(ear) => {
                let gains = ear.band_attenuation(incident);
                let mut value = 0.0;
                for band in 0..SIMULATION_BANDS {
                    value += volume[band] * gains[band];
                }
                value /= SIMULATION_BANDS as f32;
                (value, ear.delay_seconds(incident, speed_of_sound))
            }
        }
    }

    /// Broadband gain applied to the diffuse waveguide field.
    fn diffuse_gain(&self) -> f32 {
        match self {
            CapsuleModel::Microphone(microphone) => microphone.diffuse_gain(),
            CapsuleModel::Ear(ear) => {
                let gains = ear.diffuse_gain();
                gains.iter().sum::<f32>() / SIMULATION_BANDS as f32
            }
        }
    }
}

/// Renders one capsule's channel from a pair's cached simulation results.
///
/// Every raytracer impulse is placed at its arrival time with the capsule's
/// directional gain; the waveguide band is resampled to the output rate and
/// mixed in from time zero with the capsule's diffuse-field gain. The
/// returned samples are unnormalized.
pub fn render_channel(
    raytracer: &RaytraceResults,
    waveguide: &WaveguideResults,
    receiver_position: Vec3,
    receiver_orientation: &Orientation,
    capsule: &Capsule,
    environment: Environment,
    output_sample_rate: u32,
) -> Result<Vec<f32>> {
    let model = CapsuleModel::build(capsule, receiver_orientation);
    let sample_rate = f64::from(output_sample_rate);

    let mut arrivals = Vec::with_capacity(raytracer.impulses.len());
    let mut raytracer_len = 0;
    for impulse in &raytracer.impulses {
        let incident = (impulse.position - receiver_position).normalize_or_zero();
        let (value, delay) = model.arrival(incident, &impulse.volume, environment.speed_of_sound);
        let time = f64::from(impulse.distance / environment.speed_of_sound + delay);
        let index = (time * sample_rate).round() as usize;
        raytracer_len = raytracer_len.max(index + 1);
        arrivals.push((index, value));
    }

    let diffuse = if waveguide.band.is_empty() {
        Vec::new()
    } else {
        resample_band(&waveguide.band, waveguide.sample_rate, output_sample_rate)?
    };

    let mut samples = vec![0.0f32; raytracer_len.max(diffuse.len())];
    for (index, value) in arrivals {
        samples[index] += value;
    }
    let diffuse_gain = model.diffuse_gain();
    for (sample, pressure) in samples.iter_mut().zip(&diffuse) {
        *sample += pressure * diffuse_gain;
    }

    Ok(samples)
}

const RESAMPLE_CHUNK: usize = 1024;

/// Resamples the waveguide band from the mesh update rate to the output
/// rate.
fn resample_band(band: &[f32], source_rate: f64, target_rate: u32) -> Result<Vec<f32>> {
    let source_rate = source_rate.round() as usize;
    let target_rate = target_rate as usize;
    if source_rate == 0 {
        return Err(AuralizeError::Postprocess(
            "Waveguide sample rate must be greater than 0".to_string(),
        ));
    }
    if source_rate == target_rate {
        return Ok(band.to_vec());
    }

    use rubato::{FftFixedIn, Resampler};

    let mut resampler = FftFixedIn::new(source_rate, target_rate, RESAMPLE_CHUNK, 2, 1)
        .map_err(|e| AuralizeError::Postprocess(format!("Failed to create resampler: {}", e)))?;

    let mut output = Vec::new();
    let mut input_index = 0;
    while input_index < band.len() {
        let samples_to_process = (band.len() - input_index).min(RESAMPLE_CHUNK);

        // Pad the final chunk to the fixed input size.
        let mut input_chunk = vec![0.0f32; RESAMPLE_CHUNK];
        input_chunk[..samples_to_process]
            .copy_from_slice(&band[input_index..input_index + samples_to_process]);

        let waves_in = vec![input_chunk];
        let waves_out = resampler
            .process(&waves_in, None)
            .map_err(|e| AuralizeError::Postprocess(format!("Resampling error: {}", e)))?;
        if let Some(first_channel) = waves_out.first() {
            output.extend_from_slice(first_channel);
        }

        input_index += samples_to_process;
    }

    // The trailing pad produces surplus output samples.
    let expected =
        (band.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    output.truncate(expected);
    Ok(output)
}

/// Largest absolute sample across all channels.
pub fn global_peak(channels: &[ChannelData]) -> f32 {
    channels
        .iter()
        .flat_map(|channel| channel.samples.iter())
        .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
}

/// Multiplies every sample of every channel by `factor`.
pub fn apply_scale(channels: &mut [ChannelData], factor: f32) {
    for channel in channels.iter_mut() {
        for sample in channel.samples.iter_mut() {
            *sample *= factor;
        }
    }
}

/// Scales all channels together so the loudest sample reaches full scale.
///
/// One factor is applied to the whole render, preserving relative levels
/// between channels. Returns the factor; silent renders are left untouched
/// with a factor of 1.0.
pub fn normalize(channels: &mut [ChannelData]) -> f32 {
    let peak = global_peak(channels);
    if peak <= 0.0 || !peak.is_finite() {
        return 1.0;
    }
    let factor = 1.0 / peak;
    apply_scale(channels, factor);
    factor
}

/// Removes leading and trailing silence according to `policy`.
///
/// The first and last samples above the threshold are located across all
/// channels together and the same ranges are removed from each, so
/// inter-channel timing survives.
pub fn trim(channels: &mut [ChannelData], policy: &TrimPolicy) {
    if !(policy.trim_lead_in || policy.trim_tail) || channels.is_empty() {
        return;
    }
    let threshold = 10.0f32.powf(policy.threshold_db / 20.0);

    let mut first: Option<usize> = None;
    let mut last: Option<usize> = None;
    for channel in channels.iter() {
        if let Some(index) = channel.samples.iter().position(|s| s.abs() >= threshold) {
            first = Some(first.map_or(index, |f| f.min(index)));
        }
        if let Some(index) = channel.samples.iter().rposition(|s| s.abs() >= threshold) {
            last = Some(last.map_or(index, |l| l.max(index)));
        }
    }
    let (Some(first), Some(last)) = (first, last) else {
        // Nothing rises above the threshold; leave the render alone.
        return;
    };

    for channel in channels.iter_mut() {
        if policy.trim_tail {
            channel.samples.truncate(last + 1);
        }
        if policy.trim_lead_in {
            let lead = first.min(channel.samples.len());
            channel.samples.drain(..lead);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Impulse;
    use crate::job::HrtfChannel;

    fn channel(samples: Vec<f32>) -> ChannelData {
        ChannelData {
            source_name: "s".to_string(),
            receiver_name: "r".to_string(),
            capsule_name: "c".to_string(),
            samples,
        }
    }

    fn flat_results(distance: f32, position: Vec3) -> RaytraceResults {
        RaytraceResults {
            impulses: vec![Impulse {
                volume: [1.0; SIMULATION_BANDS],
                position,
                distance,
            }],
            visual: vec![],
        }
    }

    fn no_waveguide() -> WaveguideResults {
        WaveguideResults {
            band: vec![],
            sample_rate: 1000.0,
        }
    }

    #[test]
    fn test_normalize_preserves_channel_ratios() {
        let mut channels = vec![channel(vec![2.0, -4.0]), channel(vec![1.0])];
        let factor = normalize(&mut channels);
        assert!((factor - 0.25).abs() < 1e-6);
        assert_eq!(channels[0].samples, vec![0.5, -1.0]);
        assert_eq!(channels[1].samples, vec![0.25]);
    }

    #[test]
    fn test_normalize_leaves_silence_alone() {
        let mut channels = vec![channel(vec![0.0, 0.0])];
        let factor = normalize(&mut channels);
        assert_eq!(factor, 1.0);
        assert_eq!(channels[0].samples, vec![0.0, 0.0]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut channels = vec![channel(vec![0.5, -0.25])];
        normalize(&mut channels);
        let factor = normalize(&mut channels);
        assert!((factor - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_trim_removes_shared_offsets() {
        let mut channels = vec![
            channel(vec![0.0, 0.0, 1.0, 0.0, 0.0]),
            channel(vec![0.0, 0.5, 0.0, 0.0, 0.0]),
        ];
        let policy = TrimPolicy {
            trim_lead_in: true,
            trim_tail: true,
            threshold_db: -20.0,
        };
        trim(&mut channels, &policy);
        // First audible sample at index 1, last at index 2.
        assert_eq!(channels[0].samples, vec![0.0, 1.0]);
        assert_eq!(channels[1].samples, vec![0.5, 0.0]);
    }

    #[test]
    fn test_trim_skips_silent_render() {
        let mut channels = vec![channel(vec![0.0; 4])];
        let policy = TrimPolicy {
            trim_lead_in: true,
            trim_tail: true,
            threshold_db: -60.0,
        };
        trim(&mut channels, &policy);
        assert_eq!(channels[0].samples.len(), 4);
    }

    #[test]
    fn test_trim_disabled_is_noop() {
        let mut channels = vec![channel(vec![0.0, 1.0, 0.0])];
        trim(&mut channels, &TrimPolicy::default());
        assert_eq!(channels[0].samples.len(), 3);
    }

    #[test]
    fn test_render_channel_places_direct_arrival() {
        // 34 m at 340 m/s is 100 ms, which lands at index 100 at 1 kHz.
        let raytracer = flat_results(34.0, Vec3::new(34.0, 0.0, 0.0));
        let capsule = Capsule::microphone("omni", Orientation::default(), 0.0);
        let samples = render_channel(
            &raytracer,
            &no_waveguide(),
            Vec3::ZERO,
            &Orientation::default(),
            &capsule,
            Environment::default(),
            1000,
        )
        .expect("render");
        assert_eq!(samples.len(), 101);
        assert!((samples[100] - 1.0).abs() < 1e-5);
        assert!(samples[..100].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_render_channel_mixes_waveguide_at_matching_rate() {
        let raytracer = RaytraceResults {
            impulses: vec![],
            visual: vec![],
        };
        let waveguide = WaveguideResults {
            band: vec![0.5, -0.25, 0.0],
            sample_rate: 1000.0,
        };
        let capsule = Capsule::microphone("omni", Orientation::default(), 0.0);
        let samples = render_channel(
            &raytracer,
            &waveguide,
            Vec3::ZERO,
            &Orientation::default(),
            &capsule,
            Environment::default(),
            1000,
        )
        .expect("render");
        // Omni diffuse gain is 1, and matching rates skip the resampler.
        assert_eq!(samples, vec![0.5, -0.25, 0.0]);
    }

    #[test]
    fn test_render_channel_resamples_waveguide_band() {
        let raytracer = RaytraceResults {
            impulses: vec![],
            visual: vec![],
        };
        let waveguide = WaveguideResults {
            band: vec![0.1; 2000],
            sample_rate: 2000.0,
        };
        let capsule = Capsule::microphone("omni", Orientation::default(), 0.0);
        let samples = render_channel(
            &raytracer,
            &waveguide,
            Vec3::ZERO,
            &Orientation::default(),
            &capsule,
            Environment::default(),
            1000,
        )
        .expect("render");
        assert_eq!(samples.len(), 1000);
    }

    #[test]
    fn test_far_ear_arrives_later() {
        // Arrival from the left: the right ear hears it delayed.
        let raytracer = flat_results(10.0, Vec3::new(-10.0, 0.0, 0.0));
        let receiver = Orientation::default();
        let left = Capsule::hrtf("left", Orientation::default(), HrtfChannel::Left);
        let right = Capsule::hrtf("right", Orientation::default(), HrtfChannel::Right);

        let onset = |capsule: &Capsule| {
            let samples = render_channel(
                &raytracer,
                &no_waveguide(),
                Vec3::ZERO,
                &receiver,
                capsule,
                Environment::default(),
                100_000,
            )
            .expect("render");
            samples
                .iter()
                .position(|s| s.abs() > 0.0)
                .expect("an arrival")
        };
        assert!(onset(&right) > onset(&left));
    }
}
