//! Capsule models mapping arrival direction to channel gain.
//!
//! Both models work on the unit vector pointing from the receiver towards
//! an arrival. [`Microphone`] applies a broadband polar pattern;
//! [`HrtfEar`] is a parametric head model with frequency-dependent shadow
//! and an interaural delay, coarse next to measured HRTF sets but free of
//! data tables and convolution.

use crate::job::HrtfChannel;
use crate::math::{Orientation, Vec3};
use crate::scene::SIMULATION_BANDS;

/// First-order polar-pattern microphone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Microphone {
    pointing: Vec3,
    shape: f32,
}

impl Microphone {
    /// `shape` blends the pattern: 0.0 omnidirectional, 0.5 cardioid,
    /// 1.0 bidirectional.
    pub fn new(orientation: Orientation, shape: f32) -> Self {
        Self {
            pointing: orientation.pointing(),
            shape,
        }
    }

    /// Signed gain for an arrival from direction `incident` (unit vector
    /// from the receiver towards the arrival). Bidirectional patterns
    /// return negative gain behind the capsule.
    pub fn attenuation(&self, incident: Vec3) -> f32 {
        (1.0 - self.shape) + self.shape * self.pointing.dot(incident)
    }

    /// Random-incidence gain used for the diffuse waveguide field.
    pub fn diffuse_gain(&self) -> f32 {
        let omni = 1.0 - self.shape;
        (omni * omni + self.shape * self.shape / 3.0).sqrt()
    }
}

/// Head radius of the ear model in metres.
const HEAD_RADIUS: f32 = 0.0875;

/// Head shadow strength per band. Low bands diffract around the head
/// almost unattenuated; high bands are shadowed strongly.
const SHADOW_STRENGTH: [f32; SIMULATION_BANDS] =
    [0.0, 0.05, 0.1, 0.2, 0.35, 0.5, 0.65, 0.8];

/// One ear of the parametric head model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrtfEar {
    ear_axis: Vec3,
    channel: HrtfChannel,
}

impl HrtfEar {
    /// `orientation` is where the head faces; the ear axis points out of
    /// the modelled ear, perpendicular to it.
    pub fn new(orientation: Orientation, channel: HrtfChannel) -> Self {
        let pointing = orientation.pointing();
        let right = pointing.cross(Vec3::Y).normalize_or_zero();
        let right = if right == Vec3::ZERO {
            // Head faces straight up or down; fall back to world X.
            Vec3::X
        } else {
            right
        };
        let ear_axis = match channel {
            HrtfChannel::Left => -right,
            HrtfChannel::Right => right,
        };
        Self { ear_axis, channel }
    }

    pub fn channel(&self) -> HrtfChannel {
        self.channel
    }

    /// How far onto the far side of the head the arrival sits, in [0, 1].
    fn shadow(&self, incident: Vec3) -> f32 {
        (1.0 - self.ear_axis.dot(incident)) * 0.5
    }

    /// Per-band gain for an arrival from direction `incident`.
    pub fn band_attenuation(&self, incident: Vec3) -> [f32; SIMULATION_BANDS] {
        let shadow = self.shadow(incident);
        let mut gains = [0.0; SIMULATION_BANDS];
        for (band, gain) in gains.iter_mut().enumerate() {
            *gain = 1.0 - shadow * SHADOW_STRENGTH[band];
        }
        gains
    }

    /// Extra propagation delay to this ear in seconds, zero for arrivals
    /// from the ear's own side.
    pub fn delay_seconds(&self, incident: Vec3, speed_of_sound: f32) -> f32 {
        let max_detour = HEAD_RADIUS * (1.0 + std::f32::consts::FRAC_PI_2);
        self.shadow(incident) * max_detour / speed_of_sound
    }

    /// Per-band random-incidence gain used for the diffuse waveguide
    /// field.
    pub fn diffuse_gain(&self) -> [f32; SIMULATION_BANDS] {
        let mut gains = [0.0; SIMULATION_BANDS];
        for (band, gain) in gains.iter_mut().enumerate() {
            *gain = 1.0 - SHADOW_STRENGTH[band] * 0.5;
        }
        gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_omni_hears_everything_equally() {
        let microphone = Microphone::new(Orientation::default(), 0.0);
        assert!((microphone.attenuation(-Vec3::Z) - 1.0).abs() < EPSILON);
        assert!((microphone.attenuation(Vec3::Z) - 1.0).abs() < EPSILON);
        assert!((microphone.attenuation(Vec3::X) - 1.0).abs() < EPSILON);
        assert!((microphone.diffuse_gain() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cardioid_rejects_rear() {
        let microphone = Microphone::new(Orientation::new(-Vec3::Z), 0.5);
        assert!((microphone.attenuation(-Vec3::Z) - 1.0).abs() < EPSILON);
        assert!(microphone.attenuation(Vec3::Z).abs() < EPSILON);
        assert!((microphone.attenuation(Vec3::X) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_bidirectional_inverts_polarity_behind() {
        let microphone = Microphone::new(Orientation::new(-Vec3::Z), 1.0);
        assert!((microphone.attenuation(-Vec3::Z) - 1.0).abs() < EPSILON);
        assert!((microphone.attenuation(Vec3::Z) + 1.0).abs() < EPSILON);
        assert!(microphone.attenuation(Vec3::X).abs() < EPSILON);
    }

    #[test]
    fn test_ears_are_mirrored() {
        // Head faces -Z, so the right ear points towards +X.
        let left = HrtfEar::new(Orientation::default(), HrtfChannel::Left);
        let right = HrtfEar::new(Orientation::default(), HrtfChannel::Right);

        let from_right = Vec3::X;
        let left_gains = left.band_attenuation(from_right);
        let right_gains = right.band_attenuation(from_right);

        // The far ear is shadowed, most strongly in the top band.
        let top = SIMULATION_BANDS - 1;
        assert!(right_gains[top] > left_gains[top]);
        assert!((right_gains[0] - 1.0).abs() < EPSILON);

        // Mirrored arrival gives mirrored gains.
        let from_left = -Vec3::X;
        assert_eq!(left.band_attenuation(from_left), right_gains);
    }

    #[test]
    fn test_shadow_grows_with_frequency() {
        let right = HrtfEar::new(Orientation::default(), HrtfChannel::Right);
        let gains = right.band_attenuation(-Vec3::X);
        for band in 1..SIMULATION_BANDS {
            assert!(gains[band] <= gains[band - 1]);
        }
    }

    #[test]
    fn test_interaural_delay() {
        let right = HrtfEar::new(Orientation::default(), HrtfChannel::Right);
        let speed_of_sound = 340.0;

        let near = right.delay_seconds(Vec3::X, speed_of_sound);
        let far = right.delay_seconds(-Vec3::X, speed_of_sound);
        assert!(near.abs() < EPSILON);
        assert!(far > near);
        // Maximum detour stays under a millisecond.
        assert!(far < 1e-3);
    }

    #[test]
    fn test_vertical_head_falls_back() {
        let ear = HrtfEar::new(Orientation::new(Vec3::Y), HrtfChannel::Right);
        // Still produces a usable ear axis.
        assert!((ear.band_attenuation(Vec3::X)[0] - 1.0).abs() < EPSILON);
    }
}
