//! Math types for Auralize

pub use glam::{Quat, Vec3};

/// The direction an object faces, stored as a unit vector.
///
/// The neutral orientation points down negative Z with Y up, matching the
/// coordinate conventions used throughout the crate. Receivers and capsules
/// both carry an `Orientation`; a capsule's orientation is interpreted
/// relative to its receiver via [`Orientation::relative_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pointing: Vec3,
}

impl Orientation {
    /// Creates an orientation pointing along `pointing`.
    ///
    /// The vector is normalized; a zero-length vector falls back to the
    /// neutral forward direction (negative Z).
    pub fn new(pointing: Vec3) -> Self {
        let pointing = pointing.normalize_or_zero();
        if pointing == Vec3::ZERO {
            Self { pointing: -Vec3::Z }
        } else {
            Self { pointing }
        }
    }

    /// Creates an orientation from spherical angles in radians.
    ///
    /// Azimuth rotates around Y (0 faces negative Z, positive towards
    /// positive X), elevation tilts towards positive Y.
    pub fn from_azimuth_elevation(azimuth: f32, elevation: f32) -> Self {
        let pointing = Vec3::new(
            azimuth.sin() * elevation.cos(),
            elevation.sin(),
            -azimuth.cos() * elevation.cos(),
        );
        Self::new(pointing)
    }

    /// Creates an orientation facing from `position` towards `target`.
    pub fn towards(position: Vec3, target: Vec3) -> Self {
        Self::new(target - position)
    }

    pub fn pointing(&self) -> Vec3 {
        self.pointing
    }

    /// Azimuth angle in radians, in `(-PI, PI]`.
    pub fn azimuth(&self) -> f32 {
        self.pointing.x.atan2(-self.pointing.z)
    }

    /// Elevation angle in radians, in `[-PI/2, PI/2]`.
    pub fn elevation(&self) -> f32 {
        self.pointing.y.clamp(-1.0, 1.0).asin()
    }

    /// Interprets `self` as local to `parent` and returns the combined
    /// world-space orientation.
    pub fn relative_to(&self, parent: &Orientation) -> Orientation {
        let rotation = Quat::from_rotation_arc(-Vec3::Z, parent.pointing);
        Orientation::new(rotation * self.pointing)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self { pointing: -Vec3::Z }
    }
}
