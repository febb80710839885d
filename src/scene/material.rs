//! Acoustic surface properties for room simulation.
//!
//! Surfaces describe how walls interact with sound across eight octave bands
//! (62.5 Hz through 8 kHz). Both simulation stages consume the same surface
//! table: the image-source stage reflects energy band-by-band, the waveguide
//! stage derives boundary coefficients from the low bands.

/// Number of frequency bands carried through the simulation.
///
/// Band `n` is the octave band centred on `62.5 * 2^n` Hz.
pub const SIMULATION_BANDS: usize = 8;

/// Acoustic properties of a surface, per octave band.
///
/// - **Absorption**: fraction of incident energy absorbed on reflection
/// - **Scattering**: fraction of reflected energy scattered diffusely
///   rather than specularly
///
/// # Example
///
/// ```
/// use auralize::scene::Surface;
///
/// // Use a preset
/// let walls = Surface::BRICK;
///
/// // Or build a flat response
/// let test_surface = Surface::uniform(0.1, 0.05);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    /// Fraction of sound energy absorbed per band (0.0 - 1.0)
    pub absorption: [f32; SIMULATION_BANDS],

    /// Fraction of sound energy scattered per band (0.0 - 1.0)
    pub scattering: [f32; SIMULATION_BANDS],
}

impl Surface {
    /// Generic default surface with moderate absorption
    pub const GENERIC: Self = Self {
        absorption: [0.08, 0.08, 0.10, 0.12, 0.14, 0.16, 0.18, 0.20],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Brick - hard, reflective at all bands
    pub const BRICK: Self = Self {
        absorption: [0.03, 0.03, 0.03, 0.04, 0.05, 0.07, 0.07, 0.07],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Concrete - very reflective
    pub const CONCRETE: Self = Self {
        absorption: [0.01, 0.01, 0.02, 0.02, 0.02, 0.02, 0.05, 0.05],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Carpet on concrete - strong high-frequency absorption
    pub const CARPET: Self = Self {
        absorption: [0.02, 0.04, 0.08, 0.20, 0.35, 0.40, 0.50, 0.60],
        scattering: [0.10, 0.10, 0.10, 0.10, 0.10, 0.10, 0.10, 0.10],
    };

    /// Wood panelling - absorbs low frequencies, reflects highs
    pub const WOOD: Self = Self {
        absorption: [0.25, 0.25, 0.15, 0.10, 0.09, 0.08, 0.07, 0.07],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Plaster on lath - moderately reflective
    pub const PLASTER: Self = Self {
        absorption: [0.14, 0.14, 0.10, 0.06, 0.04, 0.04, 0.03, 0.03],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Glass window - reflective, slight low-frequency absorption
    pub const GLASS: Self = Self {
        absorption: [0.10, 0.10, 0.06, 0.04, 0.03, 0.02, 0.02, 0.02],
        scattering: [0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
    };

    /// Heavy curtain - very absorptive above the low bands
    pub const CURTAIN: Self = Self {
        absorption: [0.07, 0.14, 0.31, 0.49, 0.75, 0.70, 0.60, 0.60],
        scattering: [0.15, 0.15, 0.15, 0.15, 0.15, 0.15, 0.15, 0.15],
    };

    /// Creates a surface with the same absorption and scattering in every band.
    pub const fn uniform(absorption: f32, scattering: f32) -> Self {
        Self {
            absorption: [absorption; SIMULATION_BANDS],
            scattering: [scattering; SIMULATION_BANDS],
        }
    }

    /// Validates that all band values are within [0.0, 1.0]
    pub fn validate(&self) -> Result<(), &'static str> {
        for &val in &self.absorption {
            if !(0.0..=1.0).contains(&val) {
                return Err("Absorption values must be between 0.0 and 1.0");
            }
        }

        for &val in &self.scattering {
            if !(0.0..=1.0).contains(&val) {
                return Err("Scattering values must be between 0.0 and 1.0");
            }
        }

        Ok(())
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::GENERIC
    }
}
