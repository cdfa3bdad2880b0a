//! Runtime physics constants.
//!
//! Everything in [`Physics`] can be changed between steps without rebuilding
//! the kernel: the values are packed into a small uniform block and rewritten
//! in place. Structural choices (potential shape, boundary shape, falloff
//! exponent, 2D/3D) live in [`crate::kernel::KernelOptions`] instead, because
//! changing them requires shader regeneration.

use crate::error::CoreError;
use bytemuck::{Pod, Zeroable};

/// Tunable physics constants, CPU-facing.
#[derive(Debug, Clone, PartialEq)]
pub struct Physics {
    /// Global multiplier applied to the accumulated pair force.
    pub force_constant: f32,
    /// Gravitational-like coupling: `mass_constant * m1 * m2 / d`.
    pub mass_constant: f32,
    /// Electric-like coupling: `-charge_constant * q1 * q2 / d`.
    pub charge_constant: f32,
    /// Nuclear coupling: scales the selected potential shape.
    pub nuclear_constant: f32,
    /// Range of the nuclear term; pairs beyond it skip the potential.
    pub nuclear_range: f32,
    /// Pairs closer than this undergo inelastic collision instead of forces.
    pub min_distance: f32,
    /// Boundary radius (sphere) or half-extent (box).
    pub boundary_distance: f32,
    /// Velocity attenuation applied on boundary reflection.
    pub boundary_damping: f32,
    /// Multiply the nuclear term by the color-charge affinity factor.
    pub color_mixing: bool,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            force_constant: 1.0,
            mass_constant: 1.0e-2,
            charge_constant: 1.0e-2,
            nuclear_constant: 1.0,
            nuclear_range: 4.0,
            min_distance: 0.5,
            boundary_distance: 100.0,
            boundary_damping: 0.9,
            color_mixing: true,
        }
    }
}

impl Physics {
    /// Reject non-finite or nonsensical values before they reach a uniform
    /// write. Nothing is applied on failure.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("force_constant", self.force_constant),
            ("mass_constant", self.mass_constant),
            ("charge_constant", self.charge_constant),
            ("nuclear_constant", self.nuclear_constant),
            ("nuclear_range", self.nuclear_range),
            ("min_distance", self.min_distance),
            ("boundary_distance", self.boundary_distance),
            ("boundary_damping", self.boundary_damping),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(CoreError::InvalidInput(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.nuclear_range < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "nuclear_range must be non-negative, got {}",
                self.nuclear_range
            )));
        }
        if self.min_distance < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "min_distance must be non-negative, got {}",
                self.min_distance
            )));
        }
        if self.boundary_distance <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "boundary_distance must be positive, got {}",
                self.boundary_distance
            )));
        }
        Ok(())
    }

    /// Pack into the GPU uniform block.
    pub fn to_uniforms(&self) -> PhysicsUniforms {
        PhysicsUniforms {
            force: [
                self.force_constant,
                self.mass_constant,
                self.charge_constant,
                self.nuclear_constant,
            ],
            nuclear: [
                self.nuclear_range,
                self.nuclear_range * self.nuclear_range,
                self.min_distance * self.min_distance,
                if self.color_mixing { 1.0 } else { 0.0 },
            ],
            boundary: [self.boundary_distance, self.boundary_damping, 0.0, 0.0],
        }
    }
}

/// Uniform block consumed by both compute passes (matches the WGSL `Physics`
/// struct emitted by the kernel codegen).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PhysicsUniforms {
    // x: force_constant, y: mass_constant, z: charge_constant, w: nuclear_constant
    pub force: [f32; 4],
    // x: nuclear_range, y: nuclear_range^2, z: min_distance^2, w: color mixing flag
    pub nuclear: [f32; 4],
    // x: boundary_distance, y: boundary_damping, z/w: padding
    pub boundary: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_three_vec4s() {
        assert_eq!(std::mem::size_of::<PhysicsUniforms>(), 48);
    }

    #[test]
    fn to_uniforms_precomputes_squares() {
        let physics = Physics {
            nuclear_range: 3.0,
            min_distance: 2.0,
            ..Physics::default()
        };
        let u = physics.to_uniforms();
        assert_eq!(u.nuclear[0], 3.0);
        assert_eq!(u.nuclear[1], 9.0);
        assert_eq!(u.nuclear[2], 4.0);
    }

    #[test]
    fn validate_rejects_non_finite() {
        let physics = Physics {
            mass_constant: f32::NAN,
            ..Physics::default()
        };
        assert!(physics.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_range() {
        let physics = Physics {
            nuclear_range: -1.0,
            ..Physics::default()
        };
        assert!(physics.validate().is_err());
    }
}
