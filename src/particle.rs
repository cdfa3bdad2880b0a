//! Particle records and behavior tags.
//!
//! A [`Particle`] is the CPU-side record of one simulation slot. The GPU holds
//! the same data packed into three parallel `vec4<f32>` buffers (see
//! [`crate::store`]); between uploads the CPU record is authoritative.

use glam::Vec3;

/// Behavior tag consumed by the compute kernel.
///
/// The tag is stored as an `f32` in the `w` channel of the GPU position
/// buffer, so the discriminants are chosen to survive an exact float
/// round-trip.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticleKind {
    /// Empty buffer slot. Exerts no force, receives no force, never moves.
    Undefined = -1,
    /// Normal particle: exerts force, integrates velocity and position.
    #[default]
    Default = 0,
    /// Field probe: exerts no force on others and never collides; its
    /// velocity output is the net instantaneous force at its position.
    Probe = 1,
    /// Anchored particle: exerts force but never integrates.
    Fixed = 2,
}

impl ParticleKind {
    /// Encode for the GPU position buffer `w` channel.
    pub fn encode(self) -> f32 {
        self as i32 as f32
    }

    /// Decode from the GPU position buffer `w` channel.
    pub fn decode(value: f32) -> Self {
        match value as i32 {
            0 => ParticleKind::Default,
            1 => ParticleKind::Probe,
            2 => ParticleKind::Fixed,
            _ => ParticleKind::Undefined,
        }
    }
}

/// Base factor for the derived display radius.
const RADIUS_BASE: f32 = 0.5;
/// Derived radii are clamped into this range so massless and super-heavy
/// particles both stay selectable.
const RADIUS_MIN: f32 = 0.1;
const RADIUS_MAX: f32 = 10.0;

/// One particle of the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Stable unique id, assigned by the store, never reused while alive.
    pub id: u64,
    /// Behavior tag.
    pub kind: ParticleKind,
    /// Signed mass.
    pub mass: f32,
    /// Signed electric charge.
    pub charge: f32,
    /// Signed nuclear charge. Its magnitude also selects the discrete
    /// color-charge class, see [`Particle::color_index`].
    pub nuclear_charge: f32,
    /// Position. The z component is forced to zero in 2D mode.
    pub position: Vec3,
    /// Velocity. For probes this holds the sampled field force instead.
    pub velocity: Vec3,
    /// Monotonically increasing inelastic-collision counter. Kept as `f32`
    /// because it lives in the `w` channel of the GPU velocity buffer.
    pub collisions: f32,
    /// Derived display/selection radius. Not force-bearing.
    pub radius: f32,
}

impl Particle {
    /// Create a default-kind particle. The id is assigned on store insertion.
    pub fn new(mass: f32, charge: f32, nuclear_charge: f32, position: Vec3) -> Self {
        Self {
            id: 0,
            kind: ParticleKind::Default,
            mass,
            charge,
            nuclear_charge,
            position,
            velocity: Vec3::ZERO,
            collisions: 0.0,
            radius: derived_radius(mass),
        }
    }

    /// Create an anchored particle that exerts force but never moves.
    pub fn new_fixed(mass: f32, charge: f32, nuclear_charge: f32, position: Vec3) -> Self {
        Self {
            kind: ParticleKind::Fixed,
            ..Self::new(mass, charge, nuclear_charge, position)
        }
    }

    /// Create a field probe with the given test properties.
    pub fn new_probe(mass: f32, charge: f32, nuclear_charge: f32, position: Vec3) -> Self {
        Self {
            kind: ParticleKind::Probe,
            ..Self::new(mass, charge, nuclear_charge, position)
        }
    }

    /// Discrete color-charge class in `0..=3`, derived from the nuclear
    /// charge magnitude. Class 0 is colorless. The WGSL kernel derives the
    /// same index with the same expression.
    pub fn color_index(&self) -> u32 {
        color_index(self.nuclear_charge)
    }

    /// Recompute the derived display radius after a mass edit.
    pub fn refresh_radius(&mut self) {
        self.radius = derived_radius(self.mass);
    }

    /// Whether every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        self.mass.is_finite()
            && self.charge.is_finite()
            && self.nuclear_charge.is_finite()
            && self.position.is_finite()
            && self.velocity.is_finite()
            && self.collisions.is_finite()
    }
}

/// Color class derived from a nuclear charge value.
pub fn color_index(nuclear_charge: f32) -> u32 {
    (nuclear_charge.abs() as u32).min(3)
}

/// Color-affinity factor between two color classes.
///
/// Class 0 mixes with everything at full strength. The three colored classes
/// are dot products of three unit vectors at 120 degrees: same color gives
/// +1.0, different colors give -0.5. The WGSL kernel carries the same table.
pub fn color_affinity(a: u32, b: u32) -> f32 {
    if a == 0 || b == 0 {
        return 1.0;
    }
    let table = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-0.5, 0.866_025_4, 0.0),
        Vec3::new(-0.5, -0.866_025_4, 0.0),
    ];
    table[(a - 1) as usize].dot(table[(b - 1) as usize])
}

fn derived_radius(mass: f32) -> f32 {
    (RADIUS_BASE * mass.abs().cbrt()).clamp(RADIUS_MIN, RADIUS_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_f32() {
        for kind in [
            ParticleKind::Undefined,
            ParticleKind::Default,
            ParticleKind::Probe,
            ParticleKind::Fixed,
        ] {
            assert_eq!(ParticleKind::decode(kind.encode()), kind);
        }
    }

    #[test]
    fn color_index_clamps_to_three_classes() {
        assert_eq!(color_index(0.0), 0);
        assert_eq!(color_index(0.5), 0);
        assert_eq!(color_index(1.0), 1);
        assert_eq!(color_index(-2.0), 2);
        assert_eq!(color_index(3.0), 3);
        assert_eq!(color_index(17.0), 3);
    }

    #[test]
    fn color_affinity_matches_share_oppose_rule() {
        for c in 0..4 {
            assert_eq!(color_affinity(0, c), 1.0);
            assert_eq!(color_affinity(c, 0), 1.0);
        }
        for c in 1..4 {
            assert!((color_affinity(c, c) - 1.0).abs() < 1e-6);
        }
        assert!((color_affinity(1, 2) + 0.5).abs() < 1e-6);
        assert!((color_affinity(2, 3) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn radius_tracks_mass() {
        let mut p = Particle::new(1.0, 0.0, 0.0, Vec3::ZERO);
        let small = p.radius;
        p.mass = 1000.0;
        p.refresh_radius();
        assert!(p.radius > small);
    }
}
