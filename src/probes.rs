//! Field probes.
//!
//! Probes are `ParticleKind::Probe` particles arranged on a regular grid.
//! They never exert force, never collide, and never integrate; the kernel
//! writes the net instantaneous force at their position into their velocity
//! channel, so one recompute turns the grid into a sampled force field.
//!
//! Probe layout math lives here; the drain/flush choreography around it is
//! [`crate::engine::Simulation`]'s job.

use crate::error::CoreError;
use crate::particle::{Particle, ParticleKind};
use crate::store::ParticleStore;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Spatial arrangement of the probe grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeLayout {
    /// Regular lattice filling an axis-aligned cube.
    Cube,
    /// Concentric spherical shells: polar rings × azimuthal segments × shells.
    Sphere,
}

/// Probe grid description.
#[derive(Clone, Copy, Debug)]
pub struct ProbeGrid {
    pub layout: ProbeLayout,
    /// Points per axis: `[x, y, z]` for a cube, `[polar, azimuthal, shells]`
    /// for a sphere.
    pub dims: [u32; 3],
    /// Cube half-extent or outermost shell radius.
    pub extent: f32,
    /// Test properties carried by every probe.
    pub mass: f32,
    pub charge: f32,
    pub nuclear_charge: f32,
}

impl ProbeGrid {
    /// Number of probes this grid produces.
    pub fn count(&self) -> usize {
        (self.dims[0] * self.dims[1] * self.dims[2]) as usize
    }

    /// Grid point positions around a center, in stable iteration order.
    pub fn positions(&self, center: Vec3) -> Vec<Vec3> {
        let mut points = Vec::with_capacity(self.count());
        let [nx, ny, nz] = self.dims;
        match self.layout {
            ProbeLayout::Cube => {
                for iz in 0..nz {
                    for iy in 0..ny {
                        for ix in 0..nx {
                            points.push(center + Vec3::new(
                                axis_offset(ix, nx, self.extent),
                                axis_offset(iy, ny, self.extent),
                                axis_offset(iz, nz, self.extent),
                            ));
                        }
                    }
                }
            }
            ProbeLayout::Sphere => {
                for shell in 0..nz {
                    let radius = self.extent * (shell + 1) as f32 / nz as f32;
                    for ring in 0..nx {
                        // Poles are skipped so rings stay non-degenerate.
                        let polar = PI * (ring + 1) as f32 / (nx + 1) as f32;
                        for segment in 0..ny {
                            let azimuth = TAU * segment as f32 / ny as f32;
                            points.push(center + Vec3::new(
                                radius * polar.sin() * azimuth.cos(),
                                radius * polar.cos(),
                                radius * polar.sin() * azimuth.sin(),
                            ));
                        }
                    }
                }
            }
        }
        points
    }
}

/// Replace any existing probes with a freshly laid-out grid.
///
/// Capacity is validated up front against the non-probe population; on
/// failure the store is untouched, existing probes included.
pub fn setup(store: &mut ParticleStore, grid: &ProbeGrid, center: Vec3) -> Result<(), CoreError> {
    let existing_probes = count(store);
    let non_probes = store.len() - existing_probes;
    let requested = non_probes + grid.count();
    if requested > store.capacity() {
        return Err(CoreError::CapacityExceeded {
            requested,
            capacity: store.capacity(),
        });
    }

    cleanup(store);
    for position in grid.positions(center) {
        store.add(Particle::new_probe(
            grid.mass,
            grid.charge,
            grid.nuclear_charge,
            position,
        ))?;
    }
    Ok(())
}

/// Recompute grid point positions in place without changing the probe count.
pub fn resize(store: &mut ParticleStore, grid: &ProbeGrid, center: Vec3) -> Result<(), CoreError> {
    let existing = count(store);
    if existing != grid.count() {
        return Err(CoreError::InvalidInput(format!(
            "probe grid holds {} points but the store has {} probes",
            grid.count(),
            existing
        )));
    }
    let positions = grid.positions(center);
    let mut next = 0;
    for particle in store.particles_mut() {
        if particle.kind == ParticleKind::Probe {
            particle.position = positions[next];
            particle.velocity = Vec3::ZERO;
            next += 1;
        }
    }
    Ok(())
}

/// Remove every probe from the store.
pub fn cleanup(store: &mut ParticleStore) {
    store.retain(|p| p.kind != ParticleKind::Probe);
}

/// Number of probes currently in the store.
pub fn count(store: &ParticleStore) -> usize {
    store
        .particles()
        .iter()
        .filter(|p| p.kind == ParticleKind::Probe)
        .count()
}

fn axis_offset(i: u32, n: u32, extent: f32) -> f32 {
    if n <= 1 {
        0.0
    } else {
        -extent + 2.0 * extent * i as f32 / (n - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(layout: ProbeLayout, dims: [u32; 3]) -> ProbeGrid {
        ProbeGrid {
            layout,
            dims,
            extent: 10.0,
            mass: 1.0,
            charge: 1.0,
            nuclear_charge: 0.0,
        }
    }

    #[test]
    fn cube_grid_spans_the_extent() {
        let g = grid(ProbeLayout::Cube, [3, 3, 3]);
        let points = g.positions(Vec3::ZERO);
        assert_eq!(points.len(), 27);
        assert_eq!(points[0], Vec3::new(-10.0, -10.0, -10.0));
        assert_eq!(points[13], Vec3::ZERO);
        assert_eq!(points[26], Vec3::new(10.0, 10.0, 10.0));
    }

    #[test]
    fn sphere_grid_points_sit_on_their_shells() {
        let g = grid(ProbeLayout::Sphere, [4, 8, 2]);
        let points = g.positions(Vec3::ZERO);
        assert_eq!(points.len(), 64);
        for point in &points[..32] {
            assert!((point.length() - 5.0).abs() < 1e-4);
        }
        for point in &points[32..] {
            assert!((point.length() - 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn setup_respects_capacity_and_leaves_state_intact() {
        let mut store = ParticleStore::new(4);
        for _ in 0..6 {
            store
                .add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO))
                .unwrap();
        }
        let g = grid(ProbeLayout::Cube, [2, 2, 2]);
        setup(&mut store, &g, Vec3::ZERO).unwrap();
        assert_eq!(count(&store), 8);

        // 6 non-probes + 27 probes > 16 slots: refused, old probes intact.
        let too_big = grid(ProbeLayout::Cube, [3, 3, 3]);
        let err = setup(&mut store, &too_big, Vec3::ZERO);
        assert!(matches!(err, Err(CoreError::CapacityExceeded { .. })));
        assert_eq!(count(&store), 8);
        assert_eq!(store.len(), 14);
    }

    #[test]
    fn setup_replaces_previous_probes() {
        let mut store = ParticleStore::new(8);
        let g = grid(ProbeLayout::Cube, [2, 2, 2]);
        setup(&mut store, &g, Vec3::ZERO).unwrap();
        setup(&mut store, &g, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(count(&store), 8);
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn resize_moves_probes_without_changing_count() {
        let mut store = ParticleStore::new(4);
        store
            .add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO))
            .unwrap();
        let g = grid(ProbeLayout::Cube, [2, 2, 2]);
        setup(&mut store, &g, Vec3::ZERO).unwrap();
        let before: Vec<Vec3> = store
            .particles()
            .iter()
            .filter(|p| p.kind == ParticleKind::Probe)
            .map(|p| p.position)
            .collect();

        resize(&mut store, &g, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        let after: Vec<Vec3> = store
            .particles()
            .iter()
            .filter(|p| p.kind == ParticleKind::Probe)
            .map(|p| p.position)
            .collect();
        assert_eq!(store.len(), 9);
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(*a - *b, Vec3::new(5.0, 0.0, 0.0));
        }
    }

    #[test]
    fn cleanup_removes_only_probes() {
        let mut store = ParticleStore::new(4);
        store
            .add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO))
            .unwrap();
        setup(&mut store, &grid(ProbeLayout::Cube, [2, 2, 2]), Vec3::ZERO).unwrap();
        cleanup(&mut store);
        assert_eq!(store.len(), 1);
        assert_eq!(count(&store), 0);
    }
}
