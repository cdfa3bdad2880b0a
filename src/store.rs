//! Fixed-capacity particle store and the packed buffer layout.
//!
//! The store is the CPU-authoritative copy of the simulation state. Packing
//! produces the three parallel `vec4<f32>` buffers the kernel consumes;
//! unpacking applies a readback frame to the live records in upload order.
//! Capacity is `side²`, one slot per texel of a square state grid, and is
//! fixed for the lifetime of a kernel instance.

use crate::error::CoreError;
use crate::particle::{Particle, ParticleKind};
use glam::{Vec2, Vec3};

/// One CPU-side snapshot of the packed kernel state.
///
/// Layouts per slot:
/// - `properties`: `(id, mass, charge, nuclear_charge)`
/// - `positions`: `(x, y, z, kind)`
/// - `velocities`: `(x, y, z, collisions)`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    pub properties: Vec<[f32; 4]>,
    pub positions: Vec<[f32; 4]>,
    pub velocities: Vec<[f32; 4]>,
}

impl FrameData {
    /// An all-`Undefined` frame of the given capacity.
    pub fn empty(capacity: usize) -> Self {
        Self {
            properties: vec![[0.0; 4]; capacity],
            positions: vec![[0.0, 0.0, 0.0, ParticleKind::Undefined.encode()]; capacity],
            velocities: vec![[0.0; 4]; capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }
}

/// Fixed-capacity, id-allocating particle store.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    side: u32,
    particles: Vec<Particle>,
    next_id: u64,
}

impl ParticleStore {
    /// Create an empty store backed by a `side × side` state grid.
    pub fn new(side: u32) -> Self {
        Self {
            side,
            particles: Vec::new(),
            next_id: 1,
        }
    }

    /// Side length of the square state grid.
    pub fn side(&self) -> u32 {
        self.side
    }

    /// Maximum number of live particles.
    pub fn capacity(&self) -> usize {
        (self.side * self.side) as usize
    }

    /// Change the grid side length. Fails without mutating anything when the
    /// live population would no longer fit.
    pub fn set_side(&mut self, side: u32) -> Result<(), CoreError> {
        let capacity = (side * side) as usize;
        if self.particles.len() > capacity {
            return Err(CoreError::CapacityExceeded {
                requested: self.particles.len(),
                capacity,
            });
        }
        self.side = side;
        Ok(())
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the store holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Live particles in slot order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access in slot order. Callers go through
    /// [`crate::engine::Simulation::edit`] so the drain/flush contract holds.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Look up a particle by id.
    pub fn get(&self, id: u64) -> Option<&Particle> {
        self.particles.iter().find(|p| p.id == id)
    }

    /// Insert a particle, assigning it a fresh id. Fails without mutating
    /// anything when the store is full.
    pub fn add(&mut self, mut particle: Particle) -> Result<u64, CoreError> {
        if self.particles.len() + 1 > self.capacity() {
            return Err(CoreError::CapacityExceeded {
                requested: self.particles.len() + 1,
                capacity: self.capacity(),
            });
        }
        if !particle.is_finite() {
            return Err(CoreError::InvalidInput(
                "particle fields must be finite".into(),
            ));
        }
        let id = self.next_id;
        self.next_id += 1;
        particle.id = id;
        particle.refresh_radius();
        self.particles.push(particle);
        Ok(id)
    }

    /// Insert a copy of an existing particle under a fresh id.
    pub fn clone_particle(&mut self, id: u64) -> Result<u64, CoreError> {
        let source = self
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::InvalidInput(format!("no particle with id {id}")))?;
        self.add(source)
    }

    /// Remove a particle by id, splicing the live array. Later slots shift
    /// down; ids are never recycled.
    pub fn remove(&mut self, id: u64) -> Option<Particle> {
        let index = self.particles.iter().position(|p| p.id == id)?;
        Some(self.particles.remove(index))
    }

    /// Remove every particle matching the predicate, preserving order.
    pub fn retain<F: FnMut(&Particle) -> bool>(&mut self, keep: F) {
        self.particles.retain(keep);
    }

    /// Replace the whole population. Fails without mutating anything when the
    /// list exceeds capacity; ids are reassigned in order.
    pub fn replace_all(&mut self, list: Vec<Particle>) -> Result<(), CoreError> {
        if list.len() > self.capacity() {
            return Err(CoreError::CapacityExceeded {
                requested: list.len(),
                capacity: self.capacity(),
            });
        }
        if let Some(bad) = list.iter().find(|p| !p.is_finite()) {
            return Err(CoreError::InvalidInput(format!(
                "particle at position {:?} has non-finite fields",
                bad.position
            )));
        }
        self.particles = list;
        for particle in &mut self.particles {
            particle.id = self.next_id;
            self.next_id += 1;
            particle.refresh_radius();
        }
        Ok(())
    }

    /// Texel coordinate of a slot on the square state grid, stable from one
    /// upload to the next. Renderers use this to map a CPU record to its GPU
    /// slot without re-deriving the layout.
    pub fn slot_uv(&self, slot: usize) -> Vec2 {
        let side = self.side as f32;
        let x = (slot as u32 % self.side) as f32;
        let y = (slot as u32 / self.side) as f32;
        Vec2::new((x + 0.5) / side, (y + 0.5) / side)
    }

    /// Pack the live particles into a full-capacity frame, zero-filling the
    /// tail with `Undefined` slots.
    pub fn pack(&self) -> Result<FrameData, CoreError> {
        if self.particles.len() > self.capacity() {
            return Err(CoreError::CapacityExceeded {
                requested: self.particles.len(),
                capacity: self.capacity(),
            });
        }
        let mut frame = FrameData::empty(self.capacity());
        for (slot, p) in self.particles.iter().enumerate() {
            frame.properties[slot] = [p.id as f32, p.mass, p.charge, p.nuclear_charge];
            frame.positions[slot] = [
                p.position.x,
                p.position.y,
                p.position.z,
                p.kind.encode(),
            ];
            frame.velocities[slot] = [
                p.velocity.x,
                p.velocity.y,
                p.velocity.z,
                p.collisions,
            ];
        }
        Ok(frame)
    }

    /// Apply a readback frame to the live particles, in upload order.
    ///
    /// Only kernel-written channels are taken from the frame (position,
    /// kind, velocity, collision counter); identity and scalar properties
    /// stay CPU-authoritative.
    pub fn apply_frame(&mut self, frame: &FrameData) {
        for (slot, particle) in self.particles.iter_mut().enumerate() {
            let pos = frame.positions[slot];
            let vel = frame.velocities[slot];
            particle.position = Vec3::new(pos[0], pos[1], pos[2]);
            particle.kind = ParticleKind::decode(pos[3]);
            particle.velocity = Vec3::new(vel[0], vel[1], vel[2]);
            particle.collisions = vel[3];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(side: u32, count: usize) -> ParticleStore {
        let mut store = ParticleStore::new(side);
        for i in 0..count {
            store
                .add(Particle::new(
                    1.0 + i as f32,
                    -0.5,
                    1.0,
                    Vec3::new(i as f32, 0.0, 0.0),
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn capacity_is_side_squared() {
        assert_eq!(ParticleStore::new(8).capacity(), 64);
    }

    #[test]
    fn add_past_capacity_fails_without_mutation() {
        let mut store = store_with(2, 4);
        let before = store.particles().to_vec();
        let err = store.add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO));
        assert!(matches!(err, Err(CoreError::CapacityExceeded { .. })));
        assert_eq!(store.particles(), &before[..]);
    }

    #[test]
    fn exact_capacity_fill_leaves_no_undefined_slots() {
        let store = store_with(2, 4);
        let frame = store.pack().unwrap();
        for slot in frame.positions {
            assert_ne!(ParticleKind::decode(slot[3]), ParticleKind::Undefined);
        }
    }

    #[test]
    fn pack_zero_fills_the_tail() {
        let store = store_with(4, 3);
        let frame = store.pack().unwrap();
        assert_eq!(frame.capacity(), 16);
        for slot in 3..16 {
            assert_eq!(
                ParticleKind::decode(frame.positions[slot][3]),
                ParticleKind::Undefined
            );
            assert_eq!(frame.properties[slot], [0.0; 4]);
            assert_eq!(frame.velocities[slot], [0.0; 4]);
        }
    }

    #[test]
    fn pack_apply_round_trip_is_exact() {
        let mut store = store_with(4, 7);
        for (i, p) in store.particles_mut().iter_mut().enumerate() {
            p.velocity = Vec3::new(0.25 * i as f32, -1.5, 3.0);
            p.collisions = i as f32;
        }
        let before = store.particles().to_vec();
        let frame = store.pack().unwrap();
        store.apply_frame(&frame);
        assert_eq!(store.particles(), &before[..]);
    }

    #[test]
    fn ids_are_never_recycled() {
        let mut store = store_with(4, 3);
        let removed = store.particles()[1].id;
        store.remove(removed);
        let new_id = store.add(Particle::new(1.0, 0.0, 0.0, Vec3::ZERO)).unwrap();
        assert!(new_id > removed);
        assert!(store.particles().iter().all(|p| p.id != removed));
    }

    #[test]
    fn remove_compacts_order() {
        let mut store = store_with(4, 3);
        let first = store.particles()[0].id;
        store.remove(first);
        assert_eq!(store.len(), 2);
        assert_eq!(store.particles()[0].mass, 2.0);
    }

    #[test]
    fn slot_uv_centers_texels() {
        let store = ParticleStore::new(4);
        assert_eq!(store.slot_uv(0), Vec2::new(0.125, 0.125));
        assert_eq!(store.slot_uv(5), Vec2::new(0.375, 0.375));
        assert_eq!(store.slot_uv(15), Vec2::new(0.875, 0.875));
    }

    #[test]
    fn replace_all_checks_capacity_first() {
        let mut store = store_with(2, 2);
        let before = store.particles().to_vec();
        let oversized: Vec<Particle> = (0..5)
            .map(|_| Particle::new(1.0, 0.0, 0.0, Vec3::ZERO))
            .collect();
        assert!(store.replace_all(oversized).is_err());
        assert_eq!(store.particles(), &before[..]);
    }
}
