//! CPU force kernel.
//!
//! Runs the same two passes as the GPU kernel (identical pair loop,
//! identical formulas, identical buffer layout) with rayon spreading slots
//! across threads. Each pass reads only the frozen buffers of the previous
//! pass and collects its outputs into a fresh buffer, preserving the
//! snapshot-read / separate-write discipline that makes the all-pairs pass
//! order-independent.
//!
//! This is the kernel of choice for headless use and for tests; the physics
//! properties it exhibits are the contract the GPU kernel is held to.

use crate::error::CoreError;
use crate::kernel::{BoundaryShape, KernelOptions, SimSpace};
use crate::particle::{color_affinity, color_index};
use crate::physics::Physics;
use crate::store::FrameData;
use crate::ForceKernel;
use glam::Vec3;
use rayon::prelude::*;

const KIND_UNDEFINED: f32 = -1.0;
const KIND_DEFAULT: f32 = 0.0;
const KIND_PROBE: f32 = 1.0;
const KIND_FIXED: f32 = 2.0;

/// CPU implementation of [`ForceKernel`].
pub struct CpuKernel {
    options: KernelOptions,
    physics: Physics,
    capacity: usize,
    properties: Vec<[f32; 4]>,
    positions: [Vec<[f32; 4]>; 2],
    velocities: [Vec<[f32; 4]>; 2],
    steps: u64,
    uploaded: bool,
}

impl CpuKernel {
    /// Build a kernel for a `side × side` state grid.
    pub fn new(side: u32, options: KernelOptions, physics: Physics) -> Self {
        let capacity = (side * side) as usize;
        log::debug!(
            "building CPU kernel: {} slots, options {:?}",
            capacity,
            options
        );
        let empty = FrameData::empty(capacity);
        Self {
            options,
            physics,
            capacity,
            properties: empty.properties.clone(),
            positions: [empty.positions.clone(), empty.positions.clone()],
            velocities: [empty.velocities.clone(), empty.velocities],
            steps: 0,
            uploaded: false,
        }
    }

    fn current(&self) -> usize {
        (self.steps % 2) as usize
    }
}

impl ForceKernel for CpuKernel {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn steps(&self) -> u64 {
        self.steps
    }

    fn rebuild(
        &mut self,
        side: u32,
        options: &KernelOptions,
        physics: &Physics,
    ) -> Result<(), CoreError> {
        *self = CpuKernel::new(side, *options, physics.clone());
        Ok(())
    }

    fn upload(&mut self, frame: &FrameData) -> Result<(), CoreError> {
        if frame.capacity() != self.capacity {
            return Err(CoreError::CapacityExceeded {
                requested: frame.capacity(),
                capacity: self.capacity,
            });
        }
        let cur = self.current();
        self.properties = frame.properties.clone();
        self.positions[cur] = frame.positions.clone();
        self.velocities[cur] = frame.velocities.clone();
        self.uploaded = true;
        Ok(())
    }

    fn step(&mut self) -> Result<(), CoreError> {
        if !self.uploaded {
            log::debug!("step before upload, skipping");
            return Ok(());
        }
        let cur = self.current();
        let tgt = 1 - cur;

        let new_velocities: Vec<[f32; 4]> = (0..self.capacity)
            .into_par_iter()
            .map(|slot| {
                velocity_slot(
                    slot,
                    &self.properties,
                    &self.positions[cur],
                    &self.velocities[cur],
                    &self.physics,
                    &self.options,
                )
            })
            .collect();
        self.velocities[tgt] = new_velocities;

        let new_positions: Vec<[f32; 4]> = (0..self.capacity)
            .into_par_iter()
            .map(|slot| {
                position_slot(
                    slot,
                    &self.positions[cur],
                    &self.velocities[tgt],
                    &self.physics,
                    &self.options,
                )
            })
            .collect();
        self.positions[tgt] = new_positions;

        self.steps += 1;
        Ok(())
    }

    fn update_physics(&mut self, physics: &Physics) -> Result<(), CoreError> {
        self.physics = physics.clone();
        Ok(())
    }

    fn readback(&mut self) -> Result<FrameData, CoreError> {
        let cur = self.current();
        Ok(FrameData {
            properties: self.properties.clone(),
            positions: self.positions[cur].clone(),
            velocities: self.velocities[cur].clone(),
        })
    }
}

/// Velocity pass for one slot; mirrors the generated WGSL line for line.
fn velocity_slot(
    slot: usize,
    properties: &[[f32; 4]],
    positions: &[[f32; 4]],
    velocities: &[[f32; 4]],
    physics: &Physics,
    options: &KernelOptions,
) -> [f32; 4] {
    let pos1 = positions[slot];
    let vel1 = velocities[slot];
    let props1 = properties[slot];
    let kind1 = pos1[3];

    if kind1 == KIND_UNDEFINED {
        return [0.0; 4];
    }

    let mass1 = props1[1];
    let color1 = color_index(props1[3]);
    let min_distance2 = physics.min_distance * physics.min_distance;
    let range2 = physics.nuclear_range * physics.nuclear_range;

    let p1 = Vec3::new(pos1[0], pos1[1], pos1[2]);
    let v1 = Vec3::new(vel1[0], vel1[1], vel1[2]);
    let mut force = Vec3::ZERO;
    let mut collisions = vel1[3];

    for j in 0..positions.len() {
        if j == slot {
            continue;
        }
        let pos2 = positions[j];
        let kind2 = pos2[3];
        // Probes and empty slots exert no force on anything.
        if kind2 != KIND_DEFAULT && kind2 != KIND_FIXED {
            continue;
        }

        let props2 = properties[j];
        let p2 = Vec3::new(pos2[0], pos2[1], pos2[2]);
        let d_pos = p2 - p1;
        let mut d2 = d_pos.dot(d_pos);

        if d2 <= min_distance2 {
            if kind1 != KIND_PROBE {
                // Inelastic momentum exchange along the separation axis.
                let total_mass = mass1 + props2[1];
                if total_mass == 0.0 {
                    continue;
                }
                let s = 2.0 * mass1 * props2[1] / total_mass;
                let vel2 = velocities[j];
                let dv = Vec3::new(vel2[0], vel2[1], vel2[2]) - v1;
                if d2 == 0.0 {
                    force += s * dv;
                } else {
                    force += s * dv.dot(d_pos) / d2 * d_pos;
                }
                collisions += 1.0;
                continue;
            }
            // Probes sample the field instead of colliding.
            d2 = min_distance2;
        }
        if d2 == 0.0 {
            continue;
        }

        let mut strength = 0.0f32;
        if d2 <= range2 {
            let x = options.potential.normalize(d2.sqrt(), physics.nuclear_range);
            let mut nuclear =
                physics.nuclear_constant * props1[3] * props2[3] * options.potential.evaluate(x);
            if physics.color_mixing {
                nuclear *= color_affinity(color1, color_index(props2[3]));
            }
            strength += nuclear;
        }
        let denom = options.falloff.denominator(d2);
        strength += physics.mass_constant * mass1 * props2[1] / denom;
        strength -= physics.charge_constant * props1[2] * props2[2] / denom;

        force += d_pos * (strength / d2.sqrt());
    }

    force *= physics.force_constant;

    let mut velocity = v1;
    if kind1 == KIND_DEFAULT {
        if mass1 == 0.0 {
            velocity += force;
        } else {
            velocity += force / mass1.abs();
        }
    } else if kind1 == KIND_PROBE {
        // Probes report the instantaneous field force directly.
        velocity = force;
    }

    if options.boundary_enabled && kind1 == KIND_DEFAULT {
        let limit = physics.boundary_distance;
        let next_pos = p1 + velocity;
        match options.boundary {
            BoundaryShape::Sphere => {
                let dist = next_pos.length();
                if dist >= limit {
                    if dist < limit * 1.01 {
                        let normal = next_pos / dist;
                        velocity = (velocity - 2.0 * velocity.dot(normal) * normal)
                            * physics.boundary_damping;
                    } else {
                        velocity = Vec3::ZERO;
                    }
                }
            }
            BoundaryShape::Box => {
                if next_pos.abs().max_element() >= limit * 1.01 {
                    velocity = Vec3::ZERO;
                } else {
                    if next_pos.x.abs() >= limit {
                        velocity.x = -velocity.x * physics.boundary_damping;
                    }
                    if next_pos.y.abs() >= limit {
                        velocity.y = -velocity.y * physics.boundary_damping;
                    }
                    if next_pos.z.abs() >= limit {
                        velocity.z = -velocity.z * physics.boundary_damping;
                    }
                }
            }
        }
    }
    if options.space == SimSpace::Two {
        velocity.z = 0.0;
    }

    [velocity.x, velocity.y, velocity.z, collisions]
}

/// Position pass for one slot; mirrors the generated WGSL.
fn position_slot(
    slot: usize,
    positions: &[[f32; 4]],
    velocities: &[[f32; 4]],
    physics: &Physics,
    options: &KernelOptions,
) -> [f32; 4] {
    let pos1 = positions[slot];
    let kind = pos1[3];
    let mut position = Vec3::new(pos1[0], pos1[1], pos1[2]);

    // Fixed and probe positions are never advanced here.
    if kind == KIND_DEFAULT {
        let vel = velocities[slot];
        position += Vec3::new(vel[0], vel[1], vel[2]);

        if options.boundary_enabled {
            let limit = physics.boundary_distance;
            match options.boundary {
                BoundaryShape::Sphere => {
                    let dist = position.length();
                    if dist > limit * 1.01 {
                        position = position / dist * limit;
                    }
                }
                BoundaryShape::Box => {
                    if position.x.abs() > limit * 1.01 {
                        position.x = position.x.signum() * limit;
                    }
                    if position.y.abs() > limit * 1.01 {
                        position.y = position.y.signum() * limit;
                    }
                    if position.z.abs() > limit * 1.01 {
                        position.z = position.z.signum() * limit;
                    }
                }
            }
        }
    }
    if options.space == SimSpace::Two {
        position.z = 0.0;
    }

    [position.x, position.y, position.z, kind]
}
