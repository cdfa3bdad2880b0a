//! Simulation context.
//!
//! [`Simulation`] threads the particle store, the physics constants, the
//! structural kernel options, and the kernel instance through every
//! operation; there is no global state. It is also where the drain/flush
//! contract is enforced: CPU-side mutation happens inside [`Simulation::edit`],
//! which reads the kernel state back first and re-uploads the whole store
//! afterwards, so exactly one copy is authoritative at any time.

use crate::cpu::CpuKernel;
use crate::error::CoreError;
use crate::gpu::{GpuContext, GpuKernel};
use crate::kernel::{
    BoundaryShape, DistanceFalloff, KernelOptions, NuclearPotential, SimSpace,
};
use crate::particle::{Particle, ParticleKind};
use crate::physics::Physics;
use crate::probes::{self, ProbeGrid};
use crate::store::ParticleStore;
use crate::ForceKernel;
use glam::Vec3;

/// Owner of the simulation state and the kernel driving it.
pub struct Simulation {
    store: ParticleStore,
    physics: Physics,
    options: KernelOptions,
    kernel: Option<Box<dyn ForceKernel>>,
    probe_grid: Option<(ProbeGrid, Vec3)>,
    /// True while the kernel holds state newer than the store.
    stale: bool,
}

impl Simulation {
    /// Create a simulation backed by a `side × side` state grid, with no
    /// kernel attached yet.
    pub fn new(side: u32) -> Self {
        Self {
            store: ParticleStore::new(side),
            physics: Physics::default(),
            options: KernelOptions::default(),
            kernel: None,
            probe_grid: None,
            stale: false,
        }
    }

    /// Set the physics constants before attaching a kernel.
    pub fn with_physics(mut self, physics: Physics) -> Self {
        self.physics = physics;
        self
    }

    /// Set the structural kernel options before attaching a kernel.
    pub fn with_options(mut self, options: KernelOptions) -> Self {
        self.options = options;
        self
    }

    /// Seed the store from a scenario: replaces the whole population and the
    /// physics configuration, then uploads if a kernel is attached.
    pub fn setup(
        &mut self,
        particles: Vec<Particle>,
        physics: Physics,
    ) -> Result<(), CoreError> {
        physics.validate()?;
        self.store.replace_all(particles)?;
        self.physics = physics;
        if let Some(kernel) = &mut self.kernel {
            kernel.update_physics(&self.physics)?;
        }
        self.flush()
    }

    /// Attach a kernel and upload the current store into it.
    ///
    /// The kernel must have been built for this simulation's grid side.
    pub fn attach_kernel(&mut self, kernel: Box<dyn ForceKernel>) -> Result<(), CoreError> {
        if kernel.capacity() != self.store.capacity() {
            return Err(CoreError::InvalidInput(format!(
                "kernel capacity {} does not match store capacity {}",
                kernel.capacity(),
                self.store.capacity()
            )));
        }
        self.physics.validate()?;
        self.kernel = Some(kernel);
        self.flush()
    }

    /// Attach a freshly built CPU kernel.
    pub fn attach_cpu_kernel(&mut self) -> Result<(), CoreError> {
        let kernel = CpuKernel::new(self.store.side(), self.options, self.physics.clone());
        self.attach_kernel(Box::new(kernel))
    }

    /// Attach a freshly built GPU kernel on the given context.
    pub fn attach_gpu_kernel(&mut self, context: &GpuContext) -> Result<(), CoreError> {
        let kernel = GpuKernel::new(context, self.store.side(), &self.options, &self.physics)?;
        self.attach_kernel(Box::new(kernel))
    }

    /// Advance one step. Silently skipped (logged) when no kernel is
    /// attached, which happens naturally during setup sequencing.
    pub fn step(&mut self) -> Result<(), CoreError> {
        match &mut self.kernel {
            Some(kernel) => {
                kernel.step()?;
                self.stale = true;
                Ok(())
            }
            None => {
                log::debug!("step without a kernel, skipping");
                Ok(())
            }
        }
    }

    /// Advance several steps back to back.
    pub fn step_n(&mut self, steps: u32) -> Result<(), CoreError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Read the kernel state back into the store. Idempotent between steps;
    /// silently skipped (logged) when no kernel is attached.
    pub fn drain(&mut self) -> Result<(), CoreError> {
        match &mut self.kernel {
            Some(kernel) => {
                let frame = kernel.readback()?;
                self.store.apply_frame(&frame);
                self.stale = false;
                Ok(())
            }
            None => {
                log::debug!("readback without a kernel, skipping");
                Ok(())
            }
        }
    }

    /// Upload the whole store into the kernel.
    pub fn flush(&mut self) -> Result<(), CoreError> {
        if let Some(kernel) = &mut self.kernel {
            let frame = self.store.pack()?;
            kernel.upload(&frame)?;
        }
        self.stale = false;
        Ok(())
    }

    /// Mutate the store under the drain/flush contract: the closure receives
    /// a freshly drained store, and the result is validated and re-uploaded
    /// before the next step. An edit that leaves any particle with
    /// non-finite fields or a velocity beyond the boundary distance is
    /// rolled back whole.
    pub fn edit<R>(
        &mut self,
        mutate: impl FnOnce(&mut ParticleStore) -> R,
    ) -> Result<R, CoreError> {
        self.drain()?;
        let snapshot = self.store.clone();
        let result = mutate(&mut self.store);
        if let Err(error) = self.validate_store() {
            self.store = snapshot;
            return Err(error);
        }
        self.flush()?;
        Ok(result)
    }

    fn validate_store(&self) -> Result<(), CoreError> {
        for particle in self.store.particles() {
            if !particle.is_finite() {
                return Err(CoreError::InvalidInput(format!(
                    "particle {} has non-finite fields",
                    particle.id
                )));
            }
            // Probes carry sampled field forces in their velocity channel,
            // which may legitimately dwarf the boundary distance.
            if particle.kind == ParticleKind::Default
                && particle.velocity.length() > self.physics.boundary_distance
            {
                return Err(CoreError::InvalidInput(format!(
                    "particle {} velocity {} exceeds the boundary distance {}",
                    particle.id,
                    particle.velocity.length(),
                    self.physics.boundary_distance
                )));
            }
        }
        Ok(())
    }

    /// Update the runtime physics constants in place. No rebuild.
    pub fn set_physics(&mut self, physics: Physics) -> Result<(), CoreError> {
        physics.validate()?;
        if let Some(kernel) = &mut self.kernel {
            kernel.update_physics(&physics)?;
        }
        self.physics = physics;
        Ok(())
    }

    /// Change the nuclear potential shape. Rebuilds the kernel.
    pub fn set_potential(&mut self, potential: NuclearPotential) -> Result<(), CoreError> {
        self.restructure(|options| options.potential = potential)
    }

    /// Change the boundary geometry. Rebuilds the kernel.
    pub fn set_boundary_shape(&mut self, boundary: BoundaryShape) -> Result<(), CoreError> {
        self.restructure(|options| options.boundary = boundary)
    }

    /// Toggle the boundary. Rebuilds the kernel.
    pub fn set_boundary_enabled(&mut self, enabled: bool) -> Result<(), CoreError> {
        self.restructure(|options| options.boundary_enabled = enabled)
    }

    /// Change the long-range falloff exponent. Rebuilds the kernel.
    pub fn set_falloff(&mut self, falloff: DistanceFalloff) -> Result<(), CoreError> {
        self.restructure(|options| options.falloff = falloff)
    }

    /// Switch between 2D and 3D. Rebuilds the kernel.
    pub fn set_space(&mut self, space: SimSpace) -> Result<(), CoreError> {
        self.restructure(|options| options.space = space)
    }

    /// Change the state-grid side length, and with it the capacity.
    /// Rebuilds the kernel and re-uploads every live particle.
    pub fn set_side(&mut self, side: u32) -> Result<(), CoreError> {
        self.drain()?;
        self.store.set_side(side)?;
        if let Some(kernel) = &mut self.kernel {
            kernel.rebuild(side, &self.options, &self.physics)?;
        }
        self.flush()
    }

    /// Apply a structural option change: drain, rebuild, re-upload.
    fn restructure(&mut self, change: impl FnOnce(&mut KernelOptions)) -> Result<(), CoreError> {
        self.drain()?;
        change(&mut self.options);
        if let Some(kernel) = &mut self.kernel {
            kernel.rebuild(self.store.side(), &self.options, &self.physics)?;
        }
        self.flush()
    }

    /// Lay out a probe grid around a center, replacing any previous probes.
    pub fn setup_probes(&mut self, grid: ProbeGrid, center: Vec3) -> Result<(), CoreError> {
        self.drain()?;
        probes::setup(&mut self.store, &grid, center)?;
        self.probe_grid = Some((grid, center));
        self.flush()
    }

    /// Move the existing probe grid to a new center without changing count.
    pub fn resize_probes(&mut self, center: Vec3) -> Result<(), CoreError> {
        let (grid, _) = self
            .probe_grid
            .ok_or_else(|| CoreError::InvalidInput("no probe grid set up".into()))?;
        self.drain()?;
        probes::resize(&mut self.store, &grid, center)?;
        self.probe_grid = Some((grid, center));
        self.flush()
    }

    /// Remove every probe.
    pub fn cleanup_probes(&mut self) -> Result<(), CoreError> {
        self.drain()?;
        probes::cleanup(&mut self.store);
        self.probe_grid = None;
        self.flush()
    }

    /// The particle store. Positions/velocities lag the kernel after a step;
    /// call [`Simulation::drain`] first (or use [`Simulation::edit`]) for
    /// fresh values.
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Whether the kernel holds state newer than the store.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Steps taken by the attached kernel, 0 if none.
    pub fn steps(&self) -> u64 {
        self.kernel.as_ref().map_or(0, |k| k.steps())
    }
}
