//! # NBPE - N-Body Particle Engine
//!
//! GPU-accelerated all-pairs particle simulation combining gravity-like,
//! electric-like, and short-range nuclear-like forces.
//!
//! NBPE keeps the particle state resident on the GPU in double-buffered
//! storage buffers and advances it with two generated compute passes per
//! step: a velocity pass running the O(n²) pair loop and a position pass
//! integrating the result. The same kernel runs on the CPU for headless use
//! and testing.
//!
//! ## Quick Start
//!
//! ```ignore
//! use nbpe::prelude::*;
//!
//! let mut sim = Simulation::new(64)             // 64x64 grid = 4096 slots
//!     .with_physics(Physics::default())
//!     .with_options(KernelOptions::default());
//!
//! let particles = Spawner::new(42).nucleon_soup(1000, 50.0);
//! sim.setup(particles, Physics::default())?;
//!
//! let context = GpuContext::new()?;
//! sim.attach_gpu_kernel(&context)?;
//!
//! loop {
//!     sim.step()?;
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Particle kinds
//!
//! Every slot carries a behavior tag:
//! - `Default` - exerts force, integrates velocity and position
//! - `Fixed` - exerts force, never moves
//! - `Probe` - exerts nothing; reports the net field force at its position
//! - `Undefined` - empty slot, skipped entirely
//!
//! ### Forces
//!
//! Per pair, the velocity pass sums a gravitational-like term, an
//! electric-like term, and a short-range nuclear term whose shape is one of
//! seven selectable potentials, optionally modulated by a three-class color
//! charge. Pairs closer than the collision distance exchange momentum
//! inelastically instead.
//!
//! ### Structural options vs. runtime constants
//!
//! [`KernelOptions`] (potential shape, boundary geometry, falloff exponent,
//! 2D/3D, boundary toggle) are compiled into the shaders; changing one
//! rebuilds the kernel and re-uploads the state. [`Physics`] constants are a
//! uniform write and cost nothing.
//!
//! ### Drain / flush
//!
//! During stepping the kernel buffers are authoritative; before any CPU-side
//! mutation the state must be read back, and after it the whole store is
//! re-uploaded. [`Simulation::edit`] wraps a mutation in exactly that:
//!
//! ```ignore
//! sim.edit(|store| {
//!     store.particles_mut()[0].charge = -1.0;
//! })?;
//! ```

pub mod cpu;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod particle;
pub mod physics;
pub mod probes;
pub mod spawn;
pub mod store;

pub use bytemuck;
pub use cpu::CpuKernel;
pub use engine::Simulation;
pub use error::{CoreError, GpuError};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{GpuContext, GpuKernel};
pub use kernel::{
    BoundaryShape, DistanceFalloff, KernelOptions, NuclearPotential, SimSpace,
};
pub use particle::{Particle, ParticleKind};
pub use physics::{Physics, PhysicsUniforms};
pub use probes::{ProbeGrid, ProbeLayout};
pub use spawn::Spawner;
pub use store::{FrameData, ParticleStore};

/// A force-integration kernel over the packed particle state.
///
/// Implementations hold two buffer sets and advance them ping-pong style:
/// each pass reads only the fully materialized output of the previous pass,
/// which is the sole concurrency-correctness mechanism. There is no locking
/// on either backend.
///
/// The host drives a strict cycle: [`upload`](ForceKernel::upload) makes the
/// kernel authoritative, [`step`](ForceKernel::step) advances it, and
/// [`readback`](ForceKernel::readback) hands the state back for CPU-side
/// work. Reading back twice without an intervening step yields identical
/// frames.
pub trait ForceKernel {
    /// Number of particle slots this kernel was built for.
    fn capacity(&self) -> usize;

    /// Steps taken since the last build or rebuild.
    fn steps(&self) -> u64;

    /// Tear down and rebuild for a new grid side and structural options.
    /// All state is lost; the caller re-uploads afterwards.
    fn rebuild(
        &mut self,
        side: u32,
        options: &kernel::KernelOptions,
        physics: &physics::Physics,
    ) -> Result<(), error::CoreError>;

    /// Replace the kernel state with a packed frame.
    fn upload(&mut self, frame: &store::FrameData) -> Result<(), error::CoreError>;

    /// Advance one step: velocity pass, then position pass. A step before
    /// the first upload is skipped.
    fn step(&mut self) -> Result<(), error::CoreError>;

    /// Rewrite the runtime physics constants without rebuilding.
    fn update_physics(&mut self, physics: &physics::Physics) -> Result<(), error::CoreError>;

    /// Read the current state back. Blocks until the device is done.
    fn readback(&mut self) -> Result<store::FrameData, error::CoreError>;
}

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use nbpe::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cpu::CpuKernel;
    pub use crate::engine::Simulation;
    pub use crate::error::{CoreError, GpuError};
    pub use crate::gpu::{GpuContext, GpuKernel};
    pub use crate::kernel::{
        BoundaryShape, DistanceFalloff, KernelOptions, NuclearPotential, SimSpace,
    };
    pub use crate::particle::{Particle, ParticleKind};
    pub use crate::physics::Physics;
    pub use crate::probes::{ProbeGrid, ProbeLayout};
    pub use crate::spawn::Spawner;
    pub use crate::store::{FrameData, ParticleStore};
    pub use crate::ForceKernel;
    pub use crate::{Vec2, Vec3, Vec4};
}
