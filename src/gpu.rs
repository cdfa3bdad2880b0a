//! GPU force kernel.
//!
//! Holds the packed particle state in storage buffers (one static
//! properties buffer plus double-buffered position and velocity buffers)
//! and drives the two generated compute passes. The parity of the step
//! counter selects which buffer set is read and which is written, so a pass
//! only ever reads buffers the previous pass fully materialized.
//!
//! Readback is the one blocking host/device boundary: it copies the current
//! position and velocity buffers into staging buffers, maps them, and stalls
//! until the transfer completes. Collaborators should reach for it only when
//! a CPU-side mutation actually needs fresh values.

use crate::error::{CoreError, GpuError};
use crate::kernel::{self, KernelOptions, WORKGROUP_SIZE};
use crate::physics::Physics;
use crate::store::FrameData;
use crate::ForceKernel;
use wgpu::util::DeviceExt;

/// Bytes per slot in each packed buffer (`vec4<f32>`).
const SLOT_BYTES: u64 = 16;

/// Headless GPU handle shared by kernels.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire an adapter and device. Blocks on the async wgpu setup.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        log::info!("using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("nbpe Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self { device, queue })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

struct KernelResources {
    properties_buffer: wgpu::Buffer,
    position_buffers: [wgpu::Buffer; 2],
    velocity_buffers: [wgpu::Buffer; 2],
    physics_buffer: wgpu::Buffer,
    position_staging: wgpu::Buffer,
    velocity_staging: wgpu::Buffer,
    velocity_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    // Index 0 reads set 0 and writes set 1; index 1 the reverse.
    velocity_bind_groups: [wgpu::BindGroup; 2],
    position_bind_groups: [wgpu::BindGroup; 2],
}

/// GPU implementation of [`ForceKernel`].
pub struct GpuKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capacity: usize,
    resources: KernelResources,
    properties_mirror: Vec<[f32; 4]>,
    steps: u64,
    uploaded: bool,
}

impl GpuKernel {
    /// Build pipelines and buffers for a `side × side` state grid.
    pub fn new(
        context: &GpuContext,
        side: u32,
        options: &KernelOptions,
        physics: &Physics,
    ) -> Result<Self, GpuError> {
        let device = context.device.clone();
        let queue = context.queue.clone();
        let capacity = (side * side) as usize;
        log::info!(
            "building GPU kernel: {} slots, options {:?}",
            capacity,
            options
        );
        let resources = build_resources(&device, capacity, options, physics)?;
        Ok(Self {
            device,
            queue,
            capacity,
            resources,
            properties_mirror: vec![[0.0; 4]; capacity],
            steps: 0,
            uploaded: false,
        })
    }

    fn current(&self) -> usize {
        (self.steps % 2) as usize
    }

    /// Buffer holding the most recently written positions. Stable between
    /// steps; renderers bind it together with
    /// [`crate::store::ParticleStore::slot_uv`] to overlay CPU data.
    pub fn current_position_buffer(&self) -> &wgpu::Buffer {
        &self.resources.position_buffers[self.current()]
    }

    /// Buffer holding the most recently written velocities.
    pub fn current_velocity_buffer(&self) -> &wgpu::Buffer {
        &self.resources.velocity_buffers[self.current()]
    }

    /// Static per-slot properties buffer.
    pub fn properties_buffer(&self) -> &wgpu::Buffer {
        &self.resources.properties_buffer
    }

    /// Copy a buffer to its staging twin and map it.
    fn read_buffer(
        &self,
        source: &wgpu::Buffer,
        staging: &wgpu::Buffer,
    ) -> Result<Vec<[f32; 4]>, GpuError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, self.capacity as u64 * SLOT_BYTES);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::BufferMapping("map callback dropped".into()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, [f32; 4]>(&view).to_vec()
        };
        staging.unmap();
        Ok(data)
    }
}

impl ForceKernel for GpuKernel {
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
        let capacity = (side * side) as usize;
        log::info!("rebuilding GPU kernel: {} slots", capacity);
        self.resources = build_resources(&self.device, capacity, options, physics)?;
        self.capacity = capacity;
        self.properties_mirror = vec![[0.0; 4]; capacity];
        self.steps = 0;
        self.uploaded = false;
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
        self.queue.write_buffer(
            &self.resources.properties_buffer,
            0,
            bytemuck::cast_slice(&frame.properties),
        );
        self.queue.write_buffer(
            &self.resources.position_buffers[cur],
            0,
            bytemuck::cast_slice(&frame.positions),
        );
        self.queue.write_buffer(
            &self.resources.velocity_buffers[cur],
            0,
            bytemuck::cast_slice(&frame.velocities),
        );
        self.properties_mirror = frame.properties.clone();
        self.uploaded = true;
        Ok(())
    }

    fn step(&mut self) -> Result<(), CoreError> {
        if !self.uploaded {
            log::debug!("step before upload, skipping");
            return Ok(());
        }
        let cur = self.current();
        let workgroups = (self.capacity as u32).div_ceil(WORKGROUP_SIZE);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Step Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Velocity Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resources.velocity_pipeline);
            pass.set_bind_group(0, &self.resources.velocity_bind_groups[cur], &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Position Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resources.position_pipeline);
            pass.set_bind_group(0, &self.resources.position_bind_groups[cur], &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.steps += 1;
        Ok(())
    }

    fn update_physics(&mut self, physics: &Physics) -> Result<(), CoreError> {
        self.queue.write_buffer(
            &self.resources.physics_buffer,
            0,
            bytemuck::bytes_of(&physics.to_uniforms()),
        );
        Ok(())
    }

    fn readback(&mut self) -> Result<FrameData, CoreError> {
        if !self.uploaded {
            log::debug!("readback before upload, returning empty frame");
            return Ok(FrameData::empty(self.capacity));
        }
        let cur = self.current();
        let positions = self.read_buffer(
            &self.resources.position_buffers[cur],
            &self.resources.position_staging,
        )?;
        let velocities = self.read_buffer(
            &self.resources.velocity_buffers[cur],
            &self.resources.velocity_staging,
        )?;
        Ok(FrameData {
            properties: self.properties_mirror.clone(),
            positions,
            velocities,
        })
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn state_buffer(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: capacity as u64 * SLOT_BYTES,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

fn build_resources(
    device: &wgpu::Device,
    capacity: usize,
    options: &KernelOptions,
    physics: &Physics,
) -> Result<KernelResources, GpuError> {
    // Everything below runs inside one validation error scope so a rejected
    // shader or pipeline surfaces as ShaderInit instead of a device loss.
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let properties_buffer = state_buffer(device, "Properties Buffer", capacity);
    let position_buffers = [
        state_buffer(device, "Position Buffer A", capacity),
        state_buffer(device, "Position Buffer B", capacity),
    ];
    let velocity_buffers = [
        state_buffer(device, "Velocity Buffer A", capacity),
        state_buffer(device, "Velocity Buffer B", capacity),
    ];

    let physics_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Physics Buffer"),
        contents: bytemuck::bytes_of(&physics.to_uniforms()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let staging = |label: &str| {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64 * SLOT_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    };
    let position_staging = staging("Position Staging Buffer");
    let velocity_staging = staging("Velocity Staging Buffer");

    let velocity_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Velocity Pass Shader"),
        source: wgpu::ShaderSource::Wgsl(kernel::velocity_pass_source(options).into()),
    });
    let position_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Position Pass Shader"),
        source: wgpu::ShaderSource::Wgsl(kernel::position_pass_source(options).into()),
    });

    let velocity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Velocity Bind Group Layout"),
        entries: &[
            storage_entry(0, true),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
            uniform_entry(4),
        ],
    });
    let position_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Position Bind Group Layout"),
        entries: &[
            storage_entry(0, true),
            storage_entry(1, true),
            storage_entry(2, false),
            uniform_entry(3),
        ],
    });

    let velocity_pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Velocity Pipeline Layout"),
            bind_group_layouts: &[&velocity_layout],
            push_constant_ranges: &[],
        });
    let velocity_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Velocity Pipeline"),
        layout: Some(&velocity_pipeline_layout),
        module: &velocity_shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    let position_pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Position Pipeline Layout"),
            bind_group_layouts: &[&position_layout],
            push_constant_ranges: &[],
        });
    let position_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Position Pipeline"),
        layout: Some(&position_pipeline_layout),
        module: &position_shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    // One bind group per ping-pong orientation: parity p reads set p and
    // writes set 1-p.
    let velocity_bind_group = |cur: usize| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Velocity Bind Group"),
            layout: &velocity_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: properties_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: position_buffers[cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: velocity_buffers[cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: velocity_buffers[1 - cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: physics_buffer.as_entire_binding(),
                },
            ],
        })
    };
    let position_bind_group = |cur: usize| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Position Bind Group"),
            layout: &position_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: position_buffers[cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocity_buffers[1 - cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: position_buffers[1 - cur].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: physics_buffer.as_entire_binding(),
                },
            ],
        })
    };

    let velocity_bind_groups = [velocity_bind_group(0), velocity_bind_group(1)];
    let position_bind_groups = [position_bind_group(0), position_bind_group(1)];

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        log::error!("kernel build failed: {}", error);
        return Err(GpuError::ShaderInit(error.to_string()));
    }

    Ok(KernelResources {
        properties_buffer,
        position_buffers,
        velocity_buffers,
        physics_buffer,
        position_staging,
        velocity_staging,
        velocity_pipeline,
        position_pipeline,
        velocity_bind_groups,
        position_bind_groups,
    })
}
