//! Error types for nbpe.
//!
//! GPU setup failures and refused operations are reported through these
//! enums; nothing in the kernel path panics or retries on its own.

use std::fmt;

/// Errors that can occur while acquiring or driving the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Shader module or compute pipeline construction was rejected.
    ShaderInit(String),
    /// Failed to map a staging buffer for readback.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::ShaderInit(msg) => write!(f, "Failed to build compute pipeline: {}", msg),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors reported by the simulation core.
#[derive(Debug)]
pub enum CoreError {
    /// An operation would have placed more particles than the kernel
    /// capacity allows. The prior state is left intact.
    CapacityExceeded { requested: usize, capacity: usize },
    /// A CPU-side edit carried a non-finite or out-of-range value and was
    /// rejected whole.
    InvalidInput(String),
    /// Readback or step was invoked before a kernel was attached. Callers
    /// that hit this during setup sequencing may treat it as a no-op.
    Uninitialized,
    /// GPU backend failure.
    Gpu(GpuError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::CapacityExceeded {
                requested,
                capacity,
            } => write!(
                f,
                "Too many particles: {} requested but the kernel holds at most {}",
                requested, capacity
            ),
            CoreError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CoreError::Uninitialized => {
                write!(f, "No kernel attached; build one before stepping or reading back")
            }
            CoreError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for CoreError {
    fn from(e: GpuError) -> Self {
        CoreError::Gpu(e)
    }
}
