use thiserror::Error;
use vulkano::{
    buffer::AllocateBufferError, command_buffer::CommandBufferExecError,
    image::AllocateImageError, LoadingError, Validated, VulkanError,
};

/// Fatal rendering-session errors. There is no partial or degraded mode:
/// any of these aborts further scheduling, already-presented frames stay on
/// the surface. Vulkan validation failures are programmer errors and panic
/// instead of appearing here.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load the Vulkan library: {0}")]
    Library(#[from] LoadingError),

    #[error("no suitable physical device found")]
    NoSuitableDevice,

    #[error("required GPU capability missing: {0}")]
    MissingCapability(&'static str),

    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] Validated<VulkanError>),

    #[error("gpu synchronization failed: {0}")]
    Sync(#[from] VulkanError),

    #[error("image allocation failed: {0}")]
    ImageAllocation(#[from] Validated<AllocateImageError>),

    #[error("buffer allocation failed: {0}")]
    BufferAllocation(#[from] Validated<AllocateBufferError>),

    #[error("command buffer submission failed: {0}")]
    Execution(#[from] CommandBufferExecError),

    #[error("window system error: {0}")]
    Os(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("could not read settings file: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("could not parse settings file: {0}")]
    SettingsParse(#[from] serde_json::Error),
}
