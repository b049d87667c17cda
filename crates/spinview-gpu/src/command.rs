//! Command pool and submission helpers.

use crate::error::Result;
use ash::vk;

/// Command pool for one queue family.
pub struct CommandPool {
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        Ok(Self { pool })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate `count` primary command buffers.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(&self, device: &ash::Device, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
        Ok(buffers)
    }

    /// Return command buffers to the pool.
    ///
    /// # Safety
    /// None of the buffers may be pending execution.
    pub unsafe fn free(&self, device: &ash::Device, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { device.free_command_buffers(self.pool, buffers) };
        }
    }

    /// Destroy the command pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}

/// Record a command buffer from start to end with `f` in between.
///
/// # Safety
/// The device and command buffer must be valid and the buffer not pending.
pub unsafe fn record<F>(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
    f: F,
) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
    unsafe { device.begin_command_buffer(cmd, &begin_info)? };
    f(cmd);
    unsafe { device.end_command_buffer(cmd)? };
    Ok(())
}

/// Semaphores and fence attached to one queue submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubmitSync<'a> {
    pub wait: &'a [vk::Semaphore],
    pub wait_stages: &'a [vk::PipelineStageFlags],
    pub signal: &'a [vk::Semaphore],
    pub fence: vk::Fence,
}

/// Submit command buffers to a queue.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn submit(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffers: &[vk::CommandBuffer],
    sync: &SubmitSync<'_>,
) -> Result<()> {
    let submit_info = vk::SubmitInfo::default()
        .command_buffers(command_buffers)
        .wait_semaphores(sync.wait)
        .wait_dst_stage_mask(sync.wait_stages)
        .signal_semaphores(sync.signal);

    unsafe { device.queue_submit(queue, &[submit_info], sync.fence)? };
    Ok(())
}

/// Record, submit and wait for a throwaway command buffer.
///
/// The buffer is submitted without a fence and the queue is drained before
/// the buffer is freed.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn execute_single_time_commands<F>(
    device: &ash::Device,
    pool: &CommandPool,
    queue: vk::Queue,
    f: F,
) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let buffers = unsafe { pool.allocate(device, 1)? };

    let result = unsafe {
        record(
            device,
            buffers[0],
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            f,
        )
        .and_then(|()| submit(device, queue, &buffers, &SubmitSync::default()))
        .and_then(|()| device.queue_wait_idle(queue).map_err(Into::into))
    };

    unsafe { pool.free(device, &buffers) };

    result
}
