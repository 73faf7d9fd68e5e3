// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Vulkan backend over `ash`.
//!
//! Enabled with the `vulkan` feature. Handles are borrowed from the embedding
//! renderer; nothing here creates or destroys the device or fences.

use std::time::Duration;

use ash::vk;

use crate::device::{CommandBufferLevel, CommandDevice, CommandPoolInfo, DeviceError};
use crate::pool::{Fence, FenceError, FenceWait};

/// Logical device plus the queue family count of its physical device.
pub struct VulkanDevice {
    device: ash::Device,
    queue_family_count: u32,
}

impl VulkanDevice {
    /// # Safety
    /// `device` must be a live logical device created with
    /// `queue_family_count` queue families available on its physical device,
    /// and must stay live for as long as this value is used.
    pub unsafe fn new(device: ash::Device, queue_family_count: u32) -> Self {
        Self {
            device,
            queue_family_count,
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

fn device_error(err: vk::Result) -> DeviceError {
    match err {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => DeviceError::OutOfHostMemory,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => DeviceError::OutOfDeviceMemory,
        vk::Result::ERROR_DEVICE_LOST => DeviceError::DeviceLost,
        other => DeviceError::Api(format!("{other:?}")),
    }
}

fn fence_error(err: vk::Result) -> FenceError {
    match err {
        vk::Result::ERROR_DEVICE_LOST => FenceError::DeviceLost,
        other => FenceError::Api(format!("{other:?}")),
    }
}

fn vk_level(level: CommandBufferLevel) -> vk::CommandBufferLevel {
    match level {
        CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
        CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
    }
}

fn vk_pool_flags(info: &CommandPoolInfo) -> vk::CommandPoolCreateFlags {
    let mut flags = vk::CommandPoolCreateFlags::empty();
    if info.transient {
        flags |= vk::CommandPoolCreateFlags::TRANSIENT;
    }
    if info.reset_individual {
        flags |= vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
    }
    flags
}

impl CommandDevice for VulkanDevice {
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;

    fn queue_family_count(&self) -> u32 {
        self.queue_family_count
    }

    fn create_command_pool(&self, info: &CommandPoolInfo) -> Result<vk::CommandPool, DeviceError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk_pool_flags(info))
            .queue_family_index(info.queue_family_index);
        // SAFETY: the device is live (VulkanDevice::new contract) and the
        // queue family index was range-checked by the caller.
        unsafe { self.device.create_command_pool(&create_info, None) }.map_err(device_error)
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>, DeviceError> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk_level(level))
            .command_buffer_count(count);
        // SAFETY: `pool` was created from this device and is only used by the
        // pool that owns it.
        unsafe { self.device.allocate_command_buffers(&allocate_info) }.map_err(device_error)
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        // SAFETY: buffers were allocated from `pool` and their batches have
        // signaled, so none is pending execution.
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        // SAFETY: called once, after every buffer from `pool` was freed.
        unsafe { self.device.destroy_command_pool(pool, None) }
    }
}

/// Borrowed `VkFence` obtained from a queue submission.
pub struct VulkanFence<'d> {
    device: &'d ash::Device,
    fence: vk::Fence,
}

impl<'d> VulkanFence<'d> {
    /// # Safety
    /// `fence` must belong to `device` and stay alive (and not be reset)
    /// until the pool has reclaimed the batch it guards.
    pub unsafe fn new(device: &'d VulkanDevice, fence: vk::Fence) -> Self {
        Self {
            device: &device.device,
            fence,
        }
    }

    pub fn raw(&self) -> vk::Fence {
        self.fence
    }
}

impl Fence for VulkanFence<'_> {
    fn is_signaled(&self) -> Result<bool, FenceError> {
        // SAFETY: VulkanFence::new contract.
        unsafe { self.device.get_fence_status(self.fence) }.map_err(fence_error)
    }

    fn wait(&self, timeout: Duration) -> Result<FenceWait, FenceError> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        // SAFETY: VulkanFence::new contract.
        match unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) } {
            Ok(()) => Ok(FenceWait::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceWait::TimedOut),
            Err(e) => Err(fence_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycling_pool_sets_both_flags() {
        let flags = vk_pool_flags(&CommandPoolInfo::recycling(0));
        assert!(flags.contains(vk::CommandPoolCreateFlags::TRANSIENT));
        assert!(flags.contains(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER));
    }

    #[test]
    fn levels_map_to_vulkan() {
        assert_eq!(vk_level(CommandBufferLevel::Primary), vk::CommandBufferLevel::PRIMARY);
        assert_eq!(
            vk_level(CommandBufferLevel::Secondary),
            vk::CommandBufferLevel::SECONDARY
        );
    }

    #[test]
    fn vulkan_errors_map_to_device_errors() {
        assert_eq!(
            device_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            DeviceError::OutOfDeviceMemory
        );
        assert_eq!(device_error(vk::Result::ERROR_DEVICE_LOST), DeviceError::DeviceLost);
        assert_eq!(fence_error(vk::Result::ERROR_DEVICE_LOST), FenceError::DeviceLost);
        assert!(matches!(
            device_error(vk::Result::ERROR_INITIALIZATION_FAILED),
            DeviceError::Api(_)
        ));
    }
}
