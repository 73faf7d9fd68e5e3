// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Command-recording API abstraction (trait + mock implementation).
//!
//! The device is a shared external context: pools only ever ask it to create or
//! destroy objects scoped to their own command pool.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;
use thiserror::Error;

/// Failures reported by the underlying command-recording API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Out of host memory")]
    OutOfHostMemory,

    #[error("Out of device memory")]
    OutOfDeviceMemory,

    #[error("Queue family {index} out of range ({available} available)")]
    InvalidQueueFamily { index: u32, available: u32 },

    #[error("Device lost")]
    DeviceLost,

    #[error("API call failed: {0}")]
    Api(String),
}

/// Recording level of allocated command buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    /// Submitted directly to a queue.
    #[default]
    Primary,
    /// Executed from a primary command buffer.
    Secondary,
}

impl fmt::Display for CommandBufferLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandBufferLevel::Primary => write!(f, "primary"),
            CommandBufferLevel::Secondary => write!(f, "secondary"),
        }
    }
}

/// Creation parameters for a command pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPoolInfo {
    pub queue_family_index: u32,
    /// Buffers are short-lived and recycled often.
    pub transient: bool,
    /// Buffers may be reset one at a time.
    pub reset_individual: bool,
}

impl CommandPoolInfo {
    /// Transient, individually resettable pool for `queue_family_index`.
    pub fn recycling(queue_family_index: u32) -> Self {
        Self {
            queue_family_index,
            transient: true,
            reset_individual: true,
        }
    }
}

/// Device-side operations needed to pool command buffers.
///
/// The device must outlive every command pool created from it, and every
/// command buffer must be freed (or its pool destroyed) before the device is.
pub trait CommandDevice {
    type CommandPool: Copy + fmt::Debug;
    type CommandBuffer: Copy + Eq + Hash + fmt::Debug;

    /// Number of queue families exposed by the device.
    fn queue_family_count(&self) -> u32;

    fn create_command_pool(&self, info: &CommandPoolInfo) -> Result<Self::CommandPool, DeviceError>;

    /// Allocate `count` buffers from `pool` in one call, all or nothing.
    fn allocate_command_buffers(
        &self,
        pool: Self::CommandPool,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<Self::CommandBuffer>, DeviceError>;

    fn free_command_buffers(&self, pool: Self::CommandPool, buffers: &[Self::CommandBuffer]);

    /// Destroy `pool`, implicitly freeing any buffer still allocated from it.
    fn destroy_command_pool(&self, pool: Self::CommandPool);
}

// -- Mock device (testing + CPU-only runs) ------------------------------------

/// Command pool handle issued by [`MockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockCommandPool(pub u64);

/// Command buffer handle issued by [`MockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockCommandBuffer(pub u64);

struct MockPool {
    info: CommandPoolInfo,
    buffers: HashSet<u64>,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    pools: HashMap<u64, MockPool>,
    allocate_calls: usize,
    allocated_buffers: usize,
    invalid_frees: usize,
    fail_pool_creation: bool,
    fail_allocations: bool,
}

/// In-memory [`CommandDevice`] with leak tracking and failure injection.
pub struct MockDevice {
    queue_family_count: u32,
    capacity: usize,
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new(queue_family_count: u32) -> Self {
        Self {
            queue_family_count,
            capacity: usize::MAX,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Limit the number of simultaneously allocated command buffers.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Make every later `create_command_pool` fail.
    pub fn fail_pool_creation(&self, fail: bool) {
        self.state.lock().fail_pool_creation = fail;
    }

    /// Make every later `allocate_command_buffers` fail.
    pub fn fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    /// Number of `allocate_command_buffers` calls that succeeded.
    pub fn allocate_calls(&self) -> usize {
        self.state.lock().allocate_calls
    }

    /// Total command buffers ever allocated.
    pub fn allocated_buffers(&self) -> usize {
        self.state.lock().allocated_buffers
    }

    /// Command buffers currently allocated across all pools.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().pools.values().map(|p| p.buffers.len()).sum()
    }

    pub fn live_pools(&self) -> usize {
        self.state.lock().pools.len()
    }

    /// Frees of buffers that were not live in the given pool.
    pub fn invalid_frees(&self) -> usize {
        self.state.lock().invalid_frees
    }

    pub fn pool_info(&self, pool: MockCommandPool) -> Option<CommandPoolInfo> {
        self.state.lock().pools.get(&pool.0).map(|p| p.info)
    }

    /// Whether `buffer` is currently allocated from `pool`.
    pub fn is_live(&self, pool: MockCommandPool, buffer: MockCommandBuffer) -> bool {
        self.state
            .lock()
            .pools
            .get(&pool.0)
            .is_some_and(|p| p.buffers.contains(&buffer.0))
    }
}

impl CommandDevice for MockDevice {
    type CommandPool = MockCommandPool;
    type CommandBuffer = MockCommandBuffer;

    fn queue_family_count(&self) -> u32 {
        self.queue_family_count
    }

    fn create_command_pool(&self, info: &CommandPoolInfo) -> Result<MockCommandPool, DeviceError> {
        let mut s = self.state.lock();
        if s.fail_pool_creation {
            return Err(DeviceError::OutOfHostMemory);
        }
        s.next_handle += 1;
        let handle = s.next_handle;
        s.pools.insert(
            handle,
            MockPool {
                info: *info,
                buffers: HashSet::new(),
            },
        );
        Ok(MockCommandPool(handle))
    }

    fn allocate_command_buffers(
        &self,
        pool: MockCommandPool,
        _level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<MockCommandBuffer>, DeviceError> {
        let mut s = self.state.lock();
        if s.fail_allocations {
            return Err(DeviceError::OutOfDeviceMemory);
        }
        let live: usize = s.pools.values().map(|p| p.buffers.len()).sum();
        if live + count as usize > self.capacity {
            return Err(DeviceError::OutOfDeviceMemory);
        }
        if !s.pools.contains_key(&pool.0) {
            return Err(DeviceError::Api(format!("unknown command pool {}", pool.0)));
        }

        let first = s.next_handle + 1;
        s.next_handle += u64::from(count);
        let handles: Vec<u64> = (first..first + u64::from(count)).collect();
        if let Some(p) = s.pools.get_mut(&pool.0) {
            p.buffers.extend(handles.iter().copied());
        }
        s.allocate_calls += 1;
        s.allocated_buffers += count as usize;
        Ok(handles.into_iter().map(MockCommandBuffer).collect())
    }

    fn free_command_buffers(&self, pool: MockCommandPool, buffers: &[MockCommandBuffer]) {
        let mut s = self.state.lock();
        let mut invalid = 0;
        match s.pools.get_mut(&pool.0) {
            Some(p) => {
                for buffer in buffers {
                    if !p.buffers.remove(&buffer.0) {
                        invalid += 1;
                    }
                }
            }
            None => invalid = buffers.len(),
        }
        if invalid > 0 {
            tracing::warn!(pool = pool.0, invalid, "free of unknown command buffers");
            s.invalid_frees += invalid;
        }
    }

    fn destroy_command_pool(&self, pool: MockCommandPool) {
        if self.state.lock().pools.remove(&pool.0).is_none() {
            tracing::warn!(pool = pool.0, "destroy of unknown command pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free_all_returns_zero() {
        let device = MockDevice::new(1);
        let pool = device
            .create_command_pool(&CommandPoolInfo::recycling(0))
            .unwrap();
        let buffers = device
            .allocate_command_buffers(pool, CommandBufferLevel::Primary, 8)
            .unwrap();
        assert_eq!(device.live_buffers(), 8);

        device.free_command_buffers(pool, &buffers);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.invalid_frees(), 0);
    }

    #[test]
    fn handles_are_unique_across_pools() {
        let device = MockDevice::new(2);
        let a = device
            .create_command_pool(&CommandPoolInfo::recycling(0))
            .unwrap();
        let b = device
            .create_command_pool(&CommandPoolInfo::recycling(1))
            .unwrap();
        let mut all = device
            .allocate_command_buffers(a, CommandBufferLevel::Primary, 4)
            .unwrap();
        all.extend(
            device
                .allocate_command_buffers(b, CommandBufferLevel::Secondary, 4)
                .unwrap(),
        );
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn double_free_is_detected() {
        let device = MockDevice::new(1);
        let pool = device
            .create_command_pool(&CommandPoolInfo::recycling(0))
            .unwrap();
        let buffers = device
            .allocate_command_buffers(pool, CommandBufferLevel::Primary, 1)
            .unwrap();
        device.free_command_buffers(pool, &buffers);
        device.free_command_buffers(pool, &buffers);
        assert_eq!(device.invalid_frees(), 1);
    }

    #[test]
    fn beyond_capacity_is_out_of_device_memory() {
        let device = MockDevice::new(1).with_capacity(4);
        let pool = device
            .create_command_pool(&CommandPoolInfo::recycling(0))
            .unwrap();
        let _held = device
            .allocate_command_buffers(pool, CommandBufferLevel::Primary, 3)
            .unwrap();
        let result = device.allocate_command_buffers(pool, CommandBufferLevel::Primary, 2);
        assert_eq!(result, Err(DeviceError::OutOfDeviceMemory));
        assert_eq!(device.live_buffers(), 3);
    }

    #[test]
    fn destroying_pool_releases_its_buffers() {
        let device = MockDevice::new(1);
        let pool = device
            .create_command_pool(&CommandPoolInfo::recycling(0))
            .unwrap();
        device
            .allocate_command_buffers(pool, CommandBufferLevel::Primary, 5)
            .unwrap();
        device.destroy_command_pool(pool);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_pools(), 0);
    }
}
