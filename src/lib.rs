// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Fence-synchronized recycling pools for GPU command-recording resources.
//!
//! A resource handed to the GPU cannot be reused until the GPU says it is done
//! with it. Pools here track resources in batches, each closed behind the
//! completion fence of the submission that used it, and only return a batch to
//! the free list once that fence has signaled.
//!
//! # Layout
//!
//! - [`pool`]: the generic [`FencedPool`] engine, the [`ResourceFactory`]
//!   capability and the [`Fence`] abstraction.
//! - [`device`]: the command-recording API seam ([`CommandDevice`]) and an
//!   in-memory [`MockDevice`].
//! - [`command`]: [`CommandBufferPool`], the command buffer specialization.
//! - `vulkan` (feature `vulkan`): `ash` implementations of the device and fence.
//! - [`config`]: [`PoolConfig`] with env and TOML loading.
//! - [`telemetry`]: logging setup, spans and metrics.
//!
//! # Usage
//!
//! ```
//! use fenced_pool::{CommandBufferLevel, CommandBufferPool, CpuFence, MockDevice};
//!
//! let device = MockDevice::new(1);
//! let mut pool: CommandBufferPool<'_, _> =
//!     CommandBufferPool::new(&device, 0, CommandBufferLevel::Primary)?;
//!
//! pool.begin_batch()?;
//! let _cmd = pool.acquire()?;
//! let fence = CpuFence::new();
//! pool.end_batch(fence.clone())?;
//!
//! // ...the GPU finishes the submission...
//! fence.signal();
//! pool.reclaim()?;
//! pool.teardown()?;
//! # Ok::<(), fenced_pool::PoolError>(())
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod pool;
pub mod telemetry;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use command::{CommandBufferFactory, CommandBufferPool};
pub use config::{ConfigError, GrowthPolicy, PoolConfig};
pub use device::{
    CommandBufferLevel, CommandDevice, CommandPoolInfo, DeviceError, MockCommandBuffer,
    MockCommandPool, MockDevice,
};
pub use pool::{
    BatchId, CpuFence, Fence, FenceError, FenceWait, FencedPool, FnFactory, PoolError, PoolStats,
    ProtocolError, ResourceFactory,
};
#[cfg(feature = "vulkan")]
pub use vulkan::{VulkanDevice, VulkanFence};
