// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Command buffer pool: [`FencedPool`] specialized for command buffers.
//!
//! Owns one transient, individually resettable command pool on the device and
//! keeps a warm set of command buffers allocated from it. The command pool is
//! destroyed only after every buffer has come back and been freed.

use std::fmt;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::device::{CommandBufferLevel, CommandDevice, CommandPoolInfo, DeviceError};
use crate::pool::{BatchId, CpuFence, Fence, FencedPool, PoolError, PoolStats, ResourceFactory};

/// Allocates and frees command buffers from one command pool.
pub struct CommandBufferFactory<'d, D: CommandDevice> {
    device: &'d D,
    command_pool: D::CommandPool,
    level: CommandBufferLevel,
}

impl<'d, D: CommandDevice> CommandBufferFactory<'d, D> {
    pub fn device(&self) -> &'d D {
        self.device
    }

    pub fn command_pool(&self) -> D::CommandPool {
        self.command_pool
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }
}

impl<D: CommandDevice> ResourceFactory for CommandBufferFactory<'_, D> {
    type Resource = D::CommandBuffer;

    fn create(&mut self) -> Result<D::CommandBuffer, DeviceError> {
        self.device
            .allocate_command_buffers(self.command_pool, self.level, 1)?
            .pop()
            .ok_or_else(|| DeviceError::Api("allocation returned no command buffer".to_string()))
    }

    fn create_many(&mut self, count: usize) -> Result<Vec<D::CommandBuffer>, DeviceError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let count = u32::try_from(count)
            .map_err(|_| DeviceError::Api(format!("cannot allocate {count} command buffers")))?;
        self.device
            .allocate_command_buffers(self.command_pool, self.level, count)
    }

    fn destroy(&mut self, buffer: D::CommandBuffer) {
        self.device.free_command_buffers(self.command_pool, &[buffer]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Live,
    Destroyed,
    Leaked,
}

/// Fence-recycled pool of command buffers for one queue family.
///
/// `device` is borrowed, not owned: it must outlive the pool.
pub struct CommandBufferPool<'d, D: CommandDevice, Fc: Fence = CpuFence> {
    pool: FencedPool<CommandBufferFactory<'d, D>, Fc>,
    queue_family_index: u32,
    lifecycle: Lifecycle,
}

impl<'d, D: CommandDevice, Fc: Fence> CommandBufferPool<'d, D, Fc> {
    /// Create a pool with the default configuration (warm set of 32).
    pub fn new(
        device: &'d D,
        queue_family_index: u32,
        level: CommandBufferLevel,
    ) -> Result<Self, PoolError> {
        Self::with_config(device, queue_family_index, level, PoolConfig::default())
    }

    /// Create the command pool and allocate the warm set in one call.
    ///
    /// Fails without leaving anything allocated if either step fails.
    pub fn with_config(
        device: &'d D,
        queue_family_index: u32,
        level: CommandBufferLevel,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        let available = device.queue_family_count();
        if queue_family_index >= available {
            return Err(PoolError::Construction(DeviceError::InvalidQueueFamily {
                index: queue_family_index,
                available,
            }));
        }

        let command_pool = device
            .create_command_pool(&CommandPoolInfo::recycling(queue_family_index))
            .map_err(PoolError::Construction)?;

        let factory = CommandBufferFactory {
            device,
            command_pool,
            level,
        };
        let mut pool = FencedPool::new(factory, config);

        let warm_count = pool.config().initial_count;
        match pool.factory_mut().create_many(warm_count) {
            Ok(buffers) => {
                for buffer in buffers {
                    pool.push_entry(buffer);
                }
            }
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(PoolError::Construction(e));
            }
        }

        tracing::info!(
            pool = %pool.config().name,
            queue_family = queue_family_index,
            level = %level,
            warm = warm_count,
            "command buffer pool created"
        );

        Ok(Self {
            pool,
            queue_family_index,
            lifecycle: Lifecycle::Live,
        })
    }

    pub fn begin_batch(&mut self) -> Result<BatchId, PoolError> {
        self.pool.begin_batch()
    }

    /// Check out a command buffer into the open batch.
    pub fn acquire(&mut self) -> Result<D::CommandBuffer, PoolError> {
        self.pool.acquire()
    }

    pub fn end_batch(&mut self, fence: Fc) -> Result<BatchId, PoolError> {
        self.pool.end_batch(fence)
    }

    pub fn reclaim(&mut self) -> Result<usize, PoolError> {
        self.pool.reclaim()
    }

    /// Drain with the configured timeout, free every command buffer, then
    /// destroy the command pool.
    pub fn teardown(mut self) -> Result<(), PoolError> {
        let timeout = self.pool.config().drain_timeout;
        self.shutdown(timeout)
    }

    /// [`teardown`](Self::teardown) with an explicit drain timeout.
    pub fn teardown_with_timeout(mut self, timeout: Duration) -> Result<(), PoolError> {
        self.shutdown(timeout)
    }

    fn shutdown(&mut self, timeout: Duration) -> Result<(), PoolError> {
        if self.lifecycle != Lifecycle::Live {
            return Ok(());
        }

        match self.pool.drain_and_destroy_all(timeout) {
            Ok(_) => {
                let factory = self.pool.factory();
                factory.device.destroy_command_pool(factory.command_pool);
                self.lifecycle = Lifecycle::Destroyed;
                tracing::info!(pool = %self.pool.config().name, "command buffer pool destroyed");
                Ok(())
            }
            Err(e) => {
                // Buffers may still be executing; the command pool must outlive them.
                tracing::error!(
                    pool = %self.pool.config().name,
                    error = %e,
                    "leaking command pool after failed drain"
                );
                self.pool.leak_all();
                self.lifecycle = Lifecycle::Leaked;
                Err(e)
            }
        }
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.pool.factory().level
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Raw command pool handle.
    pub fn command_pool(&self) -> D::CommandPool {
        self.pool.factory().command_pool
    }

    pub fn device(&self) -> &'d D {
        self.pool.factory().device
    }

    pub fn has_open_batch(&self) -> bool {
        self.pool.has_open_batch()
    }

    pub fn has_pending(&self) -> bool {
        self.pool.has_pending()
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn pending_count(&self) -> usize {
        self.pool.pending_count()
    }

    pub fn checked_out(&self) -> usize {
        self.pool.checked_out()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The underlying generic pool.
    pub fn inner(&self) -> &FencedPool<CommandBufferFactory<'d, D>, Fc> {
        &self.pool
    }
}

impl<D: CommandDevice, Fc: Fence> Drop for CommandBufferPool<'_, D, Fc> {
    fn drop(&mut self) {
        let timeout = self.pool.config().drain_timeout;
        if let Err(e) = self.shutdown(timeout) {
            tracing::error!(error = %e, "command buffer pool teardown on drop failed");
        }
    }
}

impl<D: CommandDevice, Fc: Fence> fmt::Debug for CommandBufferPool<'_, D, Fc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBufferPool")
            .field("queue_family_index", &self.queue_family_index)
            .field("level", &self.level())
            .field("command_pool", &self.command_pool())
            .field("lifecycle", &self.lifecycle)
            .field("pool", &self.pool)
            .finish()
    }
}
