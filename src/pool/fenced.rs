// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Generic fenced resource pool.
//!
//! Resources move through three places: the free list, the single open batch
//! (checked out to the caller), and the queue of pending batches waiting on
//! their fence. Pending batches sit in submission order, and since fences on
//! one timeline signal monotonically, reclaiming stops at the first batch whose
//! fence is still unsignaled.
//!
//! The free list is LIFO so the most recently recycled (cache-warm) resource is
//! handed out first.
//!
//! Not internally synchronized: one owner drives a pool. Separate pools may
//! live on separate threads.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use super::error::{PoolError, ProtocolError};
use super::factory::ResourceFactory;
use super::fence::{Fence, FenceWait};
use crate::config::PoolConfig;
use crate::device::DeviceError;
use crate::telemetry::{self, DrainSpan, SpanExt};

/// Identifier of a batch, unique per pool and increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifetime counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources ever created, warm set included.
    pub created: usize,
    /// Resources created on demand because the free list was empty.
    pub grown: usize,
    /// Resources destroyed at teardown.
    pub destroyed: usize,
    /// Pending batches returned to the free list.
    pub reclaimed_batches: usize,
}

impl PoolStats {
    /// Resources currently owned by the pool or its callers.
    pub fn live(&self) -> usize {
        self.created - self.destroyed
    }
}

struct OpenBatch<R> {
    id: BatchId,
    resources: Vec<R>,
}

struct PendingBatch<R, Fc> {
    id: BatchId,
    fence: Fc,
    resources: Vec<R>,
}

/// Pool of resources whose reuse is gated on GPU completion fences.
pub struct FencedPool<F: ResourceFactory, Fc: Fence> {
    factory: F,
    config: PoolConfig,
    free: Vec<F::Resource>,
    open: Option<OpenBatch<F::Resource>>,
    pending: VecDeque<PendingBatch<F::Resource, Fc>>,
    next_batch: u64,
    stats: PoolStats,
}

impl<F: ResourceFactory, Fc: Fence> FencedPool<F, Fc> {
    /// Create an empty pool. Resources are created on demand.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let config = config.normalized();
        Self {
            factory,
            free: Vec::with_capacity(config.initial_count),
            open: None,
            pending: VecDeque::new(),
            next_batch: 0,
            stats: PoolStats::default(),
            config,
        }
    }

    /// Create a pool and fill the free list with `config.initial_count`
    /// resources up front.
    pub fn with_warm_set(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        let mut pool = Self::new(factory, config);
        let warm = pool
            .factory
            .create_many(pool.config.initial_count)
            .map_err(PoolError::Construction)?;
        for resource in warm {
            pool.push_entry(resource);
        }
        Ok(pool)
    }

    /// Hand a resource created outside the on-demand path to the free list.
    ///
    /// The resource must come from this pool's factory; it is destroyed by it
    /// at teardown.
    pub fn push_entry(&mut self, resource: F::Resource) {
        self.free.push(resource);
        self.stats.created += 1;
        telemetry::record_created(&self.config.name, 1);
    }

    /// Open a new batch. Later [`acquire`](Self::acquire) calls belong to it.
    ///
    /// Reclaims any signaled batches first.
    pub fn begin_batch(&mut self) -> Result<BatchId, PoolError> {
        if let Some(open) = &self.open {
            return Err(ProtocolError::BatchAlreadyOpen { batch: open.id }.into());
        }

        self.reclaim()?;

        let id = BatchId(self.next_batch);
        self.next_batch += 1;
        self.open = Some(OpenBatch {
            id,
            resources: Vec::new(),
        });
        Ok(id)
    }

    /// Check out one resource into the open batch.
    ///
    /// Never blocks: with an empty free list the pool reclaims whatever has
    /// already signaled and otherwise grows through the factory, up to
    /// `growth.max_resources`.
    pub fn acquire(&mut self) -> Result<F::Resource, PoolError> {
        if self.open.is_none() {
            return Err(ProtocolError::NoOpenBatch.into());
        }

        let resource = match self.free.pop() {
            Some(resource) => resource,
            None => self.grow()?,
        };

        if let Some(open) = self.open.as_mut() {
            open.resources.push(resource.clone());
        }
        Ok(resource)
    }

    /// Close the open batch and queue it behind `fence`.
    ///
    /// The fence comes from the caller's submission; the batch's resources
    /// stay out of circulation until it reports signaled.
    pub fn end_batch(&mut self, fence: Fc) -> Result<BatchId, PoolError> {
        let open = self.open.take().ok_or(ProtocolError::NoOpenBatch)?;

        if open.resources.is_empty() {
            tracing::debug!(pool = %self.config.name, batch = %open.id, "empty batch closed");
            return Ok(open.id);
        }

        tracing::debug!(
            pool = %self.config.name,
            batch = %open.id,
            resources = open.resources.len(),
            "batch pending"
        );
        self.pending.push_back(PendingBatch {
            id: open.id,
            fence,
            resources: open.resources,
        });
        self.publish_gauges();
        Ok(open.id)
    }

    /// Return every leading pending batch whose fence has signaled to the
    /// free list. Returns the number of batches reclaimed.
    pub fn reclaim(&mut self) -> Result<usize, PoolError> {
        let mut reclaimed = 0;
        loop {
            let signaled = match self.pending.front() {
                Some(batch) => batch.fence.is_signaled()?,
                None => break,
            };
            if !signaled {
                break;
            }
            if let Some(batch) = self.pending.pop_front() {
                self.recycle(batch);
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            telemetry::record_reclaimed(&self.config.name, reclaimed);
            self.publish_gauges();
        }
        Ok(reclaimed)
    }

    /// Wait out every pending batch, then destroy all free resources.
    ///
    /// `timeout` bounds the whole drain. If any fence misses it, nothing is
    /// destroyed and the pool is left as it was apart from batches already
    /// reclaimed, so the call may be retried. An open batch is reported as
    /// [`ProtocolError::OpenBatchAtTeardown`] after everything else is torn
    /// down; its checked-out resources are not touched.
    ///
    /// Returns the number of resources destroyed.
    pub fn drain_and_destroy_all(&mut self, timeout: Duration) -> Result<usize, PoolError> {
        let span = DrainSpan::new(&self.config.name, self.pending.len());
        let _entered = span.enter();

        let result = self.drain(timeout);
        span.record_result(&result);
        result
    }

    fn drain(&mut self, timeout: Duration) -> Result<usize, PoolError> {
        let started = Instant::now();
        // No representable deadline means an unbounded wait.
        let deadline = started.checked_add(timeout);

        while let Some(batch) = self.pending.front() {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            match batch.fence.wait(remaining)? {
                FenceWait::Signaled => {
                    if let Some(batch) = self.pending.pop_front() {
                        self.recycle(batch);
                        telemetry::record_reclaimed(&self.config.name, 1);
                    }
                }
                FenceWait::TimedOut => {
                    tracing::error!(
                        pool = %self.config.name,
                        batch = %batch.id,
                        timeout_ms = timeout.as_millis() as u64,
                        "fence did not signal during drain"
                    );
                    self.publish_gauges();
                    return Err(PoolError::FenceTimeout {
                        batch: batch.id,
                        timeout,
                    });
                }
            }
        }
        telemetry::record_drain_wait(&self.config.name, started.elapsed());

        let destroyed = self.free.len();
        for resource in self.free.drain(..) {
            self.factory.destroy(resource);
        }
        self.stats.destroyed += destroyed;
        telemetry::record_destroyed(&self.config.name, destroyed);
        self.publish_gauges();

        if let Some(open) = &self.open {
            return Err(ProtocolError::OpenBatchAtTeardown {
                batch: open.id,
                checked_out: open.resources.len(),
            }
            .into());
        }

        tracing::info!(pool = %self.config.name, destroyed, "pool drained");
        Ok(destroyed)
    }

    /// Give up on everything still held without destroying any of it.
    ///
    /// Used when teardown failed and destroying could race the GPU.
    pub(crate) fn leak_all(&mut self) {
        let mut leaked = self.free.len();
        self.free.drain(..).for_each(std::mem::forget);
        if let Some(open) = self.open.take() {
            leaked += open.resources.len();
            open.resources.into_iter().for_each(std::mem::forget);
        }
        for batch in self.pending.drain(..) {
            leaked += batch.resources.len();
            batch.resources.into_iter().for_each(std::mem::forget);
        }
        if leaked > 0 {
            tracing::error!(pool = %self.config.name, leaked, "leaking pooled resources");
        }
    }

    fn grow(&mut self) -> Result<F::Resource, PoolError> {
        if self.reclaim()? > 0 {
            if let Some(resource) = self.free.pop() {
                return Ok(resource);
            }
        }

        let live = self.stats.live();
        let limit = self.config.growth.max_resources;
        if live >= limit {
            tracing::warn!(pool = %self.config.name, limit, "resource limit reached");
            return Err(PoolError::Exhausted { limit });
        }

        let count = self.config.growth.grow_by.min(limit - live);
        let mut created = self
            .factory
            .create_many(count)
            .map_err(PoolError::Allocation)?;
        let Some(resource) = created.pop() else {
            return Err(PoolError::Allocation(DeviceError::Api(
                "factory returned no resources".to_string(),
            )));
        };

        let grown = created.len() + 1;
        self.stats.created += grown;
        self.stats.grown += grown;
        self.free.extend(created);
        telemetry::record_created(&self.config.name, grown);
        tracing::debug!(pool = %self.config.name, grown, live = live + grown, "pool grew");
        Ok(resource)
    }

    fn recycle(&mut self, batch: PendingBatch<F::Resource, Fc>) {
        tracing::trace!(
            pool = %self.config.name,
            batch = %batch.id,
            resources = batch.resources.len(),
            "batch reclaimed"
        );
        self.free.extend(batch.resources);
        self.stats.reclaimed_batches += 1;
    }

    fn publish_gauges(&self) {
        telemetry::record_pool_gauges(&self.config.name, self.free.len(), self.pending.len());
    }

    /// Whether a batch is currently open.
    pub fn has_open_batch(&self) -> bool {
        self.open.is_some()
    }

    /// Id of the open batch, if any.
    pub fn open_batch(&self) -> Option<BatchId> {
        self.open.as_ref().map(|open| open.id)
    }

    /// Whether any closed batch is still waiting on its fence.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Resources handed out in the open batch.
    pub fn checked_out(&self) -> usize {
        self.open.as_ref().map_or(0, |open| open.resources.len())
    }

    /// Resources held by pending batches.
    pub fn in_flight(&self) -> usize {
        self.pending.iter().map(|batch| batch.resources.len()).sum()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub(crate) fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    fn is_empty(&self) -> bool {
        self.free.is_empty() && self.pending.is_empty() && self.open.is_none()
    }
}

impl<F: ResourceFactory, Fc: Fence> Drop for FencedPool<F, Fc> {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        let timeout = self.config.drain_timeout;
        if let Err(e) = self.drain_and_destroy_all(timeout) {
            tracing::error!(pool = %self.config.name, error = %e, "teardown on drop failed");
            self.leak_all();
        }
    }
}

impl<F: ResourceFactory, Fc: Fence> fmt::Debug for FencedPool<F, Fc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FencedPool")
            .field("name", &self.config.name)
            .field("free", &self.free.len())
            .field("open_batch", &self.open_batch())
            .field("checked_out", &self.checked_out())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}
