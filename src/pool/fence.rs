// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Completion fences.
//!
//! A fence is an opaque GPU-to-CPU completion signal. The pool only ever asks
//! two things of it: "has it signaled?" and "wait for it, but not forever".

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Errors reported by a fence query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenceError {
    #[error("Device lost while querying fence")]
    DeviceLost,

    #[error("Fence API call failed: {0}")]
    Api(String),
}

/// Outcome of a bounded fence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    TimedOut,
}

/// Opaque completion signal handed to [`FencedPool::end_batch`].
///
/// The pool never creates, resets or destroys fences; their lifetime belongs
/// to the submission code that produced them.
///
/// [`FencedPool::end_batch`]: super::FencedPool::end_batch
pub trait Fence {
    /// Non-blocking status query.
    fn is_signaled(&self) -> Result<bool, FenceError>;

    /// Block until the fence signals or `timeout` elapses.
    fn wait(&self, timeout: Duration) -> Result<FenceWait, FenceError>;
}

struct CpuFenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

/// Host-side fence signaled from CPU code.
///
/// Clones share state, so one clone can be handed to the pool while another is
/// signaled by whatever stands in for the GPU timeline.
#[derive(Clone)]
pub struct CpuFence {
    state: Arc<CpuFenceState>,
}

impl CpuFence {
    /// Create an unsignaled fence.
    pub fn new() -> Self {
        Self {
            state: Arc::new(CpuFenceState {
                signaled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Create a fence that is already signaled.
    pub fn signaled() -> Self {
        let fence = Self::new();
        fence.signal();
        fence
    }

    /// Mark the fence signaled and wake every waiter.
    pub fn signal(&self) {
        *self.state.signaled.lock() = true;
        self.state.cond.notify_all();
    }

    /// Return the fence to the unsignaled state.
    pub fn reset(&self) {
        *self.state.signaled.lock() = false;
    }
}

impl Default for CpuFence {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuFence")
            .field("signaled", &*self.state.signaled.lock())
            .finish()
    }
}

impl Fence for CpuFence {
    fn is_signaled(&self) -> Result<bool, FenceError> {
        Ok(*self.state.signaled.lock())
    }

    fn wait(&self, timeout: Duration) -> Result<FenceWait, FenceError> {
        let mut signaled = self.state.signaled.lock();
        if !*signaled {
            self.state
                .cond
                .wait_while_for(&mut signaled, |s| !*s, timeout);
        }
        Ok(if *signaled {
            FenceWait::Signaled
        } else {
            FenceWait::TimedOut
        })
    }
}
