// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Pool error types.
//!
//! Resource-level failures propagate to the call site untouched; the pool never
//! retries on its own.

use std::time::Duration;

use thiserror::Error;

use super::fence::FenceError;
use super::fenced::BatchId;
use crate::device::DeviceError;

/// Caller-side misuse of the batch protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("batch {batch} is already open")]
    BatchAlreadyOpen { batch: BatchId },

    #[error("no batch is open")]
    NoOpenBatch,

    #[error("batch {batch} still open at teardown with {checked_out} resources checked out")]
    OpenBatchAtTeardown { batch: BatchId, checked_out: usize },
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Pool construction failed: {0}")]
    Construction(#[source] DeviceError),

    #[error("Resource allocation failed: {0}")]
    Allocation(#[source] DeviceError),

    #[error("Resource limit reached: {limit} resources live")]
    Exhausted { limit: usize },

    #[error("Fence for batch {batch} did not signal within {timeout:?}")]
    FenceTimeout { batch: BatchId, timeout: Duration },

    #[error("Fence query failed: {0}")]
    Fence(#[from] FenceError),

    #[error("Protocol misuse: {0}")]
    Protocol(#[from] ProtocolError),
}

impl PoolError {
    /// Returns true for programmer errors that callers usually assert against.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns true if the pool (or its construction) cannot continue safely.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Construction(_) | Self::FenceTimeout { .. } | Self::Fence(_)
        )
    }

    /// Returns true if the caller may reclaim and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Allocation(_) | Self::Exhausted { .. })
    }
}
