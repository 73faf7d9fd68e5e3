// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Fenced resource pooling engine.
//!
//! Generic over the resource kind through [`ResourceFactory`] and over the
//! completion signal through [`Fence`].

mod error;
mod factory;
mod fence;
mod fenced;


pub use error::{PoolError, ProtocolError};
pub use factory::{FnFactory, ResourceFactory};
pub use fence::{CpuFence, Fence, FenceError, FenceWait};
pub use fenced::{BatchId, FencedPool, PoolStats};
