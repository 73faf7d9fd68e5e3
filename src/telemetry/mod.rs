// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Telemetry: structured logging, spans and metrics for pools.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_created, record_destroyed, record_drain_wait, record_pool_gauges,
    record_reclaimed,
};
pub use spans::{DrainSpan, SpanExt};
