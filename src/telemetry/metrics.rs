// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Pool metrics through the `metrics` facade.
//!
//! Without an installed recorder every call here is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(
        "fenced_pool_resources_created_total",
        Unit::Count,
        "Resources created by the pool factory"
    );
    describe_counter!(
        "fenced_pool_resources_destroyed_total",
        Unit::Count,
        "Resources destroyed at teardown"
    );
    describe_counter!(
        "fenced_pool_batches_reclaimed_total",
        Unit::Count,
        "Pending batches returned to the free list"
    );
    describe_gauge!(
        "fenced_pool_free_resources",
        Unit::Count,
        "Resources on the free list"
    );
    describe_gauge!(
        "fenced_pool_pending_batches",
        Unit::Count,
        "Closed batches waiting on their fence"
    );
    describe_histogram!(
        "fenced_pool_drain_wait_seconds",
        Unit::Seconds,
        "Time spent waiting on fences during teardown"
    );
}

pub fn record_created(pool: &str, count: usize) {
    counter!("fenced_pool_resources_created_total", "pool" => pool.to_string())
        .increment(count as u64);
}

pub fn record_destroyed(pool: &str, count: usize) {
    counter!("fenced_pool_resources_destroyed_total", "pool" => pool.to_string())
        .increment(count as u64);
}

pub fn record_reclaimed(pool: &str, batches: usize) {
    counter!("fenced_pool_batches_reclaimed_total", "pool" => pool.to_string())
        .increment(batches as u64);
}

pub fn record_pool_gauges(pool: &str, free: usize, pending: usize) {
    gauge!("fenced_pool_free_resources", "pool" => pool.to_string()).set(free as f64);
    gauge!("fenced_pool_pending_batches", "pool" => pool.to_string()).set(pending as f64);
}

pub fn record_drain_wait(pool: &str, waited: Duration) {
    histogram!("fenced_pool_drain_wait_seconds", "pool" => pool.to_string())
        .record(waited.as_secs_f64());
}
