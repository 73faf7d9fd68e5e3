// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Span utilities and extension traits for pool tracing.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for teardown spans.
pub struct DrainSpan;

impl DrainSpan {
    /// Fields:
    /// - `pool`: pool name
    /// - `pending`: batches still waiting on a fence when the drain started
    /// - `status` / `error.message`: filled in by `SpanExt::record_result`
    pub fn new(pool: &str, pending: usize) -> Span {
        info_span!(
            "pool_drain",
            pool = %pool,
            pending = pending,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
