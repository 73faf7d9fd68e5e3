//! Tests for fence-gated teardown of command buffer pools.

use std::thread;
use std::time::{Duration, Instant};

use fenced_pool::{
    CommandBufferLevel, CommandBufferPool, CpuFence, MockDevice, PoolConfig, PoolError,
    ProtocolError,
};

fn config(drain_timeout: Duration) -> PoolConfig {
    PoolConfig {
        initial_count: 4,
        drain_timeout,
        ..PoolConfig::default()
    }
}

#[test]
fn test_teardown_waits_for_pending_fence() {
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_secs(5)))
            .unwrap();
    let fence = CpuFence::new();

    pool.begin_batch().unwrap();
    pool.acquire().unwrap();
    pool.end_batch(fence.clone()).unwrap();

    let signaler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        fence.signal();
    });

    let started = Instant::now();
    pool.teardown().unwrap();
    signaler.join().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_pools(), 0);
}

#[test]
fn test_teardown_timeout_is_fatal_and_destroys_nothing() {
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_secs(5)))
            .unwrap();

    pool.begin_batch().unwrap();
    pool.acquire().unwrap();
    pool.end_batch(CpuFence::new()).unwrap();

    let err = pool
        .teardown_with_timeout(Duration::from_millis(30))
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, PoolError::FenceTimeout { .. }));

    // Command pool and every buffer are leaked rather than freed under the GPU.
    assert_eq!(device.live_pools(), 1);
    assert_eq!(device.live_buffers(), 4);
    assert_eq!(device.invalid_frees(), 0);
}

#[test]
fn test_teardown_with_unbounded_timeout() {
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_secs(5)))
            .unwrap();

    pool.begin_batch().unwrap();
    pool.acquire().unwrap();
    pool.end_batch(CpuFence::signaled()).unwrap();

    pool.teardown_with_timeout(Duration::MAX).unwrap();
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_pools(), 0);
}

#[test]
fn test_teardown_drains_batches_in_order() {
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_secs(5)))
            .unwrap();
    let fences: Vec<CpuFence> = (0..3).map(|_| CpuFence::new()).collect();

    for fence in &fences {
        pool.begin_batch().unwrap();
        pool.acquire().unwrap();
        pool.end_batch(fence.clone()).unwrap();
    }
    assert_eq!(pool.pending_count(), 3);

    let signalers: Vec<_> = fences
        .into_iter()
        .enumerate()
        .map(|(i, fence)| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10 * (i as u64 + 1)));
                fence.signal();
            })
        })
        .collect();

    pool.teardown().unwrap();
    for s in signalers {
        s.join().unwrap();
    }
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_teardown_with_open_batch_is_misuse() {
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_millis(50)))
            .unwrap();

    pool.begin_batch().unwrap();
    pool.acquire().unwrap();
    pool.acquire().unwrap();

    let err = pool.teardown().unwrap_err();
    assert!(err.is_protocol_misuse());
    assert!(matches!(
        err,
        PoolError::Protocol(ProtocolError::OpenBatchAtTeardown { checked_out: 2, .. })
    ));
    // Free buffers were released; the checked-out ones were left alone.
    assert_eq!(device.live_buffers(), 2);
}

#[test]
fn test_drop_with_unsignaled_fence_leaks() {
    let device = MockDevice::new(1);
    {
        let mut pool: CommandBufferPool<'_, _> = CommandBufferPool::with_config(
            &device,
            0,
            CommandBufferLevel::Primary,
            config(Duration::from_millis(20)),
        )
        .unwrap();
        pool.begin_batch().unwrap();
        pool.acquire().unwrap();
        pool.end_batch(CpuFence::new()).unwrap();
    }
    assert_eq!(device.live_pools(), 1);
    assert_eq!(device.invalid_frees(), 0);
}

#[test]
fn test_failed_teardown_does_not_wait_again_on_drop() {
    // teardown consumes the pool, so a timed-out pool is leaked for good;
    // drop afterwards must not wait or free again.
    let device = MockDevice::new(1);
    let fence = CpuFence::new();
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::with_config(&device, 0, CommandBufferLevel::Primary, config(Duration::from_secs(5)))
            .unwrap();
    pool.begin_batch().unwrap();
    pool.acquire().unwrap();
    pool.end_batch(fence.clone()).unwrap();

    let started = Instant::now();
    assert!(pool.teardown_with_timeout(Duration::from_millis(20)).is_err());
    assert!(started.elapsed() < Duration::from_secs(5));

    fence.signal();
    assert_eq!(device.live_pools(), 1);
    assert_eq!(device.invalid_frees(), 0);
}
