//! Tests for telemetry logging initialization.
//!
//! Lives in its own test binary: the global subscriber can only be set once.

use fenced_pool::telemetry::{init_logging, LogConfig, LogError, LogFormat};
use fenced_pool::{CommandBufferLevel, CommandBufferPool, MockDevice, PoolConfig};

#[test]
fn test_json_logging_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.log");

    let config = LogConfig {
        format: LogFormat::Json,
        level: "fenced_pool=debug".to_string(),
        output_path: Some(path.clone()),
    };
    init_logging(&config).unwrap();

    let device = MockDevice::new(1);
    let pool: CommandBufferPool<'_, _> = CommandBufferPool::with_config(
        &device,
        0,
        CommandBufferLevel::Primary,
        PoolConfig {
            name: "logged".to_string(),
            initial_count: 2,
            ..PoolConfig::default()
        },
    )
    .unwrap();
    pool.teardown().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("command buffer pool created"));
    assert!(contents.contains("\"pool\":\"logged\""));

    // A second subscriber cannot be installed.
    assert!(matches!(
        init_logging(&LogConfig::default()),
        Err(LogError::AlreadyInitialized)
    ));
}
