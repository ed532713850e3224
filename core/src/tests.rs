use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::blocking::Response;

use crate::chunk::ChunkPlan;
use crate::config::{DownloadConfig, EngineConfig};
use crate::engine::{DownloadEngine, Engine};
use crate::error::{CoreError, CoreResult};
use crate::net::{DownloadRequest, DownloadResponse, NetClient};

struct FakeNet {
    head_status: u16,
    total_bytes: Option<u64>,
    accept_ranges: bool,
    head_calls: Arc<AtomicUsize>,
}

impl NetClient for FakeNet {
    fn head(&self, _req: &DownloadRequest) -> CoreResult<DownloadResponse> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DownloadResponse {
            status_code: self.head_status,
            total_bytes: self.total_bytes,
            accept_ranges: self.accept_ranges,
        })
    }

    fn get_stream(&self, _req: &DownloadRequest) -> CoreResult<Response> {
        Err(CoreError::Network("connection refused".to_string()))
    }
}

fn engine_with(net: FakeNet) -> DownloadEngine {
    let config = EngineConfig {
        min_chunk_size: 1024,
        ..EngineConfig::default()
    };
    DownloadEngine::new(config)
        .expect("engine")
        .with_net_client(Box::new(net))
}

fn fake(status: u16, total: Option<u64>, ranges: bool) -> (FakeNet, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let net = FakeNet {
        head_status: status,
        total_bytes: total,
        accept_ranges: ranges,
        head_calls: Arc::clone(&calls),
    };
    (net, calls)
}

#[test]
fn init_plans_ranged_chunks_from_head() {
    let (net, _) = fake(200, Some(100 * 1024), true);
    let mut engine = engine_with(net);
    let config = DownloadConfig::new("https://example.com/data.tar", "data.tar")
        .with_concurrency(4);
    engine.init(config).expect("init failed");

    let progress = engine.progress();
    assert_eq!(progress.total_size(), 100 * 1024);
    assert_eq!(progress.chunk_size(), 25 * 1024);
    assert_eq!(progress.received(), 0);
    assert_eq!(engine.plan().map(ChunkPlan::len), Some(4));
}

#[test]
fn init_without_range_support_plans_one_stream() {
    let (net, _) = fake(200, Some(4096), false);
    let mut engine = engine_with(net);
    engine
        .init(DownloadConfig::new("https://example.com/a", "a"))
        .expect("init failed");
    assert_eq!(engine.plan(), Some(&ChunkPlan::Single));
    assert_eq!(engine.progress().chunk_size(), 0);
}

#[test]
fn invalid_config_never_reaches_the_network() {
    let (net, calls) = fake(200, Some(10), true);
    let mut engine = engine_with(net);
    let err = engine
        .init(DownloadConfig::new("https://example.com/a", "a").with_concurrency(0))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unreachable_resource_fails_init() {
    let (net, calls) = fake(405, None, false);
    let mut engine = engine_with(net);
    let err = engine
        .init(DownloadConfig::new("https://example.com/a", "a"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Network(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(engine.output_path().is_none());
}
