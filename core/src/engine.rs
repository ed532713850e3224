use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use crate::checksum::verify_sha256;
use crate::chunk::{plan_chunks, Chunk, ChunkPlan};
use crate::config::{DownloadConfig, EngineConfig};
use crate::error::{CoreError, CoreResult};
use crate::net::{probe, DownloadRequest, NetClient, ReqwestNetClient};
use crate::progress::Progress;
use crate::resolver::{filename_from_url, has_http_scheme};
use crate::scheduler::Scheduler;
use crate::ticker::Ticker;

const STOP_NONE: u8 = 0;
const STOP_CANCELED: u8 = 1;
const STOP_FAILED: u8 = 2;

/// Called on every progress tick with the live snapshot and the active
/// configuration. Must not block.
pub type ProgressFn = Box<dyn Fn(&Progress, &DownloadConfig) + Send + Sync>;

type SharedProgressFn = Arc<dyn Fn(&Progress, &DownloadConfig) + Send + Sync>;

/// What the orchestrator needs from a downloader.
pub trait Engine {
    /// Validates `config`, probes the resource and plans the chunks.
    fn init(&mut self, config: DownloadConfig) -> CoreResult<()>;

    fn set_progress_fn(&mut self, progress_fn: ProgressFn);

    /// Fetches every chunk and blocks until the transfer completes, fails or
    /// is canceled.
    fn start(&mut self) -> CoreResult<()>;
}

/// Aborts a running transfer from any thread.
#[derive(Clone)]
pub struct Canceller {
    stop_flag: Arc<AtomicU8>,
}

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.stop_flag.compare_exchange(
            STOP_NONE,
            STOP_CANCELED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn is_canceled(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst) == STOP_CANCELED
    }
}

struct Prepared {
    config: Arc<DownloadConfig>,
    output_path: PathBuf,
    plan: ChunkPlan,
}

pub struct DownloadEngine {
    pub config: EngineConfig,
    net: Arc<dyn NetClient>,
    progress: Arc<Progress>,
    progress_fn: Option<SharedProgressFn>,
    prepared: Option<Prepared>,
    started: bool,
    stop_flag: Arc<AtomicU8>,
}

impl DownloadEngine {
    pub fn new(config: EngineConfig) -> CoreResult<Self> {
        let net = ReqwestNetClient::new(
            &config.user_agent,
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        Ok(Self {
            config,
            net: Arc::new(net),
            progress: Arc::new(Progress::new()),
            progress_fn: None,
            prepared: None,
            started: false,
            stop_flag: Arc::new(AtomicU8::new(STOP_NONE)),
        })
    }

    pub fn with_net_client(mut self, net: Box<dyn NetClient>) -> Self {
        self.net = Arc::from(net);
        self
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            stop_flag: Arc::clone(&self.stop_flag),
        }
    }

    /// Where the bytes land, known once `init` has succeeded.
    pub fn output_path(&self) -> Option<&Path> {
        self.prepared
            .as_ref()
            .map(|prepared| prepared.output_path.as_path())
    }

    pub fn plan(&self) -> Option<&ChunkPlan> {
        self.prepared.as_ref().map(|prepared| &prepared.plan)
    }
}

impl Engine for DownloadEngine {
    fn init(&mut self, config: DownloadConfig) -> CoreResult<()> {
        if self.started {
            return Err(CoreError::InvalidState(
                "cannot init a download that already started".to_string(),
            ));
        }
        validate_config(&config)?;

        let remote = probe(self.net.as_ref(), &config.url)?;
        let plan = plan_chunks(
            remote.total_bytes,
            remote.accept_ranges,
            config.chunk_size,
            config.concurrency,
            self.config.min_chunk_size,
            self.config.max_chunk_size,
        );
        let output_path = resolve_output_path(&config.destination, &config.url);
        debug!(
            url = %config.url,
            dest = %output_path.display(),
            total_bytes = remote.total_bytes,
            chunk_size = plan.chunk_size(),
            chunks = plan.len(),
            "planned download"
        );

        self.progress.set_total_size(remote.total_bytes);
        self.progress.set_chunk_size(plan.chunk_size());
        self.prepared = Some(Prepared {
            config: Arc::new(config),
            output_path,
            plan,
        });
        Ok(())
    }

    fn set_progress_fn(&mut self, progress_fn: ProgressFn) {
        self.progress_fn = Some(Arc::from(progress_fn));
    }

    fn start(&mut self) -> CoreResult<()> {
        let prepared = self.prepared.as_ref().ok_or_else(|| {
            CoreError::InvalidState("start called before init".to_string())
        })?;
        if self.started {
            return Err(CoreError::InvalidState(
                "download already started".to_string(),
            ));
        }
        self.started = true;

        let config = Arc::clone(&prepared.config);
        let total_bytes = self.progress.total_size();
        prepare_destination(&prepared.output_path, total_bytes)?;

        info!(
            url = %config.url,
            dest = %prepared.output_path.display(),
            total_bytes,
            chunks = prepared.plan.len(),
            concurrency = config.concurrency,
            "starting download"
        );
        self.progress.mark_started();

        let mut ticker = match &self.progress_fn {
            Some(progress_fn) => {
                let progress = Arc::clone(&self.progress);
                let progress_fn = Arc::clone(progress_fn);
                let config = Arc::clone(&config);
                Some(Ticker::spawn(
                    Duration::from_millis(config.poll_interval_millis),
                    move || {
                        progress.sample();
                        progress_fn(progress.as_ref(), config.as_ref());
                    },
                )?)
            }
            None => None,
        };

        let result = self.run_workers(prepared, &config);
        if result.is_ok() && self.progress.total_size() == 0 {
            // The size was unknown until the stream ended.
            self.progress.set_total_size(self.progress.received());
        }
        self.progress.freeze();

        if let Some(ticker) = ticker.as_mut() {
            if !ticker.stop() {
                warn!("progress ticker thread panicked");
            }
        }
        if let Some(progress_fn) = &self.progress_fn {
            self.progress.sample();
            progress_fn(self.progress.as_ref(), config.as_ref());
        }

        result?;
        self.finish(prepared, &config)
    }
}

impl DownloadEngine {
    fn run_workers(&self, prepared: &Prepared, config: &DownloadConfig) -> CoreResult<()> {
        let plan = prepared.plan;
        let scheduler = Arc::new(Scheduler::new(config.concurrency as usize, plan.len()));
        let errors: Arc<Mutex<Vec<CoreError>>> = Arc::new(Mutex::new(Vec::new()));

        let worker = ChunkWorker {
            url: config.url.clone(),
            dest: prepared.output_path.clone(),
            ranged: plan.is_ranged(),
            plan,
            scheduler: Arc::clone(&scheduler),
            net: Arc::clone(&self.net),
            progress: Arc::clone(&self.progress),
            stop_flag: Arc::clone(&self.stop_flag),
            retry_count: self.config.retry_count,
            retry_backoff: Duration::from_millis(self.config.retry_backoff_millis),
            buffer_size: self.config.buffer_size.max(1),
        };

        let mut handles = Vec::with_capacity(scheduler.worker_count());
        for id in 0..scheduler.worker_count() {
            let chunk_worker = worker.clone();
            let worker_errors = Arc::clone(&errors);
            let handle = thread::Builder::new()
                .name(format!("got-chunk-{}", id))
                .spawn(move || {
                    if let Err(err) = chunk_worker.run() {
                        chunk_worker.fail();
                        if let Ok(mut errors) = worker_errors.lock() {
                            errors.push(err);
                        }
                    }
                });
            match handle {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    worker.fail();
                    if let Ok(mut errors) = errors.lock() {
                        errors.push(err.into());
                    }
                    break;
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                worker.fail();
                if let Ok(mut errors) = errors.lock() {
                    errors.push(CoreError::InvalidState("chunk worker panicked".to_string()));
                }
            }
        }

        match self.stop_flag.load(Ordering::SeqCst) {
            STOP_CANCELED => Err(CoreError::Canceled),
            STOP_FAILED => {
                let mut errors = errors
                    .lock()
                    .map_err(|_| CoreError::InvalidState("error lock poisoned".to_string()))?;
                Err(if errors.is_empty() {
                    CoreError::Network("download failed".to_string())
                } else {
                    errors.remove(0)
                })
            }
            _ => Ok(()),
        }
    }

    fn finish(&self, prepared: &Prepared, config: &DownloadConfig) -> CoreResult<()> {
        let received = self.progress.received();
        let total = self.progress.total_size();
        if received != total {
            return Err(CoreError::Network(format!(
                "incomplete transfer: received {} of {} bytes",
                received, total
            )));
        }

        if let Some(expected) = &config.sha256 {
            verify_sha256(&prepared.output_path, expected)?;
            debug!(dest = %prepared.output_path.display(), "checksum verified");
        }

        info!(
            dest = %prepared.output_path.display(),
            received,
            elapsed_ms = self.progress.elapsed().as_millis() as u64,
            "download complete"
        );
        Ok(())
    }
}

#[derive(Clone)]
struct ChunkWorker {
    url: String,
    dest: PathBuf,
    ranged: bool,
    plan: ChunkPlan,
    scheduler: Arc<Scheduler>,
    net: Arc<dyn NetClient>,
    progress: Arc<Progress>,
    stop_flag: Arc<AtomicU8>,
    retry_count: u32,
    retry_backoff: Duration,
    buffer_size: usize,
}

impl ChunkWorker {
    fn run(&self) -> CoreResult<()> {
        while let Some(index) = self.scheduler.next_chunk() {
            if self.stopped() {
                return Ok(());
            }
            let chunk = self
                .plan
                .chunk(index)
                .ok_or_else(|| CoreError::InvalidState(format!("chunk {} out of range", index)))?;
            self.download_chunk(chunk)?;
        }
        Ok(())
    }

    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst) != STOP_NONE
    }

    fn fail(&self) {
        let _ = self.stop_flag.compare_exchange(
            STOP_NONE,
            STOP_FAILED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn download_chunk(&self, chunk: Chunk) -> CoreResult<()> {
        let mut written = 0u64;
        let mut last_error: Option<CoreError> = None;

        for attempt in 0..=self.retry_count {
            if self.stopped() {
                return Ok(());
            }
            if let Some(err) = &last_error {
                warn!(
                    chunk = chunk.index,
                    attempt,
                    written,
                    error = %err,
                    "retrying chunk"
                );
                thread::sleep(self.retry_backoff);
                if self.stopped() {
                    return Ok(());
                }
            }

            match self.fetch(chunk, &mut written) {
                Ok(()) => return Ok(()),
                // An unranged stream cannot pick up where it left off.
                Err(err) if !self.ranged && written > 0 => return Err(err),
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CoreError::Network(format!("failed to download chunk {}", chunk.index))
        }))
    }

    fn fetch(&self, chunk: Chunk, written: &mut u64) -> CoreResult<()> {
        let offset = chunk.start + *written;
        let mut req = DownloadRequest::new(self.url.clone());
        if self.ranged {
            if offset > chunk.end {
                return Ok(());
            }
            req = req.with_range(offset, chunk.end);
        }

        let mut response = self.net.get_stream(&req)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Http {
                status: status.as_u16(),
            });
        }
        if self.ranged && status != StatusCode::PARTIAL_CONTENT {
            return Err(CoreError::Unsupported(format!(
                "range request answered with status {}",
                status.as_u16()
            )));
        }

        let mut file = OpenOptions::new().write(true).open(&self.dest)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            if self.stopped() {
                return Ok(());
            }
            let read = response
                .read(&mut buffer)
                .map_err(|err| CoreError::Network(err.to_string()))?;
            if read == 0 {
                break;
            }
            let keep = if self.ranged {
                let remaining = chunk.size() - *written;
                (read as u64).min(remaining) as usize
            } else {
                read
            };
            file.write_all(&buffer[..keep])?;
            *written += keep as u64;
            self.progress.add_received(keep as u64);
            if self.ranged && *written >= chunk.size() {
                break;
            }
        }

        if self.ranged && *written < chunk.size() {
            return Err(CoreError::Network(format!(
                "chunk {} ended after {} of {} bytes",
                chunk.index,
                written,
                chunk.size()
            )));
        }
        Ok(())
    }
}

fn validate_config(config: &DownloadConfig) -> CoreResult<()> {
    if config.url.is_empty() {
        return Err(CoreError::InvalidConfig("empty download url".to_string()));
    }
    if !has_http_scheme(&config.url) {
        return Err(CoreError::InvalidConfig(format!(
            "url must start with http:// or https://: {}",
            config.url
        )));
    }
    if let Err(err) = Url::parse(&config.url) {
        return Err(CoreError::InvalidConfig(format!(
            "malformed url {}: {}",
            config.url, err
        )));
    }
    if config.destination.is_empty() {
        return Err(CoreError::InvalidConfig("empty destination".to_string()));
    }
    if config.concurrency == 0 {
        return Err(CoreError::InvalidConfig(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if config.poll_interval_millis == 0 {
        return Err(CoreError::InvalidConfig(
            "poll interval must be at least 1ms".to_string(),
        ));
    }
    Ok(())
}

/// A destination naming a directory receives the URL's file name inside it.
fn resolve_output_path(destination: &str, url: &str) -> PathBuf {
    let path = PathBuf::from(destination);
    let treat_as_dir =
        destination.ends_with('/') || destination.ends_with('\\') || path.is_dir();
    if treat_as_dir {
        path.join(filename_from_url(url))
    } else {
        path
    }
}

fn prepare_destination(path: &Path, total_bytes: u64) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    if total_bytes > 0 {
        file.set_len(total_bytes)?;
    }
    Ok(())
}
