pub const DEFAULT_CONCURRENCY: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 100;

/// What to download and how, built once per invocation.
///
/// The engine reads it from every worker thread and never writes it back.
/// A `chunk_size` of zero lets the engine pick one from the resource size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub url: String,
    pub destination: String,
    pub chunk_size: u64,
    pub concurrency: u32,
    pub poll_interval_millis: u64,
    pub sha256: Option<String>,
}

impl DownloadConfig {
    pub fn new(url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            chunk_size: 0,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval_millis: DEFAULT_POLL_INTERVAL_MILLIS,
            sha256: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_poll_interval_millis(mut self, millis: u64) -> Self {
        self.poll_interval_millis = millis;
        self
    }

    pub fn with_sha256(mut self, digest: Option<String>) -> Self {
        self.sha256 = digest;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub min_chunk_size: u64,
    /// Upper bound for an engine-chosen chunk size, `0` for none.
    pub max_chunk_size: u64,
    pub user_agent: String,
    pub retry_count: u32,
    pub retry_backoff_millis: u64,
    pub connect_timeout_secs: u64,
    pub buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 2 * 1024 * 1024,
            max_chunk_size: 0,
            user_agent: concat!("got/", env!("CARGO_PKG_VERSION")).to_string(),
            retry_count: 3,
            retry_backoff_millis: 500,
            connect_timeout_secs: 30,
            buffer_size: 64 * 1024,
        }
    }
}
