use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub range: Option<(u64, u64)>,
}

impl DownloadRequest {
    pub fn new(url: String) -> Self {
        Self { url, range: None }
    }

    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some((start, end));
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub status_code: u16,
    pub total_bytes: Option<u64>,
    pub accept_ranges: bool,
}

/// What the engine learned about the remote resource before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    /// `0` when the server did not tell.
    pub total_bytes: u64,
    pub accept_ranges: bool,
}

pub trait NetClient: Send + Sync {
    fn head(&self, req: &DownloadRequest) -> CoreResult<DownloadResponse>;
    fn get_stream(&self, req: &DownloadRequest) -> CoreResult<Response>;
}

#[derive(Clone)]
pub struct ReqwestNetClient {
    client: Client,
}

impl ReqwestNetClient {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> CoreResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            // Chunk bodies may stream for a long time.
            .timeout(None)
            .build()
            .map_err(|err| CoreError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

impl NetClient for ReqwestNetClient {
    fn head(&self, req: &DownloadRequest) -> CoreResult<DownloadResponse> {
        let resp = self
            .client
            .head(&req.url)
            .send()
            .map_err(|err| CoreError::Network(err.to_string()))?;
        let headers = resp.headers();
        let total_bytes = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let accept_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);

        Ok(DownloadResponse {
            status_code: resp.status().as_u16(),
            total_bytes,
            accept_ranges,
        })
    }

    fn get_stream(&self, req: &DownloadRequest) -> CoreResult<Response> {
        let mut request = self.client.get(&req.url);
        if let Some((start, end)) = req.range {
            let value = format!("bytes={}-{}", start, end);
            request = request.header(
                RANGE,
                HeaderValue::from_str(&value).map_err(|err| CoreError::Network(err.to_string()))?,
            );
        }
        request
            .send()
            .map_err(|err| CoreError::Network(err.to_string()))
    }
}

/// Finds the resource size and range support.
///
/// Tries `HEAD` first. Servers that refuse it get a one-byte ranged `GET`
/// whose `Content-Range` carries the full size.
pub fn probe(net: &dyn NetClient, url: &str) -> CoreResult<RemoteInfo> {
    let req = DownloadRequest::new(url.to_string());
    match net.head(&req) {
        Ok(resp) if (200..300).contains(&resp.status_code) => {
            debug!(
                url,
                total_bytes = ?resp.total_bytes,
                accept_ranges = resp.accept_ranges,
                "probed resource with HEAD"
            );
            return Ok(RemoteInfo {
                total_bytes: resp.total_bytes.unwrap_or(0),
                accept_ranges: resp.accept_ranges,
            });
        }
        Ok(resp) => debug!(url, status = resp.status_code, "HEAD refused, probing with GET"),
        Err(err) => debug!(url, error = %err, "HEAD failed, probing with GET"),
    }

    let resp = net.get_stream(&req.with_range(0, 0))?;
    let status = resp.status();
    let headers = resp.headers();
    let info = if status == StatusCode::PARTIAL_CONTENT {
        let total_bytes = headers
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        RemoteInfo {
            total_bytes: total_bytes.unwrap_or(0),
            accept_ranges: total_bytes.is_some(),
        }
    } else if status.is_success() {
        let total_bytes = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        RemoteInfo {
            total_bytes: total_bytes.unwrap_or(0),
            accept_ranges: false,
        }
    } else {
        return Err(CoreError::Http {
            status: status.as_u16(),
        });
    };
    debug!(
        url,
        total_bytes = info.total_bytes,
        accept_ranges = info.accept_ranges,
        "probed resource with GET"
    );
    Ok(info)
}

/// Extracts the full length from `bytes 0-0/1234`; `*` means unknown.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
