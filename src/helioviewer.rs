use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, LAST_MODIFIED, USER_AGENT};
use serde_json::Value;

use crate::error::SdoError;

/// A GET request against one of the remote services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadInfo {
    pub bytes: u64,
    pub last_modified: Option<String>,
}

pub trait HelioviewerClient: Send + Sync {
    fn get_json(&self, request: &ApiRequest, timeout: Duration) -> Result<Value, SdoError>;
    fn download(&self, request: &ApiRequest, destination: &Path) -> Result<DownloadInfo, SdoError>;
}

#[derive(Clone)]
pub struct HelioviewerHttpClient {
    client: Client,
}

impl HelioviewerHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, SdoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sdo-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SdoError::HelioviewerHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SdoError::HelioviewerHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn build(&self, request: &ApiRequest) -> RequestBuilder {
        self.client.get(&request.url).query(&request.query)
    }

    fn handle_status(response: Response) -> Result<Response, SdoError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .filter(|text| !text.trim().is_empty())
            .map(|text| truncate(&text, 200))
            .unwrap_or_else(|| "request failed".to_string());
        Err(SdoError::HelioviewerStatus { status, message })
    }
}

impl HelioviewerClient for HelioviewerHttpClient {
    fn get_json(&self, request: &ApiRequest, timeout: Duration) -> Result<Value, SdoError> {
        tracing::debug!(url = %request.url, "GET json");
        let response = self
            .build(request)
            .timeout(timeout)
            .send()
            .map_err(|err| SdoError::HelioviewerHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response.json().map_err(|err| SdoError::UnexpectedResponse {
            endpoint: request.url.clone(),
            message: err.to_string(),
        })
    }

    fn download(&self, request: &ApiRequest, destination: &Path) -> Result<DownloadInfo, SdoError> {
        tracing::debug!(url = %request.url, "GET image");
        let response = self
            .build(request)
            .send()
            .map_err(|err| SdoError::HelioviewerHttp(err.to_string()))?;
        let mut response = Self::handle_status(response)?;
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut file =
            File::create(destination).map_err(|err| SdoError::Filesystem(err.to_string()))?;
        let bytes = copy_body(&mut response, &mut file)?;
        Ok(DownloadInfo {
            bytes,
            last_modified,
        })
    }
}

/// Streams `reader` into `writer`, keeping read failures (network) apart from
/// write failures (local disk).
fn copy_body<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, SdoError> {
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(SdoError::HelioviewerHttp(err.to_string())),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| SdoError::Filesystem(format!("write image: {err}")))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(|err| SdoError::Filesystem(format!("write image: {err}")))?;
    Ok(total)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
