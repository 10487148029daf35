use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::{DEFAULT_IMAGE_SCALE, DEFAULT_TIMEOUT_SECS, Endpoints};
use crate::domain::{FetchStrategy, SourceKey};
use crate::error::{FailureReason, SdoError};
use crate::helioviewer::{ApiRequest, HelioviewerClient};
use crate::resolver::{DateOrigin, DateResolver, ResolvedDate};
use crate::store::OutputDir;

pub const UNKNOWN_DATE: &str = "unknown";
const DIRECT_NOTE: &str = "This is the latest available image from NASA SDO";

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub strategy: FetchStrategy,
    pub image_scale: f64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::default(),
            image_scale: DEFAULT_IMAGE_SCALE,
        }
    }
}

/// Metadata written next to each image. Strategy-specific fields are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchRecord {
    pub source: String,
    pub name: String,
    pub wavelength: String,
    pub description: String,
    pub strategy: FetchStrategy,
    pub observation_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_origin: Option<DateOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub filepath: String,
    pub download_time: String,
    pub image_url: String,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub source: String,
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub items: Vec<FetchRecord>,
    pub failures: Vec<FetchFailure>,
}

impl BatchResult {
    pub fn attempted(&self) -> usize {
        self.items.len() + self.failures.len()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// What a strategy resolved before the image itself is downloaded.
struct PreparedDownload {
    request: ApiRequest,
    observation_date: Option<String>,
    requested: Option<ResolvedDate>,
    image_id: Option<String>,
    note: Option<String>,
}

pub struct App<C: HelioviewerClient> {
    output: OutputDir,
    client: C,
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl<C: HelioviewerClient> App<C> {
    pub fn new(output: OutputDir, client: C, endpoints: Endpoints) -> Self {
        Self {
            output,
            client,
            endpoints,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn output(&self) -> &OutputDir {
        &self.output
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn resolve_date(&self) -> ResolvedDate {
        DateResolver::new(&self.client, &self.endpoints).resolve(Utc::now())
    }

    pub fn latest_timestamp(&self) -> Result<Option<String>, SdoError> {
        DateResolver::new(&self.client, &self.endpoints).latest_data_timestamp()
    }

    /// Fetches one source by name. Unknown names fail before any request is made.
    pub fn fetch_source(
        &self,
        source: &str,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchRecord, SdoError> {
        let key: SourceKey = source.parse()?;
        self.fetch_key(key, options, sink)
    }

    /// Validates every name first, then fetches them in order.
    pub fn fetch_named(
        &self,
        sources: &[String],
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, SdoError> {
        let keys = SourceKey::parse_list(sources)?;
        Ok(self.fetch_batch(&keys, options, sink))
    }

    /// Fetches each source in order. A failed source is recorded and the batch moves on.
    pub fn fetch_batch(
        &self,
        sources: &[SourceKey],
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> BatchResult {
        let mut result = BatchResult::default();
        for (index, key) in sources.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("batch {}/{}: {key}", index + 1, sources.len()),
                elapsed: None,
            });
            match self.fetch_key(*key, options, sink) {
                Ok(record) => result.items.push(record),
                Err(err) => {
                    tracing::warn!(source = %key, error = %err, "fetch failed");
                    sink.event(ProgressEvent {
                        message: format!("phase=Fail; {key}: {err}"),
                        elapsed: None,
                    });
                    result.failures.push(FetchFailure {
                        source: key.to_string(),
                        reason: err.failure_reason(),
                        message: err.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            downloaded = result.items.len(),
            attempted = result.attempted(),
            "batch finished"
        );
        result
    }

    pub fn fetch_key(
        &self,
        key: SourceKey,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchRecord, SdoError> {
        let descriptor = key.descriptor();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {key} ({}) via {}",
                descriptor.description, options.strategy
            ),
            elapsed: None,
        });

        let prepared = match options.strategy {
            FetchStrategy::Direct => self.prepare_direct(key),
            FetchStrategy::Tile => self.prepare_tile(key, options.image_scale, sink)?,
            FetchStrategy::Screenshot => self.prepare_screenshot(key, options.image_scale, sink)?,
        };

        self.output.ensure()?;
        let temp = self.output.temp_file()?;
        let image_url = display_url(&prepared.request);
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {image_url}"),
            elapsed: None,
        });
        let start = Instant::now();
        let download = self.client.download(&prepared.request, temp.path())?;
        let elapsed = start.elapsed();

        let fetched_at = Utc::now();
        let image_path = self
            .output
            .image_path(key, fetched_at, options.strategy.extension());
        OutputDir::persist(temp, &image_path)?;
        sink.event(ProgressEvent {
            message: format!("phase=Store; image {image_path} ({} bytes)", download.bytes),
            elapsed: Some(elapsed),
        });

        let record = FetchRecord {
            source: key.to_string(),
            name: descriptor.name.to_string(),
            wavelength: descriptor.wavelength.to_string(),
            description: descriptor.description.to_string(),
            strategy: options.strategy,
            observation_date: prepared
                .observation_date
                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            requested_date: prepared.requested.as_ref().map(|date| date.value.clone()),
            date_origin: prepared.requested.as_ref().map(|date| date.origin),
            image_id: prepared.image_id,
            filepath: image_path.to_string(),
            download_time: fetched_at.to_rfc3339(),
            image_url,
            bytes: download.bytes,
            last_modified: download.last_modified,
            note: prepared.note,
        };

        let metadata_path = OutputDir::metadata_path(&image_path);
        OutputDir::write_metadata(&metadata_path, &record)?;
        sink.event(ProgressEvent {
            message: format!("phase=Store; metadata {metadata_path}"),
            elapsed: None,
        });
        tracing::info!(source = %key, path = %image_path, "image saved");

        Ok(record)
    }

    fn prepare_direct(&self, key: SourceKey) -> PreparedDownload {
        PreparedDownload {
            request: ApiRequest::new(self.endpoints.direct_image(key.descriptor().direct_code)),
            observation_date: None,
            requested: None,
            image_id: None,
            note: Some(DIRECT_NOTE.to_string()),
        }
    }

    fn prepare_tile(
        &self,
        key: SourceKey,
        image_scale: f64,
        sink: &dyn ProgressSink,
    ) -> Result<PreparedDownload, SdoError> {
        let date = self.resolve_date_with_progress(sink);
        let endpoint = self.endpoints.api("getClosestImage");
        let request = ApiRequest::new(endpoint.clone())
            .param("date", &date.value)
            .param("sourceId", key.descriptor().source_id);
        let info = self.client.get_json(&request, self.request_timeout)?;

        let image_id = json_id(&info).ok_or_else(|| SdoError::UnexpectedResponse {
            endpoint,
            message: error_message(&info).unwrap_or_else(|| "missing image id".to_string()),
        })?;
        let observation_date = info
            .get("date")
            .and_then(Value::as_str)
            .map(str::to_string);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Prepare; closest image {image_id} observed {}",
                observation_date.as_deref().unwrap_or(UNKNOWN_DATE)
            ),
            elapsed: None,
        });

        Ok(PreparedDownload {
            request: ApiRequest::new(self.endpoints.api("getTile"))
                .param("id", &image_id)
                .param("x", 0)
                .param("y", 0)
                .param("imageScale", image_scale)
                .param("display", "true"),
            observation_date,
            requested: Some(date),
            image_id: Some(image_id),
            note: None,
        })
    }

    fn prepare_screenshot(
        &self,
        key: SourceKey,
        image_scale: f64,
        sink: &dyn ProgressSink,
    ) -> Result<PreparedDownload, SdoError> {
        let date = self.resolve_date_with_progress(sink);
        let endpoint = self.endpoints.api("takeScreenshot");
        let request = ApiRequest::new(endpoint.clone())
            .param("date", &date.value)
            .param("imageScale", image_scale)
            .param("layers", format!("[SDO,{},1,100]", key.descriptor().source_id))
            .param("eventLabels", "false")
            .param("scale", "true")
            .param("scaleType", "earth")
            .param("scaleX", 0)
            .param("scaleY", 0)
            .param("width", 1024)
            .param("height", 1024)
            .param("display", "false")
            .param("watermark", "false");
        let info = self.client.get_json(&request, self.request_timeout)?;

        let (download, image_id) = if let Some(path) = info.get("url").and_then(Value::as_str) {
            (ApiRequest::new(self.endpoints.api_host_url(path)?), json_id(&info))
        } else if let Some(id) = json_id(&info) {
            (
                ApiRequest::new(self.endpoints.api("downloadScreenshot")).param("id", &id),
                Some(id),
            )
        } else {
            return Err(SdoError::UnexpectedResponse {
                endpoint,
                message: error_message(&info)
                    .unwrap_or_else(|| "missing screenshot url or id".to_string()),
            });
        };

        Ok(PreparedDownload {
            request: download,
            observation_date: Some(date.value.clone()),
            requested: Some(date),
            image_id,
            note: None,
        })
    }

    fn resolve_date_with_progress(&self, sink: &dyn ProgressSink) -> ResolvedDate {
        let date = self.resolve_date();
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; requesting data from {}", date.value),
            elapsed: None,
        });
        date
    }
}

fn json_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn display_url(request: &ApiRequest) -> String {
    if request.query.is_empty() {
        return request.url.clone();
    }
    reqwest::Url::parse_with_params(&request.url, &request.query)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| request.url.clone())
}
