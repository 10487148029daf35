#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde_json::Value;

use sdo_fetch::app::{App, ProgressEvent, ProgressSink};
use sdo_fetch::config::Endpoints;
use sdo_fetch::error::SdoError;
use sdo_fetch::helioviewer::{ApiRequest, DownloadInfo, HelioviewerClient};
use sdo_fetch::store::OutputDir;

pub const IMAGE_BYTES: &[u8] = b"\xff\xd8\xff\xe0sdo";

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Canned responses keyed by API method name, plus a log of every request.
#[derive(Default)]
pub struct MockClient {
    pub json: Vec<(&'static str, Value)>,
    pub json_unreachable: bool,
    pub failing_downloads: Vec<&'static str>,
    pub last_modified: Option<String>,
    pub calls: Mutex<Vec<ApiRequest>>,
}

impl MockClient {
    pub fn with_json(mut self, method: &'static str, value: Value) -> Self {
        self.json.push((method, value));
        self
    }

    pub fn failing(mut self, url_part: &'static str) -> Self {
        self.failing_downloads.push(url_part);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl HelioviewerClient for MockClient {
    fn get_json(&self, request: &ApiRequest, _timeout: Duration) -> Result<Value, SdoError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.json_unreachable {
            return Err(SdoError::HelioviewerHttp("connection refused".to_string()));
        }
        self.json
            .iter()
            .find(|(method, _)| request.url.contains(method))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| SdoError::HelioviewerStatus {
                status: 404,
                message: format!("no canned response for {}", request.url),
            })
    }

    fn download(&self, request: &ApiRequest, destination: &Path) -> Result<DownloadInfo, SdoError> {
        self.calls.lock().unwrap().push(request.clone());
        if self
            .failing_downloads
            .iter()
            .any(|part| request.url.contains(part))
        {
            return Err(SdoError::HelioviewerStatus {
                status: 404,
                message: "not found".to_string(),
            });
        }
        std::fs::write(destination, IMAGE_BYTES)
            .map_err(|err| SdoError::Filesystem(err.to_string()))?;
        Ok(DownloadInfo {
            bytes: IMAGE_BYTES.len() as u64,
            last_modified: self.last_modified.clone(),
        })
    }
}

pub fn app_in(dir: &Path, client: MockClient) -> App<MockClient> {
    let root = Utf8PathBuf::from_path_buf(dir.join("out")).unwrap();
    App::new(OutputDir::new(root), client, Endpoints::default())
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}
