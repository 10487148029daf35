use std::time::Duration;

use camino::Utf8PathBuf;

use sdo_fetch::app::{App, FetchOptions, ProgressEvent, ProgressSink};
use sdo_fetch::config::Endpoints;
use sdo_fetch::helioviewer::HelioviewerHttpClient;
use sdo_fetch::store::OutputDir;

struct Quiet;

impl ProgressSink for Quiet {
    fn event(&self, _event: ProgressEvent) {}
}

fn live_app(dir: &std::path::Path) -> App<HelioviewerHttpClient> {
    let root = Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap();
    let client = HelioviewerHttpClient::new(Duration::from_secs(30)).unwrap();
    App::new(OutputDir::new(root), client, Endpoints::default())
}

#[test]
#[ignore = "requires network access"]
fn live_direct_fetch() {
    let temp = tempfile::tempdir().unwrap();
    let app = live_app(temp.path());
    let record = app
        .fetch_source("AIA_171", FetchOptions::default(), &Quiet)
        .unwrap();
    assert!(record.bytes > 0);
    assert!(std::path::Path::new(&record.filepath).exists());
}

#[test]
#[ignore = "requires network access"]
fn live_latest_timestamp() {
    let temp = tempfile::tempdir().unwrap();
    let app = live_app(temp.path());
    assert!(app.latest_timestamp().unwrap().is_some());
}
