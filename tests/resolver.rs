mod common;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;

use sdo_fetch::config::Endpoints;
use sdo_fetch::error::SdoError;
use sdo_fetch::resolver::{DateOrigin, DateResolver, HISTORICAL_FALLBACK_DATE};

use common::MockClient;

#[test]
fn api_window_end_is_used() {
    let client = MockClient::default().with_json(
        "getDataSources",
        json!({"SDO": {"AIA": {"end": "2025-07-01 08:00:12"}}}),
    );
    let endpoints = Endpoints::default();
    let resolver = DateResolver::new(&client, &endpoints);

    let date = resolver.resolve(Utc::now());
    assert_eq!(date.value, "2025-07-01 08:00:12");
    assert_eq!(date.origin, DateOrigin::Api);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url,
        "https://api.helioviewer.org/v2/getDataSources/"
    );
}

#[test]
fn response_without_aia_uses_recent_fallback() {
    let client =
        MockClient::default().with_json("getDataSources", json!({"SOHO": {"EIT": {}}}));
    let endpoints = Endpoints::default();
    let now = Utc.with_ymd_and_hms(2025, 2, 3, 0, 15, 0).unwrap();

    let date = DateResolver::new(&client, &endpoints).resolve(now);
    assert_eq!(date.value, "2025-02-02T23:45:00.000Z");
    assert_eq!(date.origin, DateOrigin::RecentFallback);
}

#[test]
fn failed_query_uses_historical_fallback() {
    let client = MockClient {
        json_unreachable: true,
        ..MockClient::default()
    };
    let endpoints = Endpoints::default();

    let date = DateResolver::new(&client, &endpoints).resolve(Utc::now());
    assert_eq!(date.value, HISTORICAL_FALLBACK_DATE);
    assert_eq!(date.origin, DateOrigin::HistoricalFallback);
}

#[test]
fn status_error_also_uses_historical_fallback() {
    let client = MockClient::default();
    let endpoints = Endpoints::default();

    let date = DateResolver::new(&client, &endpoints).resolve(Utc::now());
    assert_eq!(date.origin, DateOrigin::HistoricalFallback);
}

#[test]
fn strict_timestamp_reports_errors_and_missing_windows() {
    let endpoints = Endpoints::default();

    let unreachable = MockClient {
        json_unreachable: true,
        ..MockClient::default()
    };
    assert_matches!(
        DateResolver::new(&unreachable, &endpoints).latest_data_timestamp(),
        Err(SdoError::HelioviewerHttp(_))
    );

    let empty = MockClient::default().with_json("getDataSources", json!([]));
    assert_eq!(
        DateResolver::new(&empty, &endpoints)
            .latest_data_timestamp()
            .unwrap(),
        None
    );
}
