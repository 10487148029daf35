use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::Endpoints;
use crate::error::SdoError;
use crate::helioviewer::{ApiRequest, HelioviewerClient};

/// Known date with archived data, used when the API cannot be reached at all.
pub const HISTORICAL_FALLBACK_DATE: &str = "2024-12-01T12:00:00.000Z";
pub const RECENT_FALLBACK_MINUTES: i64 = 30;
pub const DATE_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrigin {
    Api,
    RecentFallback,
    HistoricalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDate {
    pub value: String,
    pub origin: DateOrigin,
}

pub struct DateResolver<'a, C: HelioviewerClient> {
    client: &'a C,
    endpoints: &'a Endpoints,
}

impl<'a, C: HelioviewerClient> DateResolver<'a, C> {
    pub fn new(client: &'a C, endpoints: &'a Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Latest observation date to request. Never fails: a response without the
    /// SDO/AIA window yields "now - 30 min", a failed request the historical date.
    pub fn resolve(&self, now: DateTime<Utc>) -> ResolvedDate {
        match self.query_data_sources() {
            Ok(data) => match find_latest_aia_end(&data) {
                Some(end) => {
                    tracing::info!(date = %end, "latest SDO data available");
                    ResolvedDate {
                        value: end,
                        origin: DateOrigin::Api,
                    }
                }
                None => {
                    let value = recent_fallback(now);
                    tracing::warn!(date = %value, "data sources lack SDO/AIA window, using recent fallback");
                    ResolvedDate {
                        value,
                        origin: DateOrigin::RecentFallback,
                    }
                }
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    date = HISTORICAL_FALLBACK_DATE,
                    "could not determine latest date, using historical fallback"
                );
                ResolvedDate {
                    value: HISTORICAL_FALLBACK_DATE.to_string(),
                    origin: DateOrigin::HistoricalFallback,
                }
            }
        }
    }

    /// Same query as [`resolve`](Self::resolve) without fallbacks.
    pub fn latest_data_timestamp(&self) -> Result<Option<String>, SdoError> {
        let data = self.query_data_sources()?;
        Ok(find_latest_aia_end(&data))
    }

    fn query_data_sources(&self) -> Result<Value, SdoError> {
        let request = ApiRequest::new(self.endpoints.api("getDataSources"));
        self.client.get_json(&request, DATE_QUERY_TIMEOUT)
    }
}

pub fn recent_fallback(now: DateTime<Utc>) -> String {
    (now - TimeDelta::minutes(RECENT_FALLBACK_MINUTES))
        .format(API_DATE_FORMAT)
        .to_string()
}

/// Finds the end of the SDO/AIA observation window.
///
/// Accepts both the list form (`[{"name": "SDO", "children": [{"name": "AIA", "end": ..}]}]`)
/// and the keyed form (`{"SDO": {"AIA": {"171": {"end": ..}, ..}}}`); for the keyed
/// form the latest end across wavelengths wins.
pub fn find_latest_aia_end(data: &Value) -> Option<String> {
    match data {
        Value::Array(observatories) => observatories
            .iter()
            .filter(|item| item.get("name").and_then(Value::as_str) == Some("SDO"))
            .filter_map(|item| item.get("children").and_then(Value::as_array))
            .flatten()
            .filter(|child| child.get("name").and_then(Value::as_str) == Some("AIA"))
            .find_map(|child| non_empty_str(child.get("end"))),
        Value::Object(_) => {
            let aia = data.get("SDO")?.get("AIA")?;
            if let Some(end) = non_empty_str(aia.get("end")) {
                return Some(end);
            }
            aia.as_object()?
                .values()
                .filter_map(|layer| non_empty_str(layer.get("end")))
                .max()
        }
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn list_form_end() {
        let data = json!([
            {"name": "SOHO", "children": [{"name": "EIT", "end": "2010-01-01"}]},
            {"name": "SDO", "children": [
                {"name": "HMI", "end": "2025-01-01T00:00:00.000Z"},
                {"name": "AIA", "end": "2025-03-04T05:06:07.000Z"}
            ]}
        ]);
        assert_eq!(
            find_latest_aia_end(&data).as_deref(),
            Some("2025-03-04T05:06:07.000Z")
        );
    }

    #[test]
    fn keyed_form_takes_latest_layer() {
        let data = json!({"SDO": {"AIA": {
            "171": {"sourceId": 10, "end": "2025-03-04 05:06:07"},
            "193": {"sourceId": 11, "end": "2025-03-04 05:07:00"}
        }}});
        assert_eq!(
            find_latest_aia_end(&data).as_deref(),
            Some("2025-03-04 05:07:00")
        );
    }

    #[test]
    fn missing_structure_is_none() {
        assert_eq!(find_latest_aia_end(&json!({"status": "ok"})), None);
        assert_eq!(find_latest_aia_end(&json!([{"name": "SDO"}])), None);
        assert_eq!(find_latest_aia_end(&json!("SDO")), None);
    }

    #[test]
    fn recent_fallback_is_thirty_minutes_back() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 10, 45).unwrap();
        assert_eq!(recent_fallback(now), "2025-06-01T11:40:45.000Z");
    }
}
