use std::time::Duration;

use assert_matches::assert_matches;

use sdo_fetch::config::{Config, ConfigLoader};
use sdo_fetch::domain::{FetchStrategy, SourceKey};
use sdo_fetch::error::SdoError;

#[test]
fn loads_explicit_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sdo-fetch.json");
    std::fs::write(
        &path,
        r#"{
            "output_dir": "archive",
            "strategy": "screenshot",
            "image_scale": 4.8,
            "interval_secs": 120,
            "sources": ["aia_304", "HMI_Continuum"],
            "api_base_url": "http://localhost:8080/v2"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.output_dir.as_ref().map(|dir| dir.as_str()), Some("archive"));
    assert_eq!(resolved.output_dir_or("ignored").as_str(), "archive");
    assert_eq!(resolved.strategy, FetchStrategy::Screenshot);
    assert_eq!(resolved.image_scale, 4.8);
    assert_eq!(resolved.interval, Duration::from_secs(120));
    assert_eq!(
        resolved
            .sources
            .iter()
            .map(SourceKey::as_str)
            .collect::<Vec<_>>(),
        vec!["AIA_304", "HMI_Continuum"]
    );
    assert_eq!(
        resolved.endpoints.api("getTile"),
        "http://localhost:8080/v2/getTile/"
    );
    assert_eq!(
        resolved.endpoints.direct_base,
        "https://sdo.gsfc.nasa.gov/assets/img/latest/"
    );
}

#[test]
fn missing_file_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(SdoError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{ \"sources\": [").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SdoError::ConfigParse(_));
    assert!(err.is_invalid_argument());
}

#[test]
fn invalid_values_are_rejected() {
    let bad_source = Config {
        sources: Some(vec!["AIA_171".to_string(), "EIT_195".to_string()]),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_source),
        Err(SdoError::InvalidSource(name)) if name == "EIT_195"
    );

    let bad_scale = Config {
        image_scale: Some(-1.0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_scale),
        Err(SdoError::InvalidScale(_))
    );

    let bad_interval = Config {
        interval_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_interval),
        Err(SdoError::InvalidInterval(_))
    );

    let bad_timeout = Config {
        timeout_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_timeout),
        Err(SdoError::ConfigParse(_))
    );
}
