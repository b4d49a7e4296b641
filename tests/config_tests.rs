use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use photo_swiper::config::{Configuration, SourceConfig};

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
per-page: 30
start-page: 4
http-timeout: 3s
buffer:
  initial-fill: 10
  lookahead: 4
  refill-chunk: 8
preload:
  window: 5
  sweep-interval: 250ms
  timeout: 1m
  max-in-flight: 2
navigation:
  transition-duration: 300ms
  debounce: 1s
  seed: 11
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.per_page, 30);
    assert_eq!(cfg.start_page, Some(4));
    assert_eq!(cfg.resolve_start_page(), 4);
    assert_eq!(cfg.http_timeout, Duration::from_secs(3));
    assert_eq!(cfg.buffer.initial_fill, 10);
    assert_eq!(cfg.buffer.refill_chunk, 8);
    assert_eq!(cfg.preload.sweep_interval, Duration::from_millis(250));
    assert_eq!(cfg.preload.timeout, Duration::from_secs(60));
    assert_eq!(cfg.preload.max_in_flight, 2);
    assert_eq!(cfg.navigation.debounce, Duration::from_secs(1));
    assert_eq!(cfg.navigation.seed, Some(11));
}

#[test]
fn partial_sections_keep_defaults() {
    let yaml = r#"
buffer:
  lookahead: 6
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.buffer.lookahead, 6);
    assert_eq!(cfg.buffer.initial_fill, 5);
    assert_eq!(cfg.buffer.refill_chunk, 5);
    assert_eq!(cfg.per_page, 15);
    assert_eq!(cfg.start_page, None);
    assert_eq!(cfg.preload.timeout, Duration::from_secs(15));
    assert_eq!(cfg.navigation.transition_duration, Duration::from_millis(400));
}

#[test]
fn parse_direct_source() {
    let yaml = r#"
source:
  kind: direct
  api-key-env: MY_PHOTO_KEY
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    match &cfg.source {
        SourceConfig::Direct {
            endpoint,
            api_key_env,
        } => {
            assert_eq!(endpoint, "https://api.pexels.com/v1/curated");
            assert_eq!(api_key_env, "MY_PHOTO_KEY");
        }
        other => panic!("expected direct source, got {other:?}"),
    }
    assert_eq!(
        cfg.source.url().unwrap().as_str(),
        "https://api.pexels.com/v1/curated"
    );
}

#[test]
fn parse_relay_section() {
    let yaml = r#"
source:
  kind: relay
  url: "http://photos.internal:8080/api/pexels"
relay:
  bind: "0.0.0.0:8080"
  per-page: 20
  cache-control: "no-store"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.relay.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(cfg.relay.per_page, 20);
    assert_eq!(cfg.relay.cache_control, "no-store");
    assert_eq!(cfg.relay.api_key_env, "PEXELS_API_KEY");
    assert_eq!(cfg.source.url().unwrap().port(), Some(8080));
}

#[test]
fn rejects_unknown_keys() {
    let yaml = r#"
per-page: 15
photo-library-path: "/photos"
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());

    let nested = r#"
preload:
  windw: 3
"#;
    assert!(serde_yaml::from_str::<Configuration>(nested).is_err());
}

#[test]
fn validation_rejects_zero_values() {
    for yaml in [
        "per-page: 0\n",
        "start-page: 0\n",
        "http-timeout: 0s\n",
        "buffer:\n  lookahead: 0\n",
        "buffer:\n  initial-fill: 0\n",
        "preload:\n  window: 0\n",
        "preload:\n  max-in-flight: 0\n",
        "preload:\n  timeout: 0s\n",
    ] {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted {yaml:?}");
    }
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "per-page: 12").unwrap();
    writeln!(file, "navigation:").unwrap();
    writeln!(file, "  seed: 3").unwrap();

    let cfg = Configuration::from_yaml_file(file.path()).unwrap();
    assert_eq!(cfg.per_page, 12);
    assert_eq!(cfg.navigation_settings().seed, Some(3));
}

#[test]
fn empty_file_is_all_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.per_page, 15);
    assert_eq!(cfg.source, SourceConfig::default());
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = Configuration::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}
