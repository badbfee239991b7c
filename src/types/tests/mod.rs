use super::*;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::NaiveTime;

use crate::error::TwilightError;

// --- config.rs tests ---

#[test]
fn test_config_defaults() {
    let config = TwilightConfig::default();

    assert_eq!(config.discovery.port, 5050);
    assert_eq!(config.discovery.receive_timeout, Duration::from_secs(10));
    assert_eq!(config.discovery.max_age, Duration::from_secs(128));
    assert_eq!(config.clock.server_port, 123);
    assert_eq!(config.clock.server_timeout, Duration::from_secs(5));
    assert_eq!(config.clock.offset_history, 8);
    assert_eq!(config.clock.max_sync_age, Duration::from_secs(64));
    assert_eq!(config.clock.sleep_resolution, Duration::from_secs(1));
    assert_eq!(config.schedule.start_time, NaiveTime::MIN);
    assert_eq!(config.schedule.repeat, Duration::from_secs(3600));
    assert!(config.devices.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_builder() {
    let config = TwilightConfig::builder()
        .discovery_port(6000)
        .receive_timeout(Duration::from_secs(2))
        .max_age(Duration::from_secs(30))
        .server_port(1123)
        .server_timeout(Duration::from_millis(500))
        .offset_history(4)
        .max_sync_age(Duration::from_secs(10))
        .sleep_resolution(Duration::from_millis(100))
        .start_time(NaiveTime::from_hms_opt(6, 0, 0).unwrap())
        .repeat(Duration::from_secs(900))
        .device(DeviceSelector {
            hostname: Some("cam-1".to_string()),
            ..DeviceSelector::default()
        })
        .build();

    assert_eq!(config.discovery.port, 6000);
    assert_eq!(config.discovery.receive_timeout, Duration::from_secs(2));
    assert_eq!(config.discovery.max_age, Duration::from_secs(30));
    assert_eq!(config.clock.server_port, 1123);
    assert_eq!(config.clock.server_timeout, Duration::from_millis(500));
    assert_eq!(config.clock.offset_history, 4);
    assert_eq!(config.clock.max_sync_age, Duration::from_secs(10));
    assert_eq!(config.clock.sleep_resolution, Duration::from_millis(100));
    assert_eq!(config.schedule.start_time, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    assert_eq!(config.schedule.repeat, Duration::from_secs(900));
    assert_eq!(config.devices.len(), 1);
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "discovery": { "port": 5151, "max_age": 60.5 },
        "clock": { "offset_history": 3, "server_timeout": 0.25 },
        "schedule": { "start_time": "06:30", "repeat": 1800 },
        "devices": [
            { "hostname": "porch", "mac": "3C-EF-8C-01-02-03" },
            { "ipv4": "192.168.1.64" }
        ]
    }"#;

    let config = TwilightConfig::from_json_str(json).unwrap();

    assert_eq!(config.discovery.port, 5151);
    assert_eq!(config.discovery.receive_timeout, Duration::from_secs(10));
    assert_eq!(config.discovery.max_age, Duration::from_millis(60_500));
    assert_eq!(config.clock.offset_history, 3);
    assert_eq!(config.clock.server_timeout, Duration::from_millis(250));
    assert_eq!(config.clock.server_port, 123);
    assert_eq!(config.schedule.start_time, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
    assert_eq!(config.schedule.repeat, Duration::from_secs(1800));
    assert_eq!(config.devices[0].hostname.as_deref(), Some("porch"));
    assert_eq!(config.devices[1].ipv4, Some(Ipv4Addr::new(192, 168, 1, 64)));
}

#[test]
fn test_config_from_json_rejects_unknown_keys() {
    let err = TwilightConfig::from_json_str(r#"{ "discover": {} }"#).unwrap_err();
    assert!(matches!(err, TwilightError::Config { .. }));
}

#[test]
fn test_config_from_json_rejects_negative_duration() {
    let err = TwilightConfig::from_json_str(r#"{ "clock": { "max_sync_age": -1 } }"#).unwrap_err();
    assert!(matches!(err, TwilightError::Config { .. }));
}

#[test]
fn test_config_validation() {
    let err = TwilightConfig::builder().offset_history(0).build().validate().unwrap_err();
    assert!(
        matches!(err, TwilightError::InvalidParameter { ref name, .. } if name == "clock.offset_history")
    );

    let err = TwilightConfig::builder()
        .repeat(Duration::ZERO)
        .build()
        .validate()
        .unwrap_err();
    assert!(matches!(err, TwilightError::InvalidParameter { ref name, .. } if name == "schedule.repeat"));

    let err = TwilightConfig::from_json_str(r#"{ "clock": { "sleep_resolution": 0 } }"#)
        .unwrap_err();
    assert!(matches!(err, TwilightError::InvalidParameter { .. }));
}

#[test]
fn test_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twilight.json");
    std::fs::write(&path, r#"{ "discovery": { "port": 7070 } }"#).unwrap();

    let config = TwilightConfig::from_json_file(&path).unwrap();
    assert_eq!(config.discovery.port, 7070);

    let err = TwilightConfig::from_json_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, TwilightError::Config { .. }));
}

fn start_time_from_json(value: &str) -> Result<NaiveTime, TwilightError> {
    let json = format!(r#"{{ "schedule": {{ "start_time": "{value}" }} }}"#);
    TwilightConfig::from_json_str(&json).map(|c| c.schedule.start_time)
}

#[test]
fn test_config_start_time_formats() {
    assert_eq!(start_time_from_json("00:00").unwrap(), NaiveTime::MIN);
    assert_eq!(
        start_time_from_json("23:59:59").unwrap(),
        NaiveTime::from_hms_opt(23, 59, 59).unwrap()
    );
    assert_eq!(
        start_time_from_json(" 07:05 ").unwrap(),
        NaiveTime::from_hms_opt(7, 5, 0).unwrap()
    );
}

#[test]
fn test_config_rejects_bad_start_time() {
    for value in ["24:00", "12:60", "12", "12:00:00:00", "noon", ""] {
        let err = start_time_from_json(value).unwrap_err();
        assert!(matches!(err, TwilightError::Config { .. }), "{value:?}");
    }
}

// --- device.rs tests ---

fn source(ip: [u8; 4]) -> SocketAddr {
    SocketAddr::from((ip, 5050))
}

fn nvr(ip: [u8; 4]) -> PresenceRecord {
    PresenceRecord::Nvr(NvrRecord {
        source: source(ip),
        header: RecordHeader::default(),
        trailer: Trailer::new(),
        truncated: false,
    })
}

fn camera() -> PresenceRecord {
    let mut trailer = Trailer::new();
    trailer.insert("Name", "Front Door");
    trailer.insert("SerialNo", "7K0ABC123");
    trailer.insert("IPv6Addr", "fe80::3eef:8cff:fe01:203/64;fe80::1");

    crate::testing::packets::device_record(source([192, 168, 1, 64]), "porch", "3c:ef:8c:01:02:03", trailer)
}

#[test]
fn test_device_kind_magic() {
    assert_eq!(DeviceKind::from_magic(0xA3), Some(DeviceKind::Nvr));
    assert_eq!(DeviceKind::from_magic(0xB3), Some(DeviceKind::Device));
    assert_eq!(DeviceKind::from_magic(0x00), None);
    assert_eq!(DeviceKind::Nvr.magic(), 0xA3);
    assert_eq!(DeviceKind::Device.magic(), 0xB3);
}

#[test]
fn test_trailer_keeps_insertion_order() {
    let mut trailer = Trailer::new();
    trailer.insert("b", "1");
    trailer.insert("a", "2");
    trailer.insert("b", "3");

    let entries: Vec<_> = trailer.iter().collect();
    assert_eq!(entries, vec![("b", "3"), ("a", "2")]);
    assert_eq!(trailer.get("a"), Some("2"));
    assert_eq!(trailer.get("missing"), None);
    assert_eq!(trailer.len(), 2);
}

#[test]
fn test_nvr_hostname_from_last_octet() {
    assert_eq!(nvr([10, 0, 0, 108]).hostname(), "NVR108");
}

#[test]
fn test_record_accessors() {
    let record = camera();

    assert_eq!(record.kind(), DeviceKind::Device);
    assert_eq!(record.host().to_string(), "192.168.1.64");
    assert_eq!(record.hostname(), "porch");
    assert_eq!(record.mac(), Some("3c:ef:8c:01:02:03"));
    assert_eq!(record.model(), Some("IPC-HDW"));
    assert_eq!(record.version(), Some("2.800.0.7"));
    assert_eq!(record.id(), Some("Front Door"));
    assert_eq!(record.serial(), Some("7K0ABC123"));
    assert_eq!(record.declared_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 64)));
    assert_eq!(
        record.ipv6(),
        Some("fe80::3eef:8cff:fe01:203".parse().unwrap())
    );
    assert!(record.as_device().is_some());

    let recorder = nvr([10, 0, 0, 1]);
    assert_eq!(recorder.mac(), None);
    assert_eq!(recorder.model(), None);
    assert_eq!(recorder.declared_ipv4(), None);
    assert_eq!(recorder.serial(), None);
}

#[test]
fn test_selector_empty_matches_any_camera() {
    assert!(DeviceSelector::default().matches(&camera()));
    assert!(!DeviceSelector::default().matches(&nvr([10, 0, 0, 1])));
}

#[test]
fn test_selector_all_criteria() {
    let selector = DeviceSelector {
        hostname: Some("porch".to_string()),
        id: Some("Front Door".to_string()),
        serial: Some("7K0ABC123".to_string()),
        ipv4: Some(Ipv4Addr::new(192, 168, 1, 64)),
        ipv6: Some("fe80::3eef:8cff:fe01:203".parse().unwrap()),
        mac: Some("3C-EF-8C-01-02-03".to_string()),
    };
    assert!(selector.matches(&camera()));
}

#[test]
fn test_selector_single_mismatch_fails() {
    let selector = DeviceSelector {
        hostname: Some("porch".to_string()),
        serial: Some("OTHER".to_string()),
        ..DeviceSelector::default()
    };
    assert!(!selector.matches(&camera()));

    let selector = DeviceSelector {
        mac: Some("3cef8c010204".to_string()),
        ..DeviceSelector::default()
    };
    assert!(!selector.matches(&camera()));
}
