use std::net::SocketAddr;
use std::time::Duration;

use super::*;
use crate::state::{ControllerEvent, ControllerState, EventFilter};
use crate::types::DeviceKind;

async fn running(h: &Harness) {
    assert_eq!(h.controller.step(Some(recorder())).await, ControllerState::Running);
}

#[tokio::test]
async fn test_uninitialized_ignores_timeouts_and_cameras() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));

    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);
    assert_eq!(
        h.controller.step(Some(camera(64, "porch"))).await,
        ControllerState::Uninitialized
    );

    assert_eq!(h.probe.call_count(), 0);
    assert_eq!(h.controller.registry_len().await, 0);
}

#[tokio::test]
async fn test_recorder_binds_clock() {
    let h = harness(4, ScriptedProbe::new(Some(0.25)));
    let mut states = EventFilter::state_events(h.controller.events());

    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);
    assert_eq!(h.controller.step(Some(recorder())).await, ControllerState::Running);

    assert_eq!(h.controller.state().await, ControllerState::Running);
    assert_eq!(h.probe.calls(), vec![SocketAddr::new(RECORDER, 123)]);
    assert_eq!(h.controller.clock().source(), Some(RECORDER));
    assert!(h.controller.is_clock_valid().await);
    assert_eq!(h.controller.now().await, Ok(start() + Duration::from_millis(250)));

    let status = h.controller.status().await;
    assert_eq!(status.state, ControllerState::Running);
    assert_eq!(status.time_source, Some(RECORDER));

    assert_eq!(
        states.try_recv(),
        Some(ControllerEvent::ClockAcquired { source: RECORDER })
    );
    assert_eq!(
        states.try_recv(),
        Some(ControllerEvent::StateChanged {
            old: ControllerState::Uninitialized,
            new: ControllerState::Running,
        })
    );
}

#[tokio::test]
async fn test_binding_record_is_not_registered() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    running(&h).await;

    assert_eq!(h.controller.registry_len().await, 0);
    assert!(h.controller.snapshot_by_kind(DeviceKind::Nvr).await.is_empty());
}

#[tokio::test]
async fn test_unusable_recorder_stays_uninitialized() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    h.probe.set_unreachable(RECORDER);

    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);
    assert_eq!(
        h.controller.step(Some(recorder())).await,
        ControllerState::Uninitialized
    );

    assert_eq!(h.controller.clock().source(), None);
    assert!(!h.controller.is_clock_valid().await);
    assert_eq!(h.controller.status().await.state, ControllerState::Uninitialized);
}

#[tokio::test]
async fn test_running_registers_records() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    running(&h).await;
    let mut registry = EventFilter::registry_events(h.controller.events());

    assert_eq!(
        h.controller.step(Some(camera(64, "porch"))).await,
        ControllerState::Running
    );
    assert_eq!(h.controller.step(Some(recorder())).await, ControllerState::Running);
    assert_eq!(h.controller.step(None).await, ControllerState::Running);

    let cameras = h.controller.snapshot_by_kind(DeviceKind::Device).await;
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].hostname(), "porch");
    assert_eq!(h.controller.snapshot_by_kind(DeviceKind::Nvr).await.len(), 1);
    assert_eq!(h.controller.status().await.registered, 2);

    assert_eq!(
        registry.try_recv(),
        Some(ControllerEvent::DeviceRegistered {
            host: "192.168.1.64".parse().unwrap(),
            kind: DeviceKind::Device,
            hostname: "porch".to_string(),
        })
    );
}

#[tokio::test]
async fn test_running_evicts_stale_records() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    running(&h).await;
    let mut registry = EventFilter::registry_events(h.controller.events());

    h.controller.step(Some(camera(10, "a"))).await;
    h.local.advance(Duration::from_secs(100));
    h.controller.step(Some(camera(11, "b"))).await;
    h.local.advance(Duration::from_secs(28));
    h.controller.step(None).await;
    // "a" is exactly max_age old and survives
    assert_eq!(h.controller.registry_len().await, 2);

    h.local.advance(Duration::from_secs(1));
    h.controller.step(None).await;

    let cameras = h.controller.snapshot_by_kind(DeviceKind::Device).await;
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].hostname(), "b");

    let mut evicted = None;
    while let Some(event) = registry.try_recv() {
        if let ControllerEvent::DevicesEvicted { hosts } = event {
            evicted = Some(hosts);
        }
    }
    assert_eq!(evicted, Some(vec!["192.168.1.10".parse().unwrap()]));
}

#[tokio::test]
async fn test_clock_loss_resets_registry_once() {
    let h = harness(1, ScriptedProbe::new(Some(0.0)));
    let mut events = h.controller.events().subscribe();

    // valid
    running(&h).await;
    // record
    assert_eq!(
        h.controller.step(Some(camera(64, "porch"))).await,
        ControllerState::Running
    );
    assert_eq!(h.controller.registry_len().await, 1);

    // invalid
    h.probe.set_fallback(None);
    h.local.advance(Duration::from_secs(65));
    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);

    assert_eq!(h.controller.registry_len().await, 0);
    let status = h.controller.status().await;
    assert_eq!(status.resets, 1);
    assert_eq!(status.state, ControllerState::Uninitialized);
    assert_eq!(status.time_source, None);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let position = |wanted: &ControllerEvent| seen.iter().position(|e| e == wanted);

    let lost = position(&ControllerEvent::StateChanged {
        old: ControllerState::Running,
        new: ControllerState::ClockLost,
    })
    .unwrap();
    let reset = position(&ControllerEvent::RegistryReset { cleared: 1 }).unwrap();
    let recovered = position(&ControllerEvent::StateChanged {
        old: ControllerState::ClockLost,
        new: ControllerState::Uninitialized,
    })
    .unwrap();

    assert!(lost < reset && reset < recovered);
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, ControllerEvent::RegistryReset { .. }))
            .count(),
        1
    );
    assert!(seen.contains(&ControllerEvent::ClockLost {
        source: Some(RECORDER)
    }));
}

#[tokio::test]
async fn test_history_rides_out_failures() {
    let h = harness(2, ScriptedProbe::new(Some(0.0)));
    running(&h).await;
    h.controller.step(Some(camera(64, "porch"))).await;

    h.probe.set_fallback(None);
    h.local.advance(Duration::from_secs(65));
    assert_eq!(h.controller.step(None).await, ControllerState::Running);
    assert_eq!(h.controller.registry_len().await, 1);

    h.local.advance(Duration::from_secs(65));
    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);
    assert_eq!(h.controller.registry_len().await, 0);
}

#[tokio::test]
async fn test_rebinds_after_clock_loss() {
    let h = harness(1, ScriptedProbe::new(Some(0.0)));
    running(&h).await;

    h.probe.set_fallback(None);
    h.local.advance(Duration::from_secs(65));
    assert_eq!(h.controller.step(None).await, ControllerState::Uninitialized);

    // the same server is only asked again once max_sync_age has passed
    h.probe.set_fallback(Some(1.0));
    assert_eq!(
        h.controller.step(Some(recorder())).await,
        ControllerState::Uninitialized
    );

    h.local.advance(Duration::from_secs(65));
    assert_eq!(h.controller.step(Some(recorder())).await, ControllerState::Running);
    assert_eq!(h.controller.status().await.resets, 1);
}

#[tokio::test]
async fn test_snapshot_empty_when_not_running() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));

    assert!(h.controller.snapshot_by_kind(DeviceKind::Device).await.is_empty());
    assert!(h.controller.snapshot_by_kind(DeviceKind::Nvr).await.is_empty());
}

#[tokio::test]
async fn test_undecodable_datagram_counts_as_timeout() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    running(&h).await;
    let mut errors = EventFilter::error_events(h.controller.events());
    let source = SocketAddr::from(([192, 168, 1, 9], 5050));

    let state = h.controller.handle_datagram(&[0x42, 0x00], source).await;

    assert_eq!(state, ControllerState::Running);
    assert_eq!(h.controller.registry_len().await, 0);
    assert_eq!(
        errors.try_recv(),
        Some(ControllerEvent::DecodeFailed {
            source,
            error: crate::error::DecodeError::UnknownMagic(0x42),
        })
    );
}

#[tokio::test]
async fn test_datagram_from_recorder_binds() {
    let h = harness(4, ScriptedProbe::new(Some(0.0)));
    let payload = crate::testing::packets::nvr_payload(&[("Name", "NVR")]);

    let state = h
        .controller
        .handle_datagram(&payload, SocketAddr::new(RECORDER, 37810))
        .await;

    assert_eq!(state, ControllerState::Running);
}
