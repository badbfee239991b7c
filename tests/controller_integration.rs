//! Controller driven by real sockets: a loopback SNTP server plays the
//! recorder's clock and a UDP sender plays the broadcasting appliances.

use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use twilight::state::EventFilter;
use twilight::testing::MockTimeServer;
use twilight::testing::packets::{device_payload, nvr_payload};
use twilight::{
    Controller, ControllerEvent, ControllerState, ControllerStatus, DeviceKind, PresenceListener,
    TwilightConfig,
};

const WAIT: Duration = Duration::from_secs(5);

struct Agent {
    controller: Controller,
    server: MockTimeServer,
    target: std::net::SocketAddr,
    sender: UdpSocket,
    shutdown: watch::Sender<bool>,
    receiver: JoinHandle<()>,
}

impl Agent {
    async fn start(history: usize, max_sync_age: Duration, offset: f64) -> Self {
        let mut server = MockTimeServer::with_offset(offset);
        let server_addr = server.start().await.unwrap();

        let config = TwilightConfig::builder()
            .server_port(server_addr.port())
            .server_timeout(Duration::from_millis(200))
            .offset_history(history)
            .max_sync_age(max_sync_age)
            .receive_timeout(Duration::from_millis(50))
            .sleep_resolution(Duration::from_millis(20))
            .build();
        config.validate().unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener = PresenceListener::from_socket(socket, config.discovery.receive_timeout);
        let target = listener.local_addr().unwrap();

        let controller = Controller::system(config);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let receiver = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run_receiver(listener, shutdown_rx).await })
        };

        Self {
            controller,
            server,
            target,
            sender: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            shutdown,
            receiver,
        }
    }

    async fn announce_recorder(&self) {
        let payload = nvr_payload(&[("Name", "Recorder")]);
        self.sender.send_to(&payload, self.target).await.unwrap();
    }

    async fn announce_camera(&self, hostname: &str) {
        let payload = device_payload(hostname, Ipv4Addr::LOCALHOST, "3c:ef:8c:01:02:03", &[]);
        self.sender.send_to(&payload, self.target).await.unwrap();
    }

    async fn wait_for(&self, f: impl FnMut(&ControllerStatus) -> bool) {
        let mut status = self.controller.subscribe_status();
        tokio::time::timeout(WAIT, status.wait_for(f))
            .await
            .expect("status not reached in time")
            .unwrap();
    }

    async fn stop(mut self) {
        self.shutdown.send_replace(true);
        tokio::time::timeout(WAIT, self.receiver)
            .await
            .unwrap()
            .unwrap();
        self.server.stop().await;
    }
}

#[tokio::test]
async fn test_recorder_then_camera() {
    let agent = Agent::start(8, Duration::from_secs(64), 42.0).await;

    agent.announce_camera("early").await;
    agent.announce_recorder().await;
    agent.wait_for(|s| s.state == ControllerState::Running).await;

    // announced before the clock was bound
    assert_eq!(agent.controller.registry_len().await, 0);

    agent.announce_camera("porch").await;
    agent.wait_for(|s| s.registered == 1).await;

    let cameras = agent.controller.snapshot_by_kind(DeviceKind::Device).await;
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].hostname(), "porch");
    assert_eq!(cameras[0].mac(), Some("3c:ef:8c:01:02:03"));

    let now = agent.controller.now().await.unwrap();
    let skew = now
        .duration_since(SystemTime::now())
        .unwrap_or_default()
        .as_secs_f64();
    assert!((skew - 42.0).abs() < 1.0, "skew {skew}");

    agent.stop().await;
}

#[tokio::test]
async fn test_silent_recorder_never_binds() {
    let agent = Agent::start(8, Duration::from_secs(64), 0.0).await;
    agent.server.set_silent(true).await;

    agent.announce_recorder().await;
    tokio::time::timeout(WAIT, async {
        while agent.server.received().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // let the exchange time out
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(agent.controller.state().await, ControllerState::Uninitialized);
    assert!(!agent.controller.is_clock_valid().await);

    agent.stop().await;
}

#[tokio::test]
async fn test_clock_loss_resets_registry() {
    // every step resyncs; a single failure invalidates the clock
    let agent = Agent::start(1, Duration::ZERO, 0.0).await;
    let mut registry = EventFilter::registry_events(agent.controller.events());

    agent.announce_recorder().await;
    agent.wait_for(|s| s.state == ControllerState::Running).await;
    agent.announce_camera("porch").await;
    agent.wait_for(|s| s.registered == 1).await;

    agent.server.set_silent(true).await;
    agent.wait_for(|s| s.resets == 1).await;

    let status = agent.controller.status().await;
    assert_eq!(status.registered, 0);
    assert_eq!(agent.controller.registry_len().await, 0);
    assert!(agent.controller.snapshot_by_kind(DeviceKind::Device).await.is_empty());

    let reset = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(ControllerEvent::RegistryReset { cleared }) = registry.recv().await {
                return cleared;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(reset, 1);

    // the recorder comes back
    agent.server.set_silent(false).await;
    agent.announce_recorder().await;
    agent.wait_for(|s| s.state == ControllerState::Running).await;

    agent.stop().await;
}
