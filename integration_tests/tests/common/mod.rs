//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("twilight=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Configuration JSON with short timeouts, pointing the clock at `server_port`
pub fn config_json(server_port: u16, mac: &str) -> String {
    format!(
        r#"{{
            "discovery": {{ "port": 0, "receive_timeout": 0.05, "max_age": 2 }},
            "clock": {{
                "server_port": {server_port},
                "server_timeout": 0.2,
                "offset_history": 4,
                "max_sync_age": 0.5,
                "sleep_resolution": 0.02
            }},
            "schedule": {{ "start_time": "00:00", "repeat": 0.25 }},
            "devices": [ {{ "mac": "{mac}" }} ]
        }}"#
    )
}

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(10);
