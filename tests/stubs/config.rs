#![allow(dead_code)]

pub const MINIMAL: &str = r#"{"host": "192.168.1.50"}"#;

pub const FULL: &str = r#"
{
    "host": "192.168.1.50",
    "port": 1502,
    "unit_id": 2,
    "hardware_version": "v1",
    "scan_intervals": {
        "high": 5,
        "medium": 15,
        "low": 60,
        "very_low": 300
    },
    "timeout_secs": 3,
    "message_wait_ms": 50,
    "failure_threshold": 5,
    "stale_after": 2,
    "reconcile_grace_polls": 1,
    "entities": {
        "set_charge_power": true,
        "stored_energy": false
    }
}
"#;

pub const UNKNOWN_ENTITY: &str = r#"
{
    "host": "192.168.1.50",
    "entities": {
        "flux_capacitor": true
    }
}
"#;

pub const ZERO_INTERVAL: &str = r#"
{
    "host": "192.168.1.50",
    "scan_intervals": {"high": 0}
}
"#;

pub const BAD_PAYLOAD: &str = r#"{"port": "not a port"}"#;

/// Nothing listens on port 1 of the loopback interface
pub const UNREACHABLE: &str = r#"
{
    "host": "127.0.0.1",
    "port": 1,
    "timeout_secs": 1,
    "message_wait_ms": 0
}
"#;
