use std::time::Duration;

pub const LOG_LEVEL: &str = "info";

pub const PORT: u16 = 502;
pub const UNIT_ID: u8 = 1;
pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const MESSAGE_WAIT_MS: u64 = 80;

pub const SCAN_INTERVAL_HIGH: u64 = 10;
pub const SCAN_INTERVAL_MEDIUM: u64 = 30;
pub const SCAN_INTERVAL_LOW: u64 = 60;
pub const SCAN_INTERVAL_VERY_LOW: u64 = 180;

// Consecutive transport failures before active polling is suspended
pub const FAILURE_THRESHOLD: u32 = 3;
// Consecutive failed reads of one key before its cached value turns unavailable
pub const STALE_AFTER: u32 = 3;
