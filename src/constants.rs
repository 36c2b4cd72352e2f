//! Application-wide constants and configuration values

use std::time::Duration;

// Client population constants
pub const MAX_CLIENTS_LIMIT: u32 = 100_000;

// Identity and credentials shared by every simulated device
pub const SECURE_ENDPOINT_PREFIX: &str = "sec-device-";
pub const PLAIN_ENDPOINT_PREFIX: &str = "device-";
pub const DEFAULT_PSK_PREFIX: &str = "sec";
pub const PSK_KEY: &[u8] = b"key";

// Default server addresses per security mode
pub const DEFAULT_SECURE_SERVER_URI: &str = "coaps://localhost:5684";
pub const DEFAULT_PLAIN_SERVER_URI: &str = "coap://localhost:5683";

// Object model identifiers
pub const SERVER_SHORT_ID: u16 = 12345;
pub const SECURITY_OBJECT_ID: u16 = 0;
pub const SERVER_OBJECT_ID: u16 = 1;
pub const ACCESS_CONTROL_OBJECT_ID: u16 = 2;
pub const DEVICE_OBJECT_ID: u16 = 3;
pub const DEVICE_REBOOT_RESOURCE_ID: u16 = 4;

// Simulated server
pub const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

// Performance constants
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);
