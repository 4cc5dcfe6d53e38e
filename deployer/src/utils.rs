//! Utility functions

use std::time::Duration;

use serde::{Deserialize, Serialize};

const SHORT_LENGTH: usize = 4;
const TOKEN_LENGTH: usize = 16;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Version information for the deployer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random base-36 token of 16 characters, suitable as the
/// secret path segment of the deployment endpoint.
pub fn create_token() -> String {
    let entropy = uuid::Uuid::new_v4();
    entropy
        .as_bytes()
        .chunks(SHORT_LENGTH)
        .take(TOKEN_LENGTH / SHORT_LENGTH)
        .map(short_id)
        .collect()
}

/// Four base-36 characters from four bytes, zero padded.
fn short_id(bytes: &[u8]) -> String {
    let mut value = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    let mut digits = Vec::with_capacity(SHORT_LENGTH);
    for _ in 0..SHORT_LENGTH {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Seconds with two decimals, as shown in deployment messages.
pub fn round_elapsed(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}
