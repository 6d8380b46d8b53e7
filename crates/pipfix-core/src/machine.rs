//! Stable per-machine identifier.
//!
//! The advisory service receives a machine identifier as an opaque
//! correlation key. It is never used for authentication. The raw OS
//! machine id is hashed before leaving the process so the wire value
//! cannot be mapped back to the host.

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

/// Files holding a hardware-derived machine id, tried in order.
const MACHINE_ID_SOURCES: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

static MACHINE_ID: OnceLock<String> = OnceLock::new();

/// Return the stable machine identifier, computing it on first use.
///
/// Reads the OS machine id and returns its SHA-256 digest, hex-encoded.
/// When no source file is readable, falls back to a random UUID v4 that
/// stays stable for the lifetime of the process.
pub fn machine_id() -> &'static str {
    MACHINE_ID.get_or_init(compute_machine_id)
}

fn compute_machine_id() -> String {
    for path in MACHINE_ID_SOURCES {
        if let Ok(raw) = std::fs::read_to_string(path) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let digest = Sha256::digest(trimmed.as_bytes());
                return hex::encode(digest);
            }
        }
    }

    tracing::debug!("no machine-id source readable, using random fallback");
    uuid::Uuid::new_v4().to_string()
}
