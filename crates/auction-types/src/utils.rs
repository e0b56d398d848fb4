//! Small helpers shared across crates.

use alloy::primitives::B256;

/// Current wall-clock time in seconds since epoch.
pub fn current_timestamp() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}

/// Shortens a transaction hash for log output.
pub fn truncate_hash(hash: &B256) -> String {
	let hash_str = hex::encode(hash.0);
	format!("0x{}..", &hash_str[..8])
}

/// Shortens an opaque identifier for log output.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(12) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}
