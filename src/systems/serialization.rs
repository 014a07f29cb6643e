//! JSON encoding of snapshots and configs for hosts that do not read the flat buffer.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::world::Snapshot;

/// Encode a snapshot as JSON bytes, ready to hand across a host boundary.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<Vec<u8>, SimError> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// Decode a snapshot recorded by a host (replays, statistics windows).
pub fn snapshot_from_json(data: &[u8]) -> Result<Snapshot, SimError> {
    Ok(serde_json::from_slice(data)?)
}

/// Pretty JSON of a config, the format `SimConfig::from_json` reads back.
pub fn config_to_json(config: &SimConfig) -> Result<String, SimError> {
    Ok(serde_json::to_string_pretty(config)?)
}
