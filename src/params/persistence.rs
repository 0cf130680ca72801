// Persistence - Encode / decode the tracks tree for external storage
//
// Decoding checks the shape of every track before anything is applied: a
// tree missing a scale name or timing bases anywhere is rejected as a whole.

use super::track::TrackParams;
use super::types::TrackId;
use crate::error::PersistError;
use serde_json::Value;
use std::collections::BTreeMap;

pub type TracksTree = BTreeMap<TrackId, TrackParams>;

/// Serialize every track to compact JSON
pub fn encode_tracks(tracks: &TracksTree) -> Result<String, PersistError> {
    Ok(serde_json::to_string(tracks)?)
}

/// Parse and validate an encoded tracks tree
pub fn decode_tracks(encoded: &str) -> Result<TracksTree, PersistError> {
    let raw: Value = serde_json::from_str(encoded)?;
    validate_shape(&raw)?;
    let tracks: TracksTree = serde_json::from_value(raw)?;

    for (id, track) in &tracks {
        if !track.signal_chain.has_unique_ids() {
            return Err(PersistError::Malformed(format!(
                "track {} has duplicate module ids",
                id
            )));
        }
    }

    Ok(tracks)
}

/// Check that every track carries a scale name and both timing bases
pub fn validate_shape(raw: &Value) -> Result<(), PersistError> {
    let tracks = raw
        .as_object()
        .ok_or_else(|| PersistError::Malformed("expected an object of tracks".to_string()))?;

    for (key, track) in tracks {
        let composition = track.get("composition");

        let scale_name = composition
            .and_then(|c| c.get("notes"))
            .and_then(|n| n.get("scaleName"))
            .and_then(Value::as_str);
        match scale_name {
            Some(name) if !name.trim().is_empty() => {}
            _ => return Err(PersistError::MissingScale(key.clone())),
        }

        let has_timing = ["noteLength", "interval"].iter().all(|field| {
            composition
                .and_then(|c| c.get(*field))
                .and_then(Value::as_f64)
                .is_some_and(f64::is_finite)
        });
        if !has_timing {
            return Err(PersistError::MissingTiming(key.clone()));
        }
    }

    Ok(())
}
