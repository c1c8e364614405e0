//! Track file loading.
//!
//! ```toml
//! [[cones]]
//! x = 120.0
//! y = 40.0
//! color = "blue"
//! ```
//!
//! Coordinates are in the track's source units (pixels). A track that cannot
//! be read still lets the node start, with an empty map.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};
use tracksense_perception::{LandmarkMap, LandmarkRecord};

#[derive(Debug, Deserialize)]
struct TrackFile {
    #[serde(default)]
    cones: Vec<LandmarkRecord>,
}

pub(crate) fn parse(raw: &str) -> Result<Vec<LandmarkRecord>, String> {
    let file: TrackFile = toml::from_str(raw).map_err(|e| format!("Failed to parse track: {}", e))?;
    Ok(file.cones)
}

pub(crate) fn read(path: &Path) -> Result<Vec<LandmarkRecord>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read track at {}: {}", path.display(), e))?;
    parse(&raw)
}

/// Build the landmark map from `path`, or an empty map if that fails.
pub fn load(path: &Path) -> LandmarkMap {
    let records = match read(path) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "no usable track; running with an empty map");
            return LandmarkMap::empty();
        }
    };
    let total = records.len();
    let (map, rejected) = LandmarkMap::from_records(records);
    info!(path = %path.display(), cones = map.len(), rejected, total, "track loaded");
    map
}
