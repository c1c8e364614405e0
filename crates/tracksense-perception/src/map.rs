//! Static cone map.
//!
//! Built once at startup from raw track records and never mutated afterwards.
//! Clones share the same backing slice, so the map can be handed to the
//! ingest thread without copying or locking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use tracksense_types::{Landmark, LandmarkClass};

/// One cone as it appears in a track file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub x: f32,
    pub y: f32,
    pub color: String,
}

impl LandmarkRecord {
    pub fn new(x: f32, y: f32, color: impl Into<String>) -> Self {
        Self {
            x,
            y,
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LandmarkMap {
    landmarks: Arc<[Landmark]>,
}

impl LandmarkMap {
    /// Wrap an already classified list as-is.
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks: landmarks.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Classify raw records, keeping their order.
    ///
    /// Records with a colour outside the supported set are skipped with a
    /// warning. Returns the map and the number of skipped records.
    pub fn from_records<I>(records: I) -> (Self, usize)
    where
        I: IntoIterator<Item = LandmarkRecord>,
    {
        let mut rejected = 0;
        let mut landmarks = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            let class = LandmarkClass::from_color(&record.color);
            if !class.is_supported() {
                warn!(index, color = %record.color, "skipping cone with unsupported colour");
                rejected += 1;
                continue;
            }
            landmarks.push(Landmark::new(record.x, record.y, class));
        }
        (Self::new(landmarks), rejected)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Number of landmarks of `class`.
    pub fn count(&self, class: LandmarkClass) -> usize {
        self.landmarks.iter().filter(|l| l.class == class).count()
    }
}

impl Default for LandmarkMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a LandmarkMap {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
