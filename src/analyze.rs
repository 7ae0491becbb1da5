//! Vehicle filtering and per-frame collision analysis.
//!
//! Analysis is stateless and frame-local: there is no tracking, identity, or
//! trajectory carried between frames. Each frame's filtered vehicle set is
//! tested pairwise for bounding-box overlap; every overlapping pair yields
//! one event. A vehicle overlapping several others yields several events.
//!
//! The pair loop is quadratic in the per-frame vehicle count. Counts are
//! single digits to low tens in practice; no spatial index is warranted.

use crate::detect::Detection;
use crate::CollisionEvent;

/// Keep only detections whose label is in the fixed vehicle-class set,
/// preserving detection order. No confidence gate is applied here: scores
/// are carried for display and reporting but never exclude a box from
/// analysis.
pub fn filter_vehicles(detections: Vec<Detection>) -> Vec<Detection> {
    detections.into_iter().filter(|d| d.is_vehicle()).collect()
}

/// Test all unordered vehicle pairs for overlap and emit one event per
/// overlapping pair, in ascending `(i, j)` index order so that emission is
/// deterministic for a given input list.
pub fn find_collisions(frame_seq: u64, vehicles: &[Detection]) -> Vec<CollisionEvent> {
    let mut events = Vec::new();
    for i in 0..vehicles.len() {
        for j in (i + 1)..vehicles.len() {
            if vehicles[i].bbox.overlaps(&vehicles[j].bbox) {
                events.push(CollisionEvent {
                    frame_seq,
                    first: vehicles[i].clone(),
                    second: vehicles[j].clone(),
                });
            }
        }
    }
    events
}
