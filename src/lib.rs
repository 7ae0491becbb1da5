//! crashwatch - vehicle collision detection core
//!
//! This crate implements the detection/streaming engine behind an accident
//! reporting service. One streaming session pulls frames from a video origin
//! (stored file or live camera), runs object detection, keeps only vehicle
//! detections, tests every vehicle pair for bounding-box overlap, draws the
//! result onto the frame, and publishes the JPEG-encoded frames as a
//! `multipart/x-mixed-replace` stream.
//!
//! # Module Structure
//!
//! - `frame`: pixel buffers and the `FrameSource` pull contract
//! - `ingest`: frame sources (local files, capture devices) + device claims
//! - `detect`: detector backends and the backend registry
//! - `analyze`: vehicle filtering and pairwise collision analysis
//! - `annotate` / `encode`: frame annotation and JPEG encoding
//! - `stream` / `session`: multipart wire framing and the per-session loop
//! - `storage`: uploaded video store and the collision event sink boundary
//! - `api`: HTTP surface (streaming, single-image detection, upload)

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod analyze;
pub mod annotate;
pub mod api;
pub mod config;
pub mod detect;
pub mod encode;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod storage;
pub mod stream;

pub use analyze::{filter_vehicles, find_collisions};
pub use config::CrashwatchConfig;
pub use detect::{BackendRegistry, Detection, DetectorBackend, StubBackend, VEHICLE_CLASSES};
pub use frame::{Frame, FrameSource};
pub use ingest::{DeviceSource, FileSource};
pub use session::{CloseReason, SessionState, StreamSession};
pub use storage::{CollisionSink, LogSink, VideoStore};

/// Errors surfaced when opening a stream origin.
///
/// These are the only fatal-at-open conditions; everything that can go wrong
/// after a session starts streaming is absorbed per-frame (see `session`).
#[derive(Debug, Error)]
pub enum OpenError {
    /// File missing or device cannot be opened. Raised eagerly at open time,
    /// never lazily on first capture.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The device index is exclusively held by another live session.
    #[error("device {0} is already in use by another stream")]
    DeviceBusy(u32),
}

/// Axis-aligned bounding box in pixel coordinates, `x1 < x2`, `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from two corners, ordering the coordinates and clamping to
    /// the frame rectangle. Returns `None` when the clamped box is degenerate
    /// (zero width or height).
    pub fn clamped(x1: i32, y1: i32, x2: i32, y2: i32, width: u32, height: u32) -> Option<Self> {
        let (lo_x, hi_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (lo_y, hi_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };

        let x1 = lo_x.clamp(0, width as i32);
        let x2 = hi_x.clamp(0, width as i32);
        let y1 = lo_y.clamp(0, height as i32);
        let y2 = hi_y.clamp(0, height as i32);

        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    /// Open-interval intersection test. Boxes that merely touch at an edge or
    /// corner do not overlap; the inequalities are strict on purpose.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.x1 < other.x2 && self.x2 > other.x1 && self.y1 < other.y2 && self.y2 > other.y1
    }
}

/// A single-frame record that two vehicle boxes overlapped.
///
/// Carries no cross-frame identity or trajectory data; every frame is
/// analyzed independently. Events are handed to a `CollisionSink` and not
/// retained by the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub frame_seq: u64,
    pub first: detect::Detection,
    pub second: detect::Detection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_orders_corners_and_limits_to_frame() {
        let b = BoundingBox::clamped(50, 60, 10, 10, 640, 480).unwrap();
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (10, 10, 50, 60));

        let b = BoundingBox::clamped(-20, -5, 700, 500, 640, 480).unwrap();
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (0, 0, 640, 480));
    }

    #[test]
    fn clamped_rejects_degenerate_boxes() {
        assert!(BoundingBox::clamped(10, 10, 10, 40, 640, 480).is_none());
        assert!(BoundingBox::clamped(-30, 0, -10, 40, 640, 480).is_none());
    }

    #[test]
    fn overlap_is_strict_on_both_axes() {
        let a = BoundingBox { x1: 0, y1: 0, x2: 10, y2: 10 };

        // Shared edge: not an overlap.
        let edge = BoundingBox { x1: 10, y1: 0, x2: 20, y2: 10 };
        assert!(!a.overlaps(&edge));
        assert!(!edge.overlaps(&a));

        // Shared corner: not an overlap.
        let corner = BoundingBox { x1: 10, y1: 10, x2: 20, y2: 20 };
        assert!(!a.overlaps(&corner));

        // Genuine intersection.
        let hit = BoundingBox { x1: 5, y1: 5, x2: 15, y2: 15 };
        assert!(a.overlaps(&hit));
        assert!(hit.overlaps(&a));

        // Fully disjoint.
        let far = BoundingBox { x1: 11, y1: 11, x2: 20, y2: 20 };
        assert!(!a.overlaps(&far));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let outer = BoundingBox { x1: 0, y1: 0, x2: 100, y2: 100 };
        let inner = BoundingBox { x1: 40, y1: 40, x2: 60, y2: 60 };
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }
}
