use anyhow::Result;

use crate::detect::Detection;

/// Detector backend trait.
///
/// One synchronous call per frame; the pipeline does not batch frames and
/// depends on no backend state between calls. Detector latency is part of the
/// per-frame budget. A backend failure on one frame is absorbed by the caller
/// as "zero detections" - backends should return `Err` rather than panic.
///
/// Implementations must treat the pixel slice (packed RGB24) as read-only and
/// must not retain it beyond the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, returning every detected object with its
    /// pixel-space bounding box, upper-cased class label, and confidence.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook (model load, first-inference compilation).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
