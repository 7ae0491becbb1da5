//! Pixel buffers and the frame source contract.
//!
//! A `Frame` is captured once, then handed stage-to-stage through the
//! pipeline; no stage keeps a frame after passing it on. The annotator is the
//! only stage that draws, and it draws on a copy.

use anyhow::Result;

/// One captured video frame in packed RGB24.
///
/// `seq` is assigned by the source, starts at 1, and increases by one per
/// captured frame within a session. It tags collision events and is never
/// reused across sources.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub seq: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            data,
            width,
            height,
            seq,
        }
    }
}

/// Pull-based frame producer.
///
/// `Ok(Some(frame))` is the next frame in strict capture order, `Ok(None)` is
/// end-of-stream (files only; devices are conceptually infinite), and `Err`
/// is a fatal source failure. Sources never drop or reorder frames; any drop
/// policy belongs to the consumer. A finished source is not restartable.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable origin for logs ("video.mp4", "device:0").
    fn describe(&self) -> String;
}
