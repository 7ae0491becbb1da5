//! Streaming session: one origin, one cooperative pipeline loop.
//!
//! A `StreamSession` owns exactly one frame source (and through it any
//! exclusive device claim) plus a handle to a shared detector. `next_part`
//! is the single pull point: the transport asks for the next multipart chunk
//! only when it is ready to write, so at most one frame is ever in flight and
//! backpressure falls out of the blocking write.
//!
//! Failure policy inside the loop favors stream continuity:
//! - detector failure: that frame analyzed as "no detections", logged
//! - annotate/encode failure: that frame dropped from the output, logged
//! - sink failure: logged, never fatal
//! Only source exhaustion or a fatal source error ends the loop from inside;
//! the transport ends it from outside by reporting cancellation.

use std::sync::{Arc, Mutex};

use crate::analyze::{filter_vehicles, find_collisions};
use crate::annotate::annotate;
use crate::detect::DetectorBackend;
use crate::encode::encode_jpeg;
use crate::frame::FrameSource;
use crate::storage::CollisionSink;
use crate::stream::multipart_chunk;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Source exhausted (file origins).
    Normal,
    /// Fatal source failure mid-stream.
    Error,
    /// Client disconnected; not an error.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    Closed(CloseReason),
}

pub struct StreamSession {
    source: Box<dyn FrameSource>,
    detector: Arc<Mutex<dyn DetectorBackend>>,
    sink: Arc<dyn CollisionSink>,
    jpeg_quality: u8,
    state: SessionState,
    origin: String,
    frames_emitted: u64,
    events_recorded: u64,
}

impl StreamSession {
    /// Wrap an already opened source. Open failures happen in the source
    /// constructors, so a session that exists is always in `Streaming` state.
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Arc<Mutex<dyn DetectorBackend>>,
        sink: Arc<dyn CollisionSink>,
        jpeg_quality: u8,
    ) -> Self {
        let origin = source.describe();
        log::info!("stream session opened for {}", origin);
        Self {
            source,
            detector,
            sink,
            jpeg_quality,
            state: SessionState::Streaming,
            origin,
            frames_emitted: 0,
            events_recorded: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded
    }

    /// Produce the next multipart chunk, or `None` once the session closed.
    ///
    /// Emission order is capture order; the only frames missing from the
    /// output are those dropped by the per-frame encode policy.
    pub fn next_part(&mut self) -> Option<Vec<u8>> {
        while self.state == SessionState::Streaming {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.close(CloseReason::Normal);
                    return None;
                }
                Err(err) => {
                    log::error!("stream {}: source failed: {:#}", self.origin, err);
                    self.close(CloseReason::Error);
                    return None;
                }
            };

            let detections = self.detect(&frame.data, frame.width, frame.height);
            let vehicles = filter_vehicles(detections);
            let events = find_collisions(frame.seq, &vehicles);
            for event in &events {
                self.events_recorded += 1;
                if let Err(err) = self.sink.record(event) {
                    log::warn!("stream {}: collision sink failed: {:#}", self.origin, err);
                }
            }

            let image = match annotate(&frame, &vehicles, !events.is_empty()) {
                Ok(image) => image,
                Err(err) => {
                    log::warn!(
                        "stream {}: dropping frame {}: {:#}",
                        self.origin,
                        frame.seq,
                        err
                    );
                    continue;
                }
            };
            match encode_jpeg(&image, self.jpeg_quality) {
                Ok(jpeg) => {
                    self.frames_emitted += 1;
                    return Some(multipart_chunk(&jpeg));
                }
                Err(err) => {
                    log::warn!(
                        "stream {}: dropping frame {}: {:#}",
                        self.origin,
                        frame.seq,
                        err
                    );
                    continue;
                }
            }
        }
        None
    }

    /// Detector failures degrade to an empty detection list for the frame.
    fn detect(&self, pixels: &[u8], width: u32, height: u32) -> Vec<crate::Detection> {
        let mut backend = match self.detector.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("stream {}: detector lock poisoned", self.origin);
                return Vec::new();
            }
        };
        match backend.detect(pixels, width, height) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("stream {}: detector failed: {:#}", self.origin, err);
                Vec::new()
            }
        }
    }

    /// Mark the session closed. Dropping the session releases the source and
    /// any device claim; closing is idempotent and the first reason wins.
    pub fn close(&mut self, reason: CloseReason) {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Closed(reason);
            log::info!(
                "stream session for {} closed ({:?}): {} frames, {} events",
                self.origin,
                reason,
                self.frames_emitted,
                self.events_recorded
            );
        }
    }
}
