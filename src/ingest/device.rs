//! Capture device source.
//!
//! `DeviceSource` owns one camera index exclusively for the lifetime of a
//! session: opening claims the index from the process-wide registry
//! (`DeviceBusy` when another session holds it) and dropping the source
//! releases it. The sequence is conceptually infinite; only a fatal capture
//! error or the consumer ends it.
//!
//! The default build uses a paced synthetic backend; real V4L2 capture is
//! behind feature: ingest-v4l2.

use std::time::{Duration, Instant};

use anyhow::Result;

use super::file::synthetic_pixels;
use super::DeviceClaim;
#[cfg(feature = "ingest-v4l2")]
use super::device_v4l2::V4l2DeviceSource;
use crate::frame::{Frame, FrameSource};
use crate::OpenError;

/// Configuration for a capture device source.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Device index; 0 is the default camera.
    pub index: u32,
    /// Target capture rate in frames per second.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            index: 0,
            target_fps: 15,
            width: 640,
            height: 480,
        }
    }
}

/// Exclusive capture device frame source.
pub struct DeviceSource {
    claim: DeviceClaim,
    backend: DeviceBackend,
}

enum DeviceBackend {
    Synthetic(SyntheticDeviceSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2DeviceSource),
}

impl DeviceSource {
    /// Claim the device index and open the capture backend.
    pub fn open(config: DeviceConfig) -> Result<Self, OpenError> {
        let claim = DeviceClaim::acquire(config.index)?;

        #[cfg(feature = "ingest-v4l2")]
        let backend = DeviceBackend::V4l2(
            V4l2DeviceSource::open(config)
                .map_err(|e| OpenError::SourceUnavailable(e.to_string()))?,
        );
        #[cfg(not(feature = "ingest-v4l2"))]
        let backend = DeviceBackend::Synthetic(SyntheticDeviceSource::new(config));

        Ok(Self { claim, backend })
    }

    pub fn index(&self) -> u32 {
        self.claim.index()
    }
}

impl FrameSource for DeviceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            DeviceBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            DeviceBackend::V4l2(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        format!("device:{}", self.claim.index())
    }
}

// ----------------------------------------------------------------------------
// Synthetic device for tests and camera-free builds
// ----------------------------------------------------------------------------

struct SyntheticDeviceSource {
    config: DeviceConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticDeviceSource {
    #[cfg_attr(feature = "ingest-v4l2", allow(dead_code))]
    fn new(config: DeviceConfig) -> Self {
        log::info!("DeviceSource: opened device {} (synthetic)", config.index);
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.pace();
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Some(Frame::new(
            synthetic_pixels(self.config.width, self.config.height, self.frame_count),
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    /// Hold the configured capture rate; a real camera blocks the same way.
    fn pace(&self) {
        let Some(last) = self.last_frame_at else {
            return;
        };
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_millis(1000 / self.config.target_fps as u64);
        let elapsed = last.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(index: u32) -> DeviceConfig {
        DeviceConfig {
            index,
            // Unpaced so tests do not sleep.
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn device_produces_ordered_frames() {
        let mut source = DeviceSource::open(config(920)).unwrap();
        let first = source.next_frame().unwrap().expect("frame");
        let second = source.next_frame().unwrap().expect("frame");
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(first.width, 64);
        assert_eq!(first.data.len(), 64 * 48 * 3);
    }

    #[test]
    fn concurrent_open_of_same_device_is_busy() {
        let held = DeviceSource::open(config(921)).unwrap();
        match DeviceSource::open(config(921)) {
            Err(OpenError::DeviceBusy(921)) => {}
            other => panic!("expected DeviceBusy, got {:?}", other.map(|s| s.index())),
        }
        drop(held);
        // Released on drop; the index can be claimed again.
        DeviceSource::open(config(921)).unwrap();
    }
}
