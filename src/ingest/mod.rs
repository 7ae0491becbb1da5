//! Frame ingestion sources.
//!
//! This module provides the video origins a streaming session can own:
//! - Local video files (synthetic `stub://` backend; real decode behind
//!   feature: ingest-file-ffmpeg)
//! - Capture devices by index (synthetic backend; real capture behind
//!   feature: ingest-v4l2)
//!
//! Every source is owned by exactly one session. Device indices are
//! additionally guarded by a process-wide claim registry so that a second
//! session against the same camera fails at open time instead of silently
//! sharing frames.

pub mod device;
#[cfg(feature = "ingest-v4l2")]
pub(crate) mod device_v4l2;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use device::{DeviceConfig, DeviceSource};
pub use file::{FileConfig, FileSource};

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use crate::OpenError;

static CLAIMS: OnceLock<Mutex<HashSet<u32>>> = OnceLock::new();

fn claims() -> &'static Mutex<HashSet<u32>> {
    CLAIMS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive ownership of one capture device index.
///
/// Acquired at open time and released on drop, which covers every session
/// exit path: end-of-stream, fatal error, client cancellation, and unwind.
#[derive(Debug)]
pub struct DeviceClaim {
    index: u32,
}

impl DeviceClaim {
    pub fn acquire(index: u32) -> Result<Self, OpenError> {
        let mut held = claims().lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(index) {
            return Err(OpenError::DeviceBusy(index));
        }
        Ok(Self { index })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut held = claims().lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_on_same_index_is_busy() {
        let first = DeviceClaim::acquire(910).unwrap();
        assert_eq!(first.index(), 910);

        match DeviceClaim::acquire(910) {
            Err(OpenError::DeviceBusy(910)) => {}
            other => panic!("expected DeviceBusy, got {:?}", other.map(|c| c.index())),
        }
    }

    #[test]
    fn dropping_a_claim_frees_the_index() {
        let claim = DeviceClaim::acquire(911).unwrap();
        drop(claim);
        let again = DeviceClaim::acquire(911).unwrap();
        assert_eq!(again.index(), 911);
    }

    #[test]
    fn distinct_indices_do_not_contend() {
        let _a = DeviceClaim::acquire(912).unwrap();
        let _b = DeviceClaim::acquire(913).unwrap();
    }
}
