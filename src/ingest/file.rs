//! Local video file source.
//!
//! `FileSource` produces frames from a stored video in strict decode order
//! and signals end-of-stream when the file is exhausted. Opening a missing
//! file fails immediately with `OpenError::SourceUnavailable`; nothing is
//! deferred to the first capture.
//!
//! `stub://` origins select a deterministic synthetic backend that needs no
//! codec support; real files require the `ingest-file-ffmpeg` feature.

use std::path::Path;

use anyhow::Result;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{Frame, FrameSource};
use crate::OpenError;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const SYNTHETIC_DEFAULT_FRAMES: u64 = 30;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, or `stub://name?frames=N` for the synthetic backend.
    pub path: String,
    /// Target frame rate hint for decode pacing (0 = as fast as possible).
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 0,
        }
    }
}

/// Local file frame source.
#[derive(Debug)]
pub struct FileSource {
    backend: FileBackend,
}

#[derive(Debug)]
enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a file origin. Fails with `SourceUnavailable` when the path is
    /// not a readable local file or decoding support is not built in.
    pub fn open(config: FileConfig) -> Result<Self, OpenError> {
        if !is_local_file_path(&config.path) {
            return Err(OpenError::SourceUnavailable(format!(
                "'{}' is not a local file path",
                config.path
            )));
        }

        if config.path.starts_with("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(&config.path)),
            });
        }

        if !Path::new(&config.path).is_file() {
            return Err(OpenError::SourceUnavailable(format!(
                "file '{}' does not exist",
                config.path
            )));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            let source = FfmpegFileSource::open(config)
                .map_err(|e| OpenError::SourceUnavailable(e.to_string()))?;
            Ok(Self {
                backend: FileBackend::Ffmpeg(source),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(OpenError::SourceUnavailable(format!(
                "cannot decode '{}': built without the ingest-file-ffmpeg feature",
                config.path
            )))
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Synthetic(source) => source.path.clone(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.path().to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and codec-free builds
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct SyntheticFileSource {
    path: String,
    total_frames: u64,
    produced: u64,
}

impl SyntheticFileSource {
    fn new(path: &str) -> Self {
        let total_frames = parse_frames_param(path).unwrap_or(SYNTHETIC_DEFAULT_FRAMES);
        log::info!("FileSource: opened {} (synthetic, {} frames)", path, total_frames);
        Self {
            path: path.to_string(),
            total_frames,
            produced: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.produced >= self.total_frames {
            return Ok(None);
        }
        self.produced += 1;
        let seq = self.produced;
        Ok(Some(Frame::new(
            synthetic_pixels(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, seq),
            SYNTHETIC_WIDTH,
            SYNTHETIC_HEIGHT,
            seq,
        )))
    }
}

/// Deterministic RGB test pattern that changes per frame.
pub(crate) fn synthetic_pixels(width: u32, height: u32, seq: u64) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    for y in 0..height as u64 {
        for x in 0..width as u64 {
            let base = ((y * width as u64 + x) * 3) as usize;
            pixels[base] = ((x + seq * 3) % 256) as u8;
            pixels[base + 1] = ((y + seq * 5) % 256) as u8;
            pixels[base + 2] = ((x + y + seq * 7) % 256) as u8;
        }
    }
    pixels
}

fn parse_frames_param(path: &str) -> Option<u64> {
    let query = path.split_once('?')?.1;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == "frames" {
                return value.parse().ok();
            }
        }
    }
    None
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_is_finite_and_ordered() {
        let mut source = FileSource::open(FileConfig {
            path: "stub://dashcam?frames=3".to_string(),
            target_fps: 0,
        })
        .unwrap();

        for expected_seq in 1..=3 {
            let frame = source.next_frame().unwrap().expect("frame");
            assert_eq!(frame.seq, expected_seq);
            assert_eq!(frame.width, SYNTHETIC_WIDTH);
            assert_eq!(frame.height, SYNTHETIC_HEIGHT);
        }

        // Exhausted, and stays exhausted: the source is not restartable.
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_file_fails_at_open() {
        let err = FileSource::open(FileConfig {
            path: "/nonexistent/crash-footage.mp4".to_string(),
            target_fps: 0,
        })
        .unwrap_err();
        assert!(matches!(err, OpenError::SourceUnavailable(_)));
    }

    #[test]
    fn url_schemes_are_rejected() {
        let err = FileSource::open(FileConfig {
            path: "https://example.com/video.mp4".to_string(),
            target_fps: 0,
        })
        .unwrap_err();
        assert!(matches!(err, OpenError::SourceUnavailable(_)));
    }

    #[test]
    fn frames_param_defaults_when_absent() {
        let mut source = FileSource::open(FileConfig {
            path: "stub://dashcam".to_string(),
            target_fps: 0,
        })
        .unwrap();
        let mut count = 0;
        while source.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, SYNTHETIC_DEFAULT_FRAMES);
    }
}
