//! V4L2 capture backend for `DeviceSource`.
//!
//! Maps a device index to `/dev/video{index}`, negotiates RGB3 at the
//! configured geometry, and captures through a memory-mapped buffer stream.
//! The mmap stream borrows the device, hence the self-referencing state.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::device::DeviceConfig;
use crate::frame::Frame;

pub(crate) struct V4l2DeviceSource {
    config: DeviceConfig,
    state: V4l2State,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2DeviceSource {
    pub(crate) fn open(config: DeviceConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = format!("/dev/video{}", config.index);
        let mut device =
            v4l::Device::with_path(&path).with_context(|| format!("open v4l2 device {}", path))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("DeviceSource: failed to set format on {}: {}", path, err);
                device.format().context("read v4l2 format after set failure")?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("DeviceSource: failed to set fps on {}: {}", path, err);
            }
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "DeviceSource: opened {} ({}x{})",
            path,
            active_width,
            active_height
        );
        Ok(Self {
            config,
            state,
            active_width,
            active_height,
            frame_count: 0,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let buf = self
            .state
            .with_stream_mut(|stream| stream.next().map(|(buf, _meta)| buf.to_vec()))
            .with_context(|| format!("capture frame from device {}", self.config.index))?;

        self.frame_count += 1;
        Ok(Some(Frame::new(
            buf,
            self.active_width,
            self.active_height,
            self.frame_count,
        )))
    }
}
