//! FFmpeg-backed local file decoder.
//!
//! Demuxes the best video track, decodes, and scales every frame to packed
//! RGB24. End of file drains the decoder and then reports end-of-stream
//! instead of an error; a session treats that as a normal close.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    drained: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("open '{}' with ffmpeg", config.path))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", config.path))?;
        let stream_index = stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context.decoder().video().context("open video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create RGB24 scaler")?;

        log::info!("FileSource: opened {} (ffmpeg)", config.path);
        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            drained: false,
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.config.path
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.drained {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if let Some(frame) = self.receive(&mut decoded)? {
                return Ok(Some(frame));
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to video decoder")?;
                sent = true;
                break;
            }

            if !sent {
                // Demuxer exhausted: flush the decoder, emit what remains.
                self.decoder.send_eof().context("flush video decoder")?;
                if let Some(frame) = self.receive(&mut decoded)? {
                    return Ok(Some(frame));
                }
                self.drained = true;
                return Ok(None);
            }
        }
    }

    fn receive(&mut self, decoded: &mut ffmpeg::frame::Video) -> Result<Option<Frame>> {
        if self.decoder.receive_frame(decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb)
            .context("scale frame to RGB24")?;
        let (pixels, width, height) = packed_rgb(&rgb)?;
        self.frame_count += 1;
        Ok(Some(Frame::new(pixels, width, height, self.frame_count)))
    }
}

/// Copy an ffmpeg RGB24 frame into a tightly packed buffer, dropping any
/// row padding the scaler may have introduced.
fn packed_rgb(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).context("frame row out of bounds")?);
    }
    Ok((pixels, width, height))
}
