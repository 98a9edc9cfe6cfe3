use anyhow::{anyhow, bail, Context, Result};
use gif::{Encoder, Frame, Repeat};
use tracing::debug;

use crate::quantize::IndexedFrame;

/// Destination for indexed frames. Frames are submitted in display order, each
/// covering the full canvas; `finish` seals the stream and hands back its bytes.
pub trait FrameSink {
    fn sink_label(&self) -> &'static str;
    fn write_frame(&mut self, frame: &IndexedFrame, palette: &[u8]) -> Result<()>;
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Animated GIF writer over an in-memory buffer.
///
/// The palette given at construction becomes the global colour table. A per-frame
/// palette identical to it is not re-emitted; a different one becomes a local table.
pub struct GifSink {
    encoder: Option<Encoder<Vec<u8>>>,
    width: u16,
    height: u16,
    global_palette: Vec<u8>,
    frames_written: usize,
}

impl GifSink {
    /// Encodes into `buffer`, which may be pre-reserved to avoid regrowth.
    pub fn with_buffer(
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        palette: &[u8],
        repeat: Repeat,
    ) -> Result<Self> {
        let width = u16::try_from(width).context("gif canvas width exceeds 65535")?;
        let height = u16::try_from(height).context("gif canvas height exceeds 65535")?;
        if palette.is_empty() || palette.len() % 3 != 0 || palette.len() > 768 {
            bail!(
                "gif palette must hold 1..=256 rgb triplets, got {} bytes",
                palette.len()
            );
        }

        let mut encoder = Encoder::new(buffer, width, height, palette)
            .context("failed to write gif header")?;
        encoder
            .set_repeat(repeat)
            .context("failed to write gif loop extension")?;

        Ok(Self {
            encoder: Some(encoder),
            width,
            height,
            global_palette: palette.to_vec(),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl FrameSink for GifSink {
    fn sink_label(&self) -> &'static str {
        "gif"
    }

    fn write_frame(&mut self, frame: &IndexedFrame, palette: &[u8]) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| anyhow!("encoder has already been finalized"))?;

        let expected = usize::from(self.width) * usize::from(self.height);
        if frame.width != u32::from(self.width)
            || frame.height != u32::from(self.height)
            || frame.pixels.len() != expected
        {
            bail!(
                "gif frame size mismatch: expected {}x{} ({} pixels), got {}x{} ({} pixels)",
                self.width,
                self.height,
                expected,
                frame.width,
                frame.height,
                frame.pixels.len()
            );
        }

        let mut gif_frame =
            Frame::from_indexed_pixels(self.width, self.height, &frame.pixels[..], None);
        gif_frame.delay = frame.delay_cs;
        if palette != self.global_palette.as_slice() {
            gif_frame.palette = Some(palette.to_vec());
        }

        encoder
            .write_frame(&gif_frame)
            .with_context(|| format!("failed to encode gif frame {}", self.frames_written))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| anyhow!("encoder has already been finalized"))?;
        let bytes = encoder
            .into_inner()
            .context("failed to write gif trailer")?;
        debug!(
            frames = self.frames_written,
            bytes = bytes.len(),
            "finalized gif stream"
        );
        Ok(bytes)
    }
}
