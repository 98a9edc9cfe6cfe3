use anyhow::{anyhow, Context, Result};
use gif::Repeat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::compositor::{paint_frame, Conversation, Layout};
use crate::encoding::{FrameSink, GifSink};
use crate::error_codes::CodedError;
use crate::framebuffer::{Framebuffer, WrapCache};
use crate::palette::{palette_bytes, ColorIndex};
use crate::quantize::{quantize_into, IndexedFrame};
use crate::reply::{default_pair, fill_placeholder, sanitize_message, ReplyProvider};
use crate::sequence::{build_frame_states, FrameState};

/// Per-frame delay in hundredths of a second.
pub const FRAME_DELAY_CS: u16 = 8;

pub const MIN_WIDTH: u32 = 320;
pub const MAX_WIDTH: u32 = 800;
pub const MIN_HEIGHT: u32 = 200;
pub const MAX_HEIGHT: u32 = 600;
pub const MAX_SCALE: u32 = 4;

pub const USER_DISPLAY_LEN: usize = 80;
pub const USER_TYPED_LEN: usize = 40;
pub const REPLY_DISPLAY_LEN: usize = 140;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateOptions {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale: u32,
}

fn default_width() -> u32 {
    480
}

fn default_height() -> u32 {
    270
}

fn default_scale() -> u32 {
    1
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            msg: String::new(),
            reply: None,
            seed: 0,
            width: default_width(),
            height: default_height(),
            scale: default_scale(),
        }
    }
}

impl GenerateOptions {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            ..Self::default()
        }
    }

    /// Clamps dimensions and scale into the supported ranges.
    pub fn normalized(&self) -> Self {
        Self {
            msg: self.msg.clone(),
            reply: self.reply.clone(),
            seed: self.seed,
            width: self.width.clamp(MIN_WIDTH, MAX_WIDTH),
            height: self.height.clamp(MIN_HEIGHT, MAX_HEIGHT),
            scale: self.scale.clamp(1, MAX_SCALE),
        }
    }

    /// Output canvas in pixels: logical size times scale.
    pub fn canvas_size(&self) -> (u32, u32) {
        let options = self.normalized();
        (options.width * options.scale, options.height * options.scale)
    }
}

/// Everything needed to paint a conversation, resolved once per request.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub conversation: Conversation,
    pub typed_user: String,
    pub frames: Vec<FrameState>,
    pub layout: Layout,
    pub width: u32,
    pub height: u32,
}

impl RenderPlan {
    pub fn new(options: &GenerateOptions, provider: &dyn ReplyProvider) -> Self {
        let options = options.normalized();

        let (user, explicit_reply) = if options.msg.trim().is_empty() {
            let pair = default_pair(options.seed);
            (pair.user.to_owned(), Some(pair.reply_text()))
        } else {
            (options.msg.clone(), options.reply.clone())
        };

        let user_display = sanitize_message(&user, USER_DISPLAY_LEN);
        let typed_user = sanitize_message(&user, USER_TYPED_LEN);
        let reply_base = explicit_reply
            .filter(|reply| !reply.trim().is_empty())
            .unwrap_or_else(|| provider.reply(&user_display, options.seed));
        let reply_display = sanitize_message(
            &fill_placeholder(&reply_base, &user_display),
            REPLY_DISPLAY_LEN,
        );

        let frames = build_frame_states(&typed_user, &reply_display);
        let (width, height) = options.canvas_size();

        debug!(
            frames = frames.len(),
            width,
            height,
            user_chars = user_display.chars().count(),
            reply_chars = reply_display.chars().count(),
            "resolved render plan"
        );

        Self {
            conversation: Conversation {
                user: user_display,
                reply: reply_display,
            },
            typed_user,
            frames,
            layout: Layout::new(width, height, options.scale),
            width,
            height,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Fails with a single coded error if the canvas cannot be allocated.
    fn allocate_framebuffer(&self) -> Result<Framebuffer> {
        let pixels = u64::from(self.width) * u64::from(self.height);
        Framebuffer::try_new(self.width, self.height).map_err(|error| {
            anyhow!(CodedError::resource(
                "CANVAS_ALLOCATION_FAILED",
                format!(
                    "cannot allocate a {}x{} canvas: {error}",
                    self.width, self.height
                ),
            )
            .with_details(json!({
                "width": self.width,
                "height": self.height,
                "pixels": pixels,
                "frames": self.frames.len(),
            })))
        })
    }

    fn allocate_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).map_err(|error| {
            anyhow!(CodedError::resource(
                "CANVAS_ALLOCATION_FAILED",
                format!("cannot reserve {len} bytes for frame output: {error}"),
            ))
        })?;
        Ok(buffer)
    }

    /// Reserves `count` indexed frames of `frame_len` slots each before any painting.
    fn reserve_indexed_frames(
        &self,
        frame_len: usize,
        count: usize,
    ) -> Result<Vec<IndexedFrame>> {
        let total = frame_len.checked_mul(count).ok_or_else(|| {
            anyhow!(CodedError::resource(
                "CANVAS_ALLOCATION_FAILED",
                format!("{count} frames of {frame_len} pixels overflow addressable memory"),
            ))
        })?;
        debug!(total_pixels = total, frames = count, "reserving indexed frames");

        let mut frames: Vec<IndexedFrame> = Vec::new();
        frames.try_reserve_exact(count).map_err(|error| {
            anyhow!(CodedError::resource(
                "CANVAS_ALLOCATION_FAILED",
                format!("cannot reserve {count} indexed frames: {error}"),
            ))
        })?;
        for _ in 0..count {
            frames.push(IndexedFrame {
                width: self.width,
                height: self.height,
                pixels: self.allocate_bytes(frame_len)?,
                delay_cs: FRAME_DELAY_CS,
            });
        }
        Ok(frames)
    }

    /// Renders every frame into its own pre-reserved indexed buffer.
    pub fn indexed_frames(&self) -> Result<Vec<IndexedFrame>> {
        let frame_len = self.width as usize * self.height as usize;
        let mut frames = self.reserve_indexed_frames(frame_len, self.frame_count())?;
        let index = ColorIndex::new();
        let mut slots = frames.iter_mut();
        self.render_each(|state, fb| {
            let frame = slots.next().ok_or_else(|| {
                anyhow!("no indexed buffer reserved for frame {}", state.frame_index)
            })?;
            quantize_into(fb, &index, &mut frame.pixels);
            Ok(())
        })?;
        Ok(frames)
    }

    /// Paints every frame in order into one reused framebuffer.
    pub fn render_each<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&FrameState, &Framebuffer) -> Result<()>,
    {
        let mut fb = self.allocate_framebuffer()?;
        let mut cache = WrapCache::new();
        for state in &self.frames {
            paint_frame(&mut fb, &self.layout, state, &self.conversation, &mut cache);
            visit(state, &fb)?;
        }
        debug!(cached_wraps = cache.len(), "painted all frames");
        Ok(())
    }

    /// Paints the single frame at `frame_index` into a fresh canvas.
    pub fn render_frame(&self, frame_index: usize) -> Result<Framebuffer> {
        if frame_index >= self.frames.len() {
            return Err(anyhow!(CodedError::usage(
                "FRAME_OUT_OF_RANGE",
                format!(
                    "frame {frame_index} does not exist; this conversation has {} frames",
                    self.frames.len()
                ),
            )
            .with_details(json!({
                "requested": frame_index,
                "frame_count": self.frames.len(),
            }))));
        }

        let mut fb = self.allocate_framebuffer()?;
        let mut cache = WrapCache::new();
        paint_frame(
            &mut fb,
            &self.layout,
            &self.frames[frame_index],
            &self.conversation,
            &mut cache,
        );
        Ok(fb)
    }

    /// Quantizes each painted frame and submits it to `sink` in order.
    pub fn encode_into(&self, sink: &mut dyn FrameSink) -> Result<usize> {
        let index = ColorIndex::new();
        let palette = palette_bytes();
        let mut indexed = IndexedFrame {
            width: self.width,
            height: self.height,
            pixels: self.allocate_bytes(self.width as usize * self.height as usize)?,
            delay_cs: FRAME_DELAY_CS,
        };

        let mut submitted = 0;
        self.render_each(|state, fb| {
            quantize_into(fb, &index, &mut indexed.pixels);
            sink.write_frame(&indexed, &palette).with_context(|| {
                format!(
                    "{} sink rejected frame {}",
                    sink.sink_label(),
                    state.frame_index
                )
            })?;
            submitted += 1;
            Ok(())
        })?;
        Ok(submitted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GifSummary {
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedGif {
    pub bytes: Vec<u8>,
    pub summary: GifSummary,
}

/// Renders the whole conversation and returns the encoded GIF.
#[tracing::instrument(skip_all, fields(width = options.width, height = options.height, scale = options.scale, seed = options.seed))]
pub fn generate_gif(
    options: &GenerateOptions,
    provider: &dyn ReplyProvider,
) -> Result<GeneratedGif> {
    let plan = RenderPlan::new(options, provider);

    let initial = plan.width as usize * plan.height as usize + 64 * 1024;
    let buffer = plan.allocate_bytes(initial)?;
    debug!(reserved = initial, "starting gif encode");
    let mut sink = GifSink::with_buffer(
        buffer,
        plan.width,
        plan.height,
        &palette_bytes(),
        Repeat::Infinite,
    )?;

    let frame_count = plan.encode_into(&mut sink)?;
    let bytes = sink.finish()?;

    let summary = GifSummary {
        frame_count,
        width: plan.width,
        height: plan.height,
        bytes: bytes.len(),
        sha256: sha256_hex(&bytes),
    };
    info!(
        frames = summary.frame_count,
        bytes = summary.bytes,
        "generated chat gif"
    );
    Ok(GeneratedGif { bytes, summary })
}

/// Renders every frame to its indexed form without encoding.
pub fn render_indexed_frames(
    options: &GenerateOptions,
    provider: &dyn ReplyProvider,
) -> Result<Vec<IndexedFrame>> {
    RenderPlan::new(options, provider).indexed_frames()
}

/// Renders a single frame for previews.
pub fn render_frame_rgba(
    options: &GenerateOptions,
    provider: &dyn ReplyProvider,
    frame_index: usize,
) -> Result<Framebuffer> {
    RenderPlan::new(options, provider).render_frame(frame_index)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{generate_gif, render_frame_rgba, GenerateOptions, RenderPlan, FRAME_DELAY_CS};
    use crate::encoding::FrameSink;
    use crate::error_codes::find_coded_error;
    use crate::quantize::IndexedFrame;
    use crate::reply::{ReplyProvider, RoastProvider, DEFAULT_PAIRS};

    struct FixedReply(&'static str);

    impl ReplyProvider for FixedReply {
        fn reply(&self, _message: &str, _seed: u64) -> String {
            self.0.to_owned()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<(u32, u32, usize, u16)>,
        finished: bool,
    }

    impl FrameSink for RecordingSink {
        fn sink_label(&self) -> &'static str {
            "recording"
        }

        fn write_frame(&mut self, frame: &IndexedFrame, palette: &[u8]) -> Result<()> {
            assert!(!self.finished);
            assert_eq!(palette.len(), 48);
            self.frames
                .push((frame.width, frame.height, frame.pixels.len(), frame.delay_cs));
            Ok(())
        }

        fn finish(&mut self) -> Result<Vec<u8>> {
            self.finished = true;
            Ok(Vec::new())
        }
    }

    #[test]
    fn normalization_clamps_dimensions_and_scale() {
        let options = GenerateOptions {
            width: 10,
            height: 5000,
            scale: 9,
            ..GenerateOptions::new("x")
        }
        .normalized();
        assert_eq!((options.width, options.height, options.scale), (320, 600, 4));
        assert_eq!(
            GenerateOptions {
                scale: 0,
                ..GenerateOptions::new("x")
            }
            .canvas_size(),
            (480, 270)
        );
    }

    #[test]
    fn plan_uses_sanitized_display_strings() {
        let options = GenerateOptions {
            reply: Some("you said {msg}".to_owned()),
            ..GenerateOptions::new("  lots   of\n space ")
        };
        let plan = RenderPlan::new(&options, &RoastProvider);
        assert_eq!(plan.conversation.user, "lots of space");
        assert_eq!(plan.conversation.reply, "you said lots of space");
        assert_eq!(plan.typed_user, "lots of space");
    }

    #[test]
    fn typed_text_is_shorter_than_bubble_text_for_long_messages() {
        let message = "word ".repeat(30);
        let plan = RenderPlan::new(&GenerateOptions::new(message), &FixedReply("ok"));
        assert_eq!(plan.typed_user.chars().count(), 40);
        assert!(plan.typed_user.ends_with("..."));
        assert_eq!(plan.conversation.user.chars().count(), 80);
    }

    #[test]
    fn provider_is_used_when_no_reply_given() {
        let plan = RenderPlan::new(&GenerateOptions::new("hello"), &FixedReply("canned"));
        assert_eq!(plan.conversation.reply, "canned");

        let options = GenerateOptions {
            reply: Some("   ".to_owned()),
            ..GenerateOptions::new("hello")
        };
        let plan = RenderPlan::new(&options, &FixedReply("canned"));
        assert_eq!(plan.conversation.reply, "canned");
    }

    #[test]
    fn empty_message_falls_back_to_default_pair() {
        let options = GenerateOptions {
            seed: 1,
            ..GenerateOptions::default()
        };
        let plan = RenderPlan::new(&options, &FixedReply("unused"));
        assert_eq!(plan.conversation.user, DEFAULT_PAIRS[1].user);
        assert_eq!(plan.conversation.reply, DEFAULT_PAIRS[1].reply_text());
    }

    #[test]
    fn encode_submits_full_canvas_frames_in_order() {
        let options = GenerateOptions {
            reply: Some("As an AI, I acknowledge your greeting and still feel underwhelmed.".to_owned()),
            ..GenerateOptions::new("hi")
        };
        let plan = RenderPlan::new(&options, &RoastProvider);
        let mut sink = RecordingSink::default();
        let submitted = plan.encode_into(&mut sink).expect("encode");
        assert_eq!(submitted, 101);
        assert_eq!(sink.frames.len(), 101);
        assert!(sink
            .frames
            .iter()
            .all(|&frame| frame == (480, 270, 480 * 270, FRAME_DELAY_CS)));
    }

    #[test]
    fn scale_multiplies_canvas() {
        let options = GenerateOptions {
            scale: 2,
            ..GenerateOptions::new("hi")
        };
        let plan = RenderPlan::new(&options, &FixedReply("ok"));
        assert_eq!((plan.width, plan.height), (960, 540));
        assert_eq!(plan.layout.scale, 2);
    }

    #[test]
    fn out_of_range_preview_frame_is_a_usage_error() {
        let plan = RenderPlan::new(&GenerateOptions::new("hi"), &FixedReply("ok"));
        let error = plan
            .render_frame(plan.frame_count())
            .expect_err("frame past the end must fail");
        let coded = find_coded_error(&error).expect("coded");
        assert_eq!(coded.code, "FRAME_OUT_OF_RANGE");
    }

    #[test]
    fn unreservable_frame_memory_is_one_coded_error() {
        let plan = RenderPlan::new(&GenerateOptions::new("hi"), &FixedReply("ok"));

        let overflow = plan
            .reserve_indexed_frames(usize::MAX, 2)
            .expect_err("pixel total overflow must fail");
        assert_eq!(
            find_coded_error(&overflow).map(|coded| coded.code),
            Some("CANVAS_ALLOCATION_FAILED")
        );

        let too_many = plan
            .reserve_indexed_frames(1, usize::MAX / 2)
            .expect_err("frame list reservation must fail");
        assert_eq!(
            find_coded_error(&too_many).map(|coded| coded.code),
            Some("CANVAS_ALLOCATION_FAILED")
        );

        let huge = plan
            .allocate_bytes(usize::MAX)
            .expect_err("pixel buffer reservation must fail");
        assert_eq!(
            find_coded_error(&huge).map(|coded| coded.code),
            Some("CANVAS_ALLOCATION_FAILED")
        );
    }

    #[test]
    fn indexed_frames_fill_reserved_buffers() {
        let plan = RenderPlan::new(&GenerateOptions::new("hey"), &FixedReply("nope"));
        let frames = plan.indexed_frames().expect("frames");
        assert_eq!(frames.len(), plan.frame_count());
        for frame in &frames {
            assert_eq!((frame.width, frame.height), (480, 270));
            assert_eq!(frame.pixels.len(), 480 * 270);
            assert!(frame.pixels.capacity() >= 480 * 270);
            assert_eq!(frame.delay_cs, FRAME_DELAY_CS);
        }
        assert_ne!(frames[0].pixels, frames[frames.len() - 1].pixels);
    }

    #[test]
    fn single_frame_preview_matches_sequential_render() {
        let options = GenerateOptions::new("preview me");
        let plan = RenderPlan::new(&options, &FixedReply("a short reply"));
        let targets = [0, plan.frame_count() / 2, plan.frame_count() - 1];

        let mut sequential = Vec::new();
        plan.render_each(|state, fb| {
            if targets.contains(&(state.frame_index as usize)) {
                sequential.push(fb.rgba().to_vec());
            }
            Ok(())
        })
        .expect("render");

        for (target, expected) in targets.iter().zip(&sequential) {
            let preview = render_frame_rgba(&options, &FixedReply("a short reply"), *target)
                .expect("preview");
            assert_eq!(preview.rgba(), expected.as_slice(), "frame {target}");
        }
        assert_eq!(sequential.len(), targets.len());
    }

    #[test]
    fn generated_gif_is_deterministic() {
        let options = GenerateOptions {
            seed: 3,
            ..GenerateOptions::new("ship it")
        };
        let first = generate_gif(&options, &RoastProvider).expect("first");
        let second = generate_gif(&options, &RoastProvider).expect("second");
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.summary, second.summary);
        assert_eq!(&first.bytes[..6], b"GIF89a");
        assert_eq!(first.summary.sha256.len(), 64);
    }
}
