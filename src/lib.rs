pub mod card;
pub mod compositor;
pub mod encoding;
pub mod error_codes;
pub mod framebuffer;
pub mod generate;
pub mod glyphs;
pub mod palette;
pub mod quantize;
pub mod reply;
pub mod sequence;

pub use generate::{
    generate_gif, render_frame_rgba, render_indexed_frames, GenerateOptions, GeneratedGif, GifSummary, RenderPlan,
};
pub use reply::{ReplyProvider, RoastProvider};
