use tracing::trace;

use crate::framebuffer::{Framebuffer, WrapCache, WrapRole};
use crate::glyphs::{text_width, GLYPH_HEIGHT};
use crate::palette::Swatch;
use crate::sequence::FrameState;

const TEXT_SPACING: i32 = 1;
const USER_LABEL: &str = "USER";
const REPLY_LABEL: &str = "ASSISTANT";
const SEND_LABEL: &str = "SEND";

/// Final display strings for one conversation. Frame states only carry the revealed
/// portions; the bubbles are laid out from these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub user: String,
    pub reply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Scene geometry. Every measurement is a base pixel value multiplied by `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: i32,
    pub height: i32,
    pub scale: i32,
    pub margin: i32,
    pub panel: Rect,
    pub input_bar: Rect,
    pub send_button: Rect,
    pub chat_top: i32,
    pub bubble_max_w: i32,
    pub wrap_width: i32,
    pub line_h: i32,
    pub line_gap: i32,
    pub bubble_pad: i32,
}

impl Layout {
    pub fn new(width: u32, height: u32, scale: u32) -> Self {
        let width = width as i32;
        let height = height as i32;
        let scale = scale.max(1) as i32;
        let s = |n: i32| n * scale;

        let margin = s(12);
        let input_h = s(42);
        let bubble_max_w = width - margin * 2;

        let input_y = height - margin - input_h;
        let input_bar = Rect {
            x: margin + s(8),
            y: input_y,
            w: width - margin * 2 - s(16),
            h: input_h,
        };

        let btn_w = s(56);
        let btn_h = s(26);
        let send_button = Rect {
            x: width - margin - s(8) - btn_w,
            y: input_y + (input_h - btn_h) / 2,
            w: btn_w,
            h: btn_h,
        };

        Self {
            width,
            height,
            scale,
            margin,
            panel: Rect {
                x: margin,
                y: margin,
                w: width - margin * 2,
                h: height - margin * 2,
            },
            input_bar,
            send_button,
            chat_top: margin + s(22),
            bubble_max_w,
            wrap_width: bubble_max_w - s(30),
            line_h: GLYPH_HEIGHT as i32 * scale,
            line_gap: s(2),
            bubble_pad: s(5),
        }
    }

    fn s(&self, n: i32) -> i32 {
        n * self.scale
    }

    fn text_width(&self, text: &str) -> i32 {
        text_width(text, self.scale, TEXT_SPACING)
    }

    /// Height of the text block and width of its widest line.
    fn measure(&self, lines: &[String]) -> (i32, i32) {
        let text_h = lines.len() as i32 * (self.line_h + self.line_gap) - self.line_gap;
        let max_w = lines
            .iter()
            .map(|line| self.text_width(line))
            .max()
            .unwrap_or(0);
        (text_h, max_w)
    }

    fn bubble_size(&self, lines: &[String]) -> (i32, i32) {
        let (text_h, max_w) = self.measure(lines);
        let w = self.bubble_max_w.min(max_w + self.bubble_pad * 2);
        let h = text_h + self.bubble_pad * 2;
        (w, h)
    }
}

struct BubbleStyle {
    fill: Swatch,
    text: Swatch,
}

fn draw_bubble(
    fb: &mut Framebuffer,
    layout: &Layout,
    x: i32,
    y: i32,
    lines: &[String],
    style: BubbleStyle,
) -> (i32, i32) {
    let (w, h) = layout.bubble_size(lines);
    fb.fill_round_rect(x, y, w, h, layout.s(4), style.fill.rgb());

    let mut ty = y + layout.bubble_pad;
    for line in lines {
        fb.draw_text(
            x + layout.bubble_pad,
            ty,
            line,
            layout.scale,
            style.text.rgb(),
            TEXT_SPACING,
        );
        ty += layout.line_h + layout.line_gap;
    }
    (w, h)
}

/// Paints one complete scene for `state` into `fb`, overwriting whatever it held.
pub fn paint_frame(
    fb: &mut Framebuffer,
    layout: &Layout,
    state: &FrameState,
    conversation: &Conversation,
    cache: &mut WrapCache,
) {
    trace!(frame = state.frame_index, phase = ?state.phase, "painting frame");

    fb.clear(Swatch::Background.rgb());
    let panel = layout.panel;
    fb.fill_round_rect(
        panel.x,
        panel.y,
        panel.w,
        panel.h,
        layout.s(10),
        Swatch::Panel.rgb(),
    );

    let label_offset = layout.s(10) + layout.line_h;
    let mut y_cursor = layout.chat_top;
    let mut reply_bubble_top = y_cursor;
    let mut reply_bubble_h = 0;

    if state.show_user_bubble {
        let lines = cache.wrapped(
            WrapRole::User,
            &conversation.user,
            layout.wrap_width,
            layout.scale,
        );
        let (bubble_w, bubble_h) = layout.bubble_size(lines);
        let bubble_x = layout.width - layout.margin - layout.s(10) - bubble_w;

        let label_w = layout.text_width(USER_LABEL);
        fb.draw_text(
            bubble_x + bubble_w - label_w,
            y_cursor - label_offset,
            USER_LABEL,
            layout.scale,
            Swatch::TextDim.rgb(),
            TEXT_SPACING,
        );
        draw_bubble(
            fb,
            layout,
            bubble_x,
            y_cursor,
            lines,
            BubbleStyle {
                fill: Swatch::UserBubble,
                text: Swatch::White,
            },
        );
        y_cursor += bubble_h + layout.s(8);
    }

    if !state.reply_text.is_empty() {
        let lines = cache.wrapped(
            WrapRole::Reply,
            &state.reply_text,
            layout.wrap_width,
            layout.scale,
        );
        reply_bubble_top = y_cursor;
        let bubble_x = layout.margin + layout.s(10);
        fb.draw_text(
            bubble_x,
            y_cursor - label_offset,
            REPLY_LABEL,
            layout.scale,
            Swatch::TextDim.rgb(),
            TEXT_SPACING,
        );
        let (_, bubble_h) = draw_bubble(
            fb,
            layout,
            bubble_x,
            y_cursor,
            lines,
            BubbleStyle {
                fill: Swatch::ReplyBubble,
                text: Swatch::Text,
            },
        );
        reply_bubble_h = bubble_h;
    }

    let bar = layout.input_bar;
    fb.fill_round_rect(bar.x, bar.y, bar.w, bar.h, layout.s(8), Swatch::Input.rgb());

    let btn = layout.send_button;
    let btn_color = if state.send_pressed {
        Swatch::Accent
    } else {
        Swatch::Send
    };
    fb.fill_round_rect(btn.x, btn.y, btn.w, btn.h, layout.s(6), btn_color.rgb());
    fb.draw_text(
        btn.x + layout.s(8),
        btn.y + layout.s(7),
        SEND_LABEL,
        layout.scale,
        Swatch::White.rgb(),
        TEXT_SPACING,
    );

    let input_x = layout.margin + layout.s(16);
    let input_y = bar.y + layout.s(12);
    if !state.user_input.is_empty() {
        fb.draw_text(
            input_x,
            input_y,
            &state.user_input,
            layout.scale,
            Swatch::Text.rgb(),
            TEXT_SPACING,
        );
    }

    if !state.caret_visible() {
        return;
    }

    if !state.show_user_bubble {
        let caret_x = input_x + layout.text_width(&state.user_input) + layout.s(2);
        fb.fill_rect(caret_x, input_y, layout.s(2), layout.line_h, Swatch::Text.rgb());
    }

    if reply_still_typing(state, conversation) {
        let lines = cache.peek_or_wrap(
            WrapRole::Reply,
            &state.reply_text,
            layout.wrap_width,
            layout.scale,
        );
        let last_line = lines.last().map(String::as_str).unwrap_or("");
        let caret_x = layout.margin
            + layout.s(10)
            + layout.s(5)
            + layout.text_width(last_line)
            + layout.s(2);
        let caret_y = reply_bubble_top + reply_bubble_h - (layout.line_h + layout.s(5));
        fb.fill_rect(
            caret_x,
            caret_y,
            layout.s(2),
            layout.line_h,
            Swatch::TextDim.rgb(),
        );
    }
}

/// The reply caret only shows while the revealed text is still short of the final reply.
fn reply_still_typing(state: &FrameState, conversation: &Conversation) -> bool {
    state.show_user_bubble && !state.reply_text.is_empty() && state.reply_text != conversation.reply
}
