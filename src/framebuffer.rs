use std::borrow::Cow;
use std::collections::{HashMap, TryReserveError};

use crate::glyphs::{self, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::palette::Rgb;

/// RGBA8 pixel grid painted in place. Every write is fully opaque.
///
/// Coordinates are signed so shapes may hang off any edge; out-of-bounds pixels are
/// dropped instead of reported.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0_u8; width as usize * height as usize * 4],
        }
    }

    pub fn try_new(width: u32, height: u32) -> Result<Self, TryReserveError> {
        let len = width as usize * height as usize * 4;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.data
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgb(self.data[idx], self.data[idx + 1], self.data[idx + 2]))
    }

    pub fn clear(&mut self, color: Rgb) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.0, color.1, color.2, 255]);
        }
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&[color.0, color.1, color.2, 255]);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(self.width as i32);
        let y1 = y.saturating_add(h).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let stride = self.width as usize * 4;
        for yy in y0..y1 {
            let row_start = yy as usize * stride;
            let row = &mut self.data[row_start + x0 as usize * 4..row_start + x1 as usize * 4];
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&[color.0, color.1, color.2, 255]);
            }
        }
    }

    /// Approximate rounded rectangle: inside the corner bands each pixel measures how far
    /// it sits past the straight edge on each axis and is kept while
    /// `dx * dx + dy * dy <= radius * radius`. Integer-only so output is pixel-exact.
    pub fn fill_round_rect(&mut self, x: i32, y: i32, w: i32, h: i32, radius: i32, color: Rgb) {
        let r2 = i64::from(radius) * i64::from(radius);
        let right = x.saturating_add(w);
        let bottom = y.saturating_add(h);

        for yy in y..bottom {
            let dy = if yy < y + radius {
                y + radius - yy
            } else if yy >= bottom - radius {
                yy - (bottom - radius - 1)
            } else {
                0
            };
            for xx in x..right {
                let dx = if xx < x + radius {
                    x + radius - xx
                } else if xx >= right - radius {
                    xx - (right - radius - 1)
                } else {
                    0
                };
                let (dx, dy) = (i64::from(dx), i64::from(dy));
                if dx * dx + dy * dy <= r2 {
                    self.set_pixel(xx, yy, color);
                }
            }
        }
    }

    /// Blits `text` one code point at a time, each lit glyph bit becoming a
    /// `scale x scale` block. The cursor advances `(GLYPH_WIDTH + spacing) * scale`.
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, scale: i32, color: Rgb, spacing: i32) {
        let step = (GLYPH_WIDTH as i32 + spacing) * scale;
        let mut cursor_x = x;
        for ch in text.chars() {
            let rows = glyphs::glyph(ch);
            for gy in 0..GLYPH_HEIGHT {
                for gx in 0..GLYPH_WIDTH {
                    if !glyphs::sample(rows, gx, gy) {
                        continue;
                    }
                    let cell_x = cursor_x + gx as i32 * scale;
                    let cell_y = y + gy as i32 * scale;
                    self.fill_rect(cell_x, cell_y, scale, scale, color);
                }
            }
            cursor_x += step;
        }
    }
}

/// Greedy word wrap on whitespace. Widths use the monospace advance formula, not
/// rendered pixels. A single word wider than `max_width_px` stays whole on its own line.
pub fn wrap_text(text: &str, max_width_px: i32, scale: i32, spacing: i32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate_len = current.chars().count() + 1 + word.chars().count();
        let candidate_width =
            (GLYPH_WIDTH as i32 + spacing) * scale * candidate_len as i32 - spacing * scale;
        if candidate_width <= max_width_px {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapRole {
    User,
    Reply,
}

/// Request-scoped memo of wrapped lines, keyed by role so identical user and reply
/// text never share an entry.
#[derive(Debug, Default)]
pub struct WrapCache {
    entries: HashMap<(WrapRole, String), Vec<String>>,
}

impl WrapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, role: WrapRole, text: &str) -> Option<&[String]> {
        self.entries
            .get(&(role, text.to_owned()))
            .map(Vec::as_slice)
    }

    /// Returns cached lines, wrapping and inserting on a miss.
    pub fn wrapped(
        &mut self,
        role: WrapRole,
        text: &str,
        max_width_px: i32,
        scale: i32,
    ) -> &[String] {
        self.entries
            .entry((role, text.to_owned()))
            .or_insert_with(|| wrap_text(text, max_width_px, scale, 1))
    }

    /// Read-only variant: a miss is wrapped on the fly and not stored.
    pub fn peek_or_wrap(
        &self,
        role: WrapRole,
        text: &str,
        max_width_px: i32,
        scale: i32,
    ) -> Cow<'_, [String]> {
        match self.get(role, text) {
            Some(lines) => Cow::Borrowed(lines),
            None => Cow::Owned(wrap_text(text, max_width_px, scale, 1)),
        }
    }
}
