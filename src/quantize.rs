use crate::framebuffer::Framebuffer;
use crate::palette::{ColorIndex, Rgb};

/// One frame of palette slot numbers, row-major, plus its display delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Hundredths of a second, the GIF native unit.
    pub delay_cs: u16,
}

/// Maps every pixel to its exact palette slot, refilling `out` in place so its
/// allocation carries across frames. Alpha is ignored and unknown colours become slot 0.
pub fn quantize_into(fb: &Framebuffer, index: &ColorIndex, out: &mut Vec<u8>) {
    out.clear();
    out.extend(
        fb.rgba()
            .chunks_exact(4)
            .map(|px| index.lookup(Rgb(px[0], px[1], px[2]))),
    );
}

#[cfg(test)]
mod tests {
    use super::quantize_into;
    use crate::framebuffer::Framebuffer;
    use crate::palette::{ColorIndex, Rgb, Swatch};

    #[test]
    fn quantize_emits_one_index_per_pixel() {
        let mut fb = Framebuffer::new(3, 2);
        fb.clear(Swatch::Panel.rgb());
        fb.set_pixel(2, 1, Swatch::Send.rgb());
        let mut indexed = Vec::new();
        quantize_into(&fb, &ColorIndex::new(), &mut indexed);
        assert_eq!(indexed, vec![1, 1, 1, 1, 1, 11]);
    }

    #[test]
    fn off_palette_pixels_quantize_to_zero() {
        let mut fb = Framebuffer::new(2, 1);
        fb.clear(Swatch::White.rgb());
        fb.set_pixel(0, 0, Rgb(0x12, 0x34, 0x56));
        let mut indexed = Vec::new();
        quantize_into(&fb, &ColorIndex::new(), &mut indexed);
        assert_eq!(indexed, vec![0, 10]);
    }

    #[test]
    fn quantize_into_reuses_buffer() {
        let mut fb = Framebuffer::new(2, 2);
        fb.clear(Swatch::Accent.rgb());
        let mut out = vec![9_u8; 16];
        quantize_into(&fb, &ColorIndex::new(), &mut out);
        assert_eq!(out, vec![4, 4, 4, 4]);
        assert!(out.capacity() >= 16);
    }
}
