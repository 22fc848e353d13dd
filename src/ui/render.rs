// 5x7 bitmap font covering ASCII 32..127. Each glyph is 5 columns × 7 rows
// packed into 5 bytes (one byte per column, LSB = top row).
static FONT_5X7: [[u8; 5]; 96] = {
    let mut f = [[0u8; 5]; 96];
    // space
    f[0]  = [0x00, 0x00, 0x00, 0x00, 0x00];
    // !
    f[1]  = [0x00, 0x00, 0x5F, 0x00, 0x00];
    // "
    f[2]  = [0x00, 0x07, 0x00, 0x07, 0x00];
    // #
    f[3]  = [0x14, 0x7F, 0x14, 0x7F, 0x14];
    // $
    f[4]  = [0x24, 0x2A, 0x7F, 0x2A, 0x12];
    // %
    f[5]  = [0x23, 0x13, 0x08, 0x64, 0x62];
    // &
    f[6]  = [0x36, 0x49, 0x55, 0x22, 0x50];
    // '
    f[7]  = [0x00, 0x05, 0x03, 0x00, 0x00];
    // (
    f[8]  = [0x00, 0x1C, 0x22, 0x41, 0x00];
    // )
    f[9]  = [0x00, 0x41, 0x22, 0x1C, 0x00];
    // *
    f[10] = [0x14, 0x08, 0x3E, 0x08, 0x14];
    // +
    f[11] = [0x08, 0x08, 0x3E, 0x08, 0x08];
    // ,
    f[12] = [0x00, 0x50, 0x30, 0x00, 0x00];
    // -
    f[13] = [0x08, 0x08, 0x08, 0x08, 0x08];
    // .
    f[14] = [0x00, 0x60, 0x60, 0x00, 0x00];
    // /
    f[15] = [0x20, 0x10, 0x08, 0x04, 0x02];
    // 0
    f[16] = [0x3E, 0x51, 0x49, 0x45, 0x3E];
    // 1
    f[17] = [0x00, 0x42, 0x7F, 0x40, 0x00];
    // 2
    f[18] = [0x42, 0x61, 0x51, 0x49, 0x46];
    // 3
    f[19] = [0x21, 0x41, 0x45, 0x4B, 0x31];
    // 4
    f[20] = [0x18, 0x14, 0x12, 0x7F, 0x10];
    // 5
    f[21] = [0x27, 0x45, 0x45, 0x45, 0x39];
    // 6
    f[22] = [0x3C, 0x4A, 0x49, 0x49, 0x30];
    // 7
    f[23] = [0x01, 0x71, 0x09, 0x05, 0x03];
    // 8
    f[24] = [0x36, 0x49, 0x49, 0x49, 0x36];
    // 9
    f[25] = [0x06, 0x49, 0x49, 0x29, 0x1E];
    // :
    f[26] = [0x00, 0x36, 0x36, 0x00, 0x00];
    // ;
    f[27] = [0x00, 0x56, 0x36, 0x00, 0x00];
    // <
    f[28] = [0x08, 0x14, 0x22, 0x41, 0x00];
    // =
    f[29] = [0x14, 0x14, 0x14, 0x14, 0x14];
    // >
    f[30] = [0x00, 0x41, 0x22, 0x14, 0x08];
    // ?
    f[31] = [0x02, 0x01, 0x51, 0x09, 0x06];
    // @
    f[32] = [0x3E, 0x41, 0x5D, 0x55, 0x1E];
    // A
    f[33] = [0x7E, 0x11, 0x11, 0x11, 0x7E];
    // B
    f[34] = [0x7F, 0x49, 0x49, 0x49, 0x36];
    // C
    f[35] = [0x3E, 0x41, 0x41, 0x41, 0x22];
    // D
    f[36] = [0x7F, 0x41, 0x41, 0x22, 0x1C];
    // E
    f[37] = [0x7F, 0x49, 0x49, 0x49, 0x41];
    // F
    f[38] = [0x7F, 0x09, 0x09, 0x09, 0x01];
    // G
    f[39] = [0x3E, 0x41, 0x49, 0x49, 0x7A];
    // H
    f[40] = [0x7F, 0x08, 0x08, 0x08, 0x7F];
    // I
    f[41] = [0x00, 0x41, 0x7F, 0x41, 0x00];
    // J
    f[42] = [0x20, 0x40, 0x41, 0x3F, 0x01];
    // K
    f[43] = [0x7F, 0x08, 0x14, 0x22, 0x41];
    // L
    f[44] = [0x7F, 0x40, 0x40, 0x40, 0x40];
    // M
    f[45] = [0x7F, 0x02, 0x0C, 0x02, 0x7F];
    // N
    f[46] = [0x7F, 0x04, 0x08, 0x10, 0x7F];
    // O
    f[47] = [0x3E, 0x41, 0x41, 0x41, 0x3E];
    // P
    f[48] = [0x7F, 0x09, 0x09, 0x09, 0x06];
    // Q
    f[49] = [0x3E, 0x41, 0x51, 0x21, 0x5E];
    // R
    f[50] = [0x7F, 0x09, 0x19, 0x29, 0x46];
    // S
    f[51] = [0x46, 0x49, 0x49, 0x49, 0x31];
    // T
    f[52] = [0x01, 0x01, 0x7F, 0x01, 0x01];
    // U
    f[53] = [0x3F, 0x40, 0x40, 0x40, 0x3F];
    // V
    f[54] = [0x1F, 0x20, 0x40, 0x20, 0x1F];
    // W
    f[55] = [0x3F, 0x40, 0x38, 0x40, 0x3F];
    // X
    f[56] = [0x63, 0x14, 0x08, 0x14, 0x63];
    // Y
    f[57] = [0x07, 0x08, 0x70, 0x08, 0x07];
    // Z
    f[58] = [0x61, 0x51, 0x49, 0x45, 0x43];
    // [
    f[59] = [0x00, 0x7F, 0x41, 0x41, 0x00];
    // backslash
    f[60] = [0x02, 0x04, 0x08, 0x10, 0x20];
    // ]
    f[61] = [0x00, 0x41, 0x41, 0x7F, 0x00];
    // ^
    f[62] = [0x04, 0x02, 0x01, 0x02, 0x04];
    // _
    f[63] = [0x40, 0x40, 0x40, 0x40, 0x40];
    // `
    f[64] = [0x00, 0x01, 0x02, 0x04, 0x00];
    // a
    f[65] = [0x20, 0x54, 0x54, 0x54, 0x78];
    // b
    f[66] = [0x7F, 0x48, 0x44, 0x44, 0x38];
    // c
    f[67] = [0x38, 0x44, 0x44, 0x44, 0x20];
    // d
    f[68] = [0x38, 0x44, 0x44, 0x48, 0x7F];
    // e
    f[69] = [0x38, 0x54, 0x54, 0x54, 0x18];
    // f
    f[70] = [0x08, 0x7E, 0x09, 0x01, 0x02];
    // g
    f[71] = [0x0C, 0x52, 0x52, 0x52, 0x3E];
    // h
    f[72] = [0x7F, 0x08, 0x04, 0x04, 0x78];
    // i
    f[73] = [0x00, 0x44, 0x7D, 0x40, 0x00];
    // j
    f[74] = [0x20, 0x40, 0x44, 0x3D, 0x00];
    // k
    f[75] = [0x7F, 0x10, 0x28, 0x44, 0x00];
    // l
    f[76] = [0x00, 0x41, 0x7F, 0x40, 0x00];
    // m
    f[77] = [0x7C, 0x04, 0x18, 0x04, 0x78];
    // n
    f[78] = [0x7C, 0x08, 0x04, 0x04, 0x78];
    // o
    f[79] = [0x38, 0x44, 0x44, 0x44, 0x38];
    // p
    f[80] = [0x7C, 0x14, 0x14, 0x14, 0x08];
    // q
    f[81] = [0x08, 0x14, 0x14, 0x18, 0x7C];
    // r
    f[82] = [0x7C, 0x08, 0x04, 0x04, 0x08];
    // s
    f[83] = [0x48, 0x54, 0x54, 0x54, 0x20];
    // t
    f[84] = [0x04, 0x3F, 0x44, 0x40, 0x20];
    // u
    f[85] = [0x3C, 0x40, 0x40, 0x20, 0x7C];
    // v
    f[86] = [0x1C, 0x20, 0x40, 0x20, 0x1C];
    // w
    f[87] = [0x3C, 0x40, 0x30, 0x40, 0x3C];
    // x
    f[88] = [0x44, 0x28, 0x10, 0x28, 0x44];
    // y
    f[89] = [0x0C, 0x50, 0x50, 0x50, 0x3C];
    // z
    f[90] = [0x44, 0x64, 0x54, 0x4C, 0x44];
    // {
    f[91] = [0x00, 0x08, 0x36, 0x41, 0x00];
    // |
    f[92] = [0x00, 0x00, 0x7F, 0x00, 0x00];
    // }
    f[93] = [0x00, 0x41, 0x36, 0x08, 0x00];
    // ~
    f[94] = [0x10, 0x08, 0x08, 0x10, 0x08];
    // DEL (blank)
    f[95] = [0x00, 0x00, 0x00, 0x00, 0x00];
    f
};

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

fn blend(src: (u8, u8, u8), alpha: u32, dst: u32) -> u32 {
    if alpha >= 255 {
        return rgb(src.0, src.1, src.2);
    }
    let (dr, dg, db) = unpack_rgb(dst);
    let inv = 255 - alpha;
    let r = ((src.0 as u32 * alpha + dr as u32 * inv) / 255) as u8;
    let g = ((src.1 as u32 * alpha + dg as u32 * inv) / 255) as u8;
    let b = ((src.2 as u32 * alpha + db as u32 * inv) / 255) as u8;
    rgb(r, g, b)
}

/// Advance of one glyph cell: 5 pixels plus 1 spacing.
pub fn glyph_advance(scale: u32) -> u32 {
    6 * scale
}

pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * glyph_advance(scale)
}

pub fn text_height(scale: u32) -> u32 {
    7 * scale
}

fn draw_char(buf: &mut [u32], stride: u32, buf_h: u32, ch: char, px: i32, py: i32, scale: u32, color: u32) {
    let idx = (ch as u32).wrapping_sub(32) as usize;
    let glyph = FONT_5X7.get(idx).unwrap_or(&FONT_5X7[31]);
    for col in 0..5u32 {
        let bits = glyph[col as usize];
        for row in 0..7u32 {
            if bits & (1 << row) == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let x = px + (col * scale + sx) as i32;
                    let y = py + (row * scale + sy) as i32;
                    if x >= 0 && y >= 0 && (x as u32) < stride && (y as u32) < buf_h {
                        buf[(y as u32 * stride + x as u32) as usize] = color;
                    }
                }
            }
        }
    }
}

/// Draw a string, clipped to `max_x`. Returns the x position after the last character drawn.
pub fn draw_text(buf: &mut [u32], stride: u32, buf_h: u32, text: &str, px: i32, py: i32, max_x: i32, scale: u32, color: u32) -> i32 {
    let adv = glyph_advance(scale) as i32;
    let mut x = px;
    for ch in text.chars() {
        if x + adv - scale as i32 > max_x {
            break;
        }
        draw_char(buf, stride, buf_h, ch, x, py, scale, color);
        x += adv;
    }
    x
}

pub fn fill_rect(buf: &mut [u32], stride: u32, buf_h: u32, rx: i32, ry: i32, rw: u32, rh: u32, color: u32) {
    let x0 = rx.max(0) as u32;
    let y0 = ry.max(0) as u32;
    let x1 = ((rx + rw as i32).max(0) as u32).min(stride);
    let y1 = ((ry + rh as i32).max(0) as u32).min(buf_h);
    for y in y0..y1 {
        let row = (y * stride) as usize;
        buf[row + x0 as usize..row + x1.max(x0) as usize].fill(color);
    }
}

/// Rectangle outline `bw` pixels thick, drawn inside `(rx, ry, rw, rh)`.
pub fn draw_rect(buf: &mut [u32], stride: u32, buf_h: u32, rx: i32, ry: i32, rw: u32, rh: u32, bw: u32, color: u32) {
    if rw == 0 || rh == 0 {
        return;
    }
    let bw = bw.min(rw / 2).min(rh / 2).max(1);
    fill_rect(buf, stride, buf_h, rx, ry, rw, bw, color);
    fill_rect(buf, stride, buf_h, rx, ry + (rh - bw) as i32, rw, bw, color);
    fill_rect(buf, stride, buf_h, rx, ry, bw, rh, color);
    fill_rect(buf, stride, buf_h, rx + (rw - bw) as i32, ry, bw, rh, color);
}

// ---------------------------------------------------------------------------
// Image blitting
// ---------------------------------------------------------------------------

/// Display orientation of an image: source is flipped first, then rotated
/// clockwise by `rotation` quarter turns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub rotation: u8,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl Orientation {
    pub fn swaps_axes(&self) -> bool {
        self.rotation % 2 == 1
    }

    /// Displayed size of a `w`x`h` source.
    pub fn display_size(&self, w: u32, h: u32) -> (u32, u32) {
        if self.swaps_axes() { (h, w) } else { (w, h) }
    }

    /// Map displayed coordinates back into source coordinates.
    fn to_source(&self, u: f32, v: f32, w: f32, h: f32) -> (f32, f32) {
        let (mut a, mut b) = match self.rotation % 4 {
            1 => (v, h - u),
            2 => (w - u, h - v),
            3 => (w - v, u),
            _ => (u, v),
        };
        if self.flip_h {
            a = w - a;
        }
        if self.flip_v {
            b = h - b;
        }
        (a, b)
    }
}

pub struct Blit<'a> {
    pub src: &'a [u8],
    pub src_w: u32,
    pub src_h: u32,
    /// Top-left corner of the displayed image in window pixels.
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
    pub orientation: Orientation,
    pub antialias: bool,
    /// Draw a checkerboard under transparent pixels instead of `bg`.
    pub checker: bool,
    pub gamma: Option<&'a [u8; 256]>,
    pub bg: u32,
}

const CHECKER_SIZE: u32 = 8;
const CHECKER_DARK: u32 = 0x0066_6666;
const CHECKER_LIGHT: u32 = 0x0099_9999;

fn checker(x: u32, y: u32) -> u32 {
    if (x / CHECKER_SIZE + y / CHECKER_SIZE) % 2 == 0 {
        CHECKER_DARK
    } else {
        CHECKER_LIGHT
    }
}

impl Blit<'_> {
    fn texel(&self, sx: u32, sy: u32) -> [u8; 4] {
        let i = (sy as usize * self.src_w as usize + sx as usize) * 4;
        [self.src[i], self.src[i + 1], self.src[i + 2], self.src[i + 3]]
    }

    fn sample_nearest(&self, a: f32, b: f32) -> Option<[u8; 4]> {
        if a < 0.0 || b < 0.0 {
            return None;
        }
        let (sx, sy) = (a as u32, b as u32);
        if sx >= self.src_w || sy >= self.src_h {
            return None;
        }
        Some(self.texel(sx, sy))
    }

    fn sample_bilinear(&self, a: f32, b: f32) -> Option<[u8; 4]> {
        let w = self.src_w as f32;
        let h = self.src_h as f32;
        if a < 0.0 || b < 0.0 || a >= w || b >= h {
            return None;
        }
        let fx = (a - 0.5).clamp(0.0, w - 1.0);
        let fy = (b - 0.5).clamp(0.0, h - 1.0);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.src_w - 1);
        let y1 = (y0 + 1).min(self.src_h - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let (p00, p10, p01, p11) = (
            self.texel(x0, y0),
            self.texel(x1, y0),
            self.texel(x0, y1),
            self.texel(x1, y1),
        );
        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] as f32 * (1.0 - tx) + p10[c] as f32 * tx;
            let bot = p01[c] as f32 * (1.0 - tx) + p11[c] as f32 * tx;
            out[c] = (top * (1.0 - ty) + bot * ty).round() as u8;
        }
        Some(out)
    }

    /// Draw into `dst`, limited to the first `clip_h` rows.
    pub fn draw(&self, dst: &mut [u32], dst_w: u32, clip_h: u32) {
        if self.src_w == 0 || self.src_h == 0 || self.zoom <= 0.0 {
            return;
        }
        let (disp_w, disp_h) = self.orientation.display_size(self.src_w, self.src_h);
        let draw_w = disp_w as f32 * self.zoom;
        let draw_h = disp_h as f32 * self.zoom;

        let dx_start = self.x.max(0.0) as u32;
        let dy_start = self.y.max(0.0) as u32;
        let dx_end = ((self.x + draw_w).ceil().max(0.0) as u32).min(dst_w);
        let dy_end = ((self.y + draw_h).ceil().max(0.0) as u32).min(clip_h);
        let smooth = self.antialias && (self.zoom - 1.0).abs() > f32::EPSILON;
        let inv_zoom = 1.0 / self.zoom;
        let (w, h) = (self.src_w as f32, self.src_h as f32);

        for dy in dy_start..dy_end {
            let v = (dy as f32 + 0.5 - self.y) * inv_zoom;
            for dx in dx_start..dx_end {
                let u = (dx as f32 + 0.5 - self.x) * inv_zoom;
                let (a, b) = self.orientation.to_source(u, v, w, h);
                let px = if smooth {
                    self.sample_bilinear(a, b)
                } else {
                    self.sample_nearest(a, b)
                };
                let Some([r, g, bl, alpha]) = px else {
                    continue;
                };
                let (r, g, bl) = match self.gamma {
                    Some(lut) => (lut[r as usize], lut[g as usize], lut[bl as usize]),
                    None => (r, g, bl),
                };
                let di = dy as usize * dst_w as usize + dx as usize;
                let under = if self.checker { checker(dx, dy) } else { self.bg };
                dst[di] = match alpha {
                    255 => rgb(r, g, bl),
                    0 => under,
                    a => blend((r, g, bl), a as u32, under),
                };
            }
        }
    }
}

/// Lookup table for a gamma multiplier: `out = 255 * (in / 255) ^ (1 / m)`.
pub fn gamma_lut(multiplier: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let x = i as f64 / 255.0;
        *v = if multiplier <= 0.0 {
            if i == 255 { 255 } else { 0 }
        } else {
            (255.0 * x.powf(1.0 / multiplier)).round().clamp(0.0, 255.0) as u8
        };
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take((w * h * 4) as usize).collect()
    }

    fn blit<'a>(src: &'a [u8], w: u32, h: u32) -> Blit<'a> {
        Blit {
            src,
            src_w: w,
            src_h: h,
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            orientation: Orientation::default(),
            antialias: false,
            checker: false,
            gamma: None,
            bg: 0,
        }
    }

    #[test]
    fn text_metrics() {
        assert_eq!(text_width("abc", 1), 18);
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_height(2), 14);
    }

    #[test]
    fn draw_text_clips_at_limit() {
        let mut buf = vec![0u32; 100 * 10];
        let end = draw_text(&mut buf, 100, 10, "hello world", 0, 0, 30, 1, 0xffffff);
        assert_eq!(end, 30);
    }

    #[test]
    fn fill_rect_clips() {
        let mut buf = vec![0u32; 4 * 4];
        fill_rect(&mut buf, 4, 4, -2, 2, 10, 10, 7);
        assert_eq!(buf.iter().filter(|&&p| p == 7).count(), 8);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[8], 7);
    }

    #[test]
    fn draw_rect_leaves_center() {
        let mut buf = vec![0u32; 5 * 5];
        draw_rect(&mut buf, 5, 5, 0, 0, 5, 5, 1, 9);
        assert_eq!(buf[12], 0);
        assert_eq!(buf[0], 9);
        assert_eq!(buf[24], 9);
    }

    #[test]
    fn orientation_maps_corners() {
        // 4x2 source, top-left texel marks the origin.
        let o = Orientation { rotation: 1, ..Default::default() };
        assert_eq!(o.display_size(4, 2), (2, 4));
        // After a clockwise turn the source origin sits at the top-right.
        let (a, b) = o.to_source(1.5, 0.5, 4.0, 2.0);
        assert_eq!((a as u32, b as u32), (0, 0));

        let flipped = Orientation { flip_h: true, ..Default::default() };
        let (a, b) = flipped.to_source(0.5, 0.5, 4.0, 2.0);
        assert_eq!((a as u32, b as u32), (3, 0));
    }

    #[test]
    fn blit_scales_and_blends() {
        let src = solid(2, 2, [255, 0, 0, 255]);
        let mut dst = vec![0u32; 8 * 8];
        let mut b = blit(&src, 2, 2);
        b.zoom = 2.0;
        b.x = 2.0;
        b.y = 2.0;
        b.draw(&mut dst, 8, 8);
        assert_eq!(dst[2 * 8 + 2], rgb(255, 0, 0));
        assert_eq!(dst[5 * 8 + 5], rgb(255, 0, 0));
        assert_eq!(dst[6 * 8 + 6], 0);
        assert_eq!(dst[1 * 8 + 1], 0);

        let clear = solid(1, 1, [255, 255, 255, 0]);
        let mut dst = vec![0u32; 1];
        let mut b = blit(&clear, 1, 1);
        b.bg = 0x123456;
        b.draw(&mut dst, 1, 1);
        assert_eq!(dst[0], 0x123456);
    }

    #[test]
    fn blit_respects_clip_height() {
        let src = solid(4, 4, [0, 255, 0, 255]);
        let mut dst = vec![0u32; 16];
        blit(&src, 4, 4).draw(&mut dst, 4, 2);
        assert_eq!(dst[4], rgb(0, 255, 0));
        assert_eq!(dst[8], 0);
    }

    #[test]
    fn gamma_lut_identity_and_extremes() {
        let id = gamma_lut(1.0);
        assert!(id.iter().enumerate().all(|(i, &v)| v as usize == i));
        let black = gamma_lut(0.0);
        assert_eq!(black[254], 0);
        assert_eq!(black[255], 255);
        let bright = gamma_lut(2.0);
        assert!(bright[64] > 64);
    }
}
