use std::path::Path;
use std::time::Duration;

use crate::config::{
    zoom_max, zoom_min, ALPHA_LAYER, ANTI_ALIAS, GAMMA_MAX, GAMMA_RANGE, PAN_FRACTION,
    SLIDESHOW_DELAY, ZOOM_LEVELS,
};
use crate::display::Canvas;
use crate::error::Result;
use crate::loader::{decode_image, DecodedImage, Frame};
use crate::timers::Reschedule;
use crate::ui::render::{gamma_lut, Blit, Orientation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// Fit, but never enlarge.
    Down,
    Fit,
    Width,
    Height,
    /// Explicit zoom factor.
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degree {
    D90,
    D180,
    D270,
}

impl Degree {
    fn quarter_turns(self) -> u8 {
        match self {
            Degree::D90 => 1,
            Degree::D180 => 2,
            Degree::D270 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDir {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Relative,
    Absolute,
}

/// Startup settings for the image view, taken from the command line.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub scalemode: ScaleMode,
    pub zoom: f32,
    pub animate: bool,
    /// Forced frame delay in milliseconds (`-A`).
    pub framedelay: Option<u32>,
    pub gamma: i32,
    /// Slideshow delay in tenths of a second; 0 leaves the slideshow off.
    pub slideshow: u32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            scalemode: ScaleMode::Down,
            zoom: 1.0,
            animate: false,
            framedelay: None,
            gamma: 0,
            slideshow: 0,
        }
    }
}

/// Brightness multiplier for a gamma level. Levels at or below zero map
/// linearly onto `[0, 1]`, positive ones onto `(1, GAMMA_MAX]`.
pub fn gamma_multiplier(level: i32) -> f64 {
    let level = level.clamp(-GAMMA_RANGE, GAMMA_RANGE);
    let range = if level <= 0 { 1.0 } else { GAMMA_MAX - 1.0 };
    1.0 + level as f64 * (range / GAMMA_RANGE as f64)
}

fn zoomdiff(a: f32, b: f32) -> f32 {
    let d = a - b;
    if d.abs() < 1e-4 { 0.0 } else { d }
}

pub struct Slideshow {
    pub on: bool,
    /// Tenths of a second.
    pub delay: u32,
}

// ---------------------------------------------------------------------------
// Image view
// ---------------------------------------------------------------------------

pub struct ImageView {
    image: Option<DecodedImage>,
    /// Displayed size of the current frame (axes swapped by odd rotations).
    pub w: u32,
    pub h: u32,
    /// Window position of the image's top-left corner.
    pub x: f32,
    pub y: f32,
    pub scalemode: ScaleMode,
    pub zoom: f32,
    pub checkpan: bool,
    pub aa: bool,
    pub alpha: bool,
    pub gamma: i32,
    lut: Option<[u8; 256]>,
    pub orientation: Orientation,
    pub ss: Slideshow,
    pub sel: usize,
    pub animate: bool,
    framedelay: Option<u32>,
    win_w: u32,
    win_h: u32,
}

impl ImageView {
    pub fn new(opts: &ViewOptions) -> Self {
        let mut view = Self {
            image: None,
            w: 0,
            h: 0,
            x: 0.0,
            y: 0.0,
            scalemode: opts.scalemode,
            zoom: opts.zoom.clamp(zoom_min(), zoom_max()),
            checkpan: false,
            aa: ANTI_ALIAS,
            alpha: ALPHA_LAYER,
            gamma: 0,
            lut: None,
            orientation: Orientation::default(),
            ss: Slideshow {
                on: opts.slideshow > 0,
                delay: if opts.slideshow > 0 {
                    opts.slideshow
                } else {
                    SLIDESHOW_DELAY * 10
                },
            },
            sel: 0,
            animate: opts.animate,
            framedelay: opts.framedelay,
            win_w: 0,
            win_h: 0,
        };
        view.change_gamma(opts.gamma);
        view
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Update the drawable area; position is re-validated on the next render.
    pub fn set_window(&mut self, w: u32, h: u32) {
        if (w, h) != (self.win_w, self.win_h) {
            self.win_w = w;
            self.win_h = h;
            self.checkpan = true;
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        let image = decode_image(path, self.framedelay)?;
        self.set_image(image);
        Ok(())
    }

    /// Install already decoded frames and lay them out for the window.
    pub fn set_image(&mut self, image: DecodedImage) {
        self.orientation = Orientation::default();
        self.sel = 0;
        self.w = image.frames[0].width;
        self.h = image.frames[0].height;
        self.image = Some(image);
        self.fit();
        self.x = (self.win_w as f32 - self.w as f32 * self.zoom) / 2.0;
        self.y = (self.win_h as f32 - self.h as f32 * self.zoom) / 2.0;
        self.check_pan();
        self.checkpan = false;
    }

    pub fn close(&mut self) {
        self.image = None;
    }

    pub fn frame_count(&self) -> usize {
        self.image.as_ref().map(|i| i.frames.len()).unwrap_or(0)
    }

    pub fn is_multiframe(&self) -> bool {
        self.frame_count() > 1
    }

    fn frame(&self) -> Option<&Frame> {
        self.image.as_ref().and_then(|i| i.frames.get(self.sel))
    }

    pub fn frame_delay(&self) -> Option<Duration> {
        self.frame()
            .map(|f| Duration::from_millis(f.delay_ms.max(1) as u64))
    }

    /// Length of one animation loop; zero for stills.
    pub fn anim_length(&self) -> Duration {
        match &self.image {
            Some(img) if img.is_animated() => Duration::from_millis(img.length_ms() as u64),
            _ => Duration::ZERO,
        }
    }

    /// Size of the unrotated source, as reported to the info hook.
    pub fn source_size(&self) -> (u32, u32) {
        self.frame().map(|f| (f.width, f.height)).unwrap_or((0, 0))
    }

    // -----------------------------------------------------------------------
    // Zoom and position
    // -----------------------------------------------------------------------

    /// Recompute the zoom for the current fit policy. Returns whether it changed.
    pub fn fit(&mut self) -> bool {
        if self.scalemode == ScaleMode::Zoom || self.w == 0 || self.h == 0 || self.win_w == 0 {
            return false;
        }
        let zw = self.win_w as f32 / self.w as f32;
        let zh = self.win_h as f32 / self.h as f32;
        let z = match self.scalemode {
            ScaleMode::Width => zw,
            ScaleMode::Height => zh,
            _ => zw.min(zh),
        };
        let z = z.min(if self.scalemode == ScaleMode::Down { 1.0 } else { zoom_max() });
        if zoomdiff(z, self.zoom) != 0.0 {
            self.zoom = z;
            true
        } else {
            false
        }
    }

    /// Keep the image in view: center it along axes where it is smaller than
    /// the window, otherwise keep the window covered.
    pub fn check_pan(&mut self) {
        let w = self.w as f32 * self.zoom;
        let h = self.h as f32 * self.zoom;
        let (ww, wh) = (self.win_w as f32, self.win_h as f32);
        if w < ww {
            self.x = (ww - w) / 2.0;
        } else if self.x > 0.0 {
            self.x = 0.0;
        } else if self.x + w < ww {
            self.x = ww - w;
        }
        if h < wh {
            self.y = (wh - h) / 2.0;
        } else if self.y > 0.0 {
            self.y = 0.0;
        } else if self.y + h < wh {
            self.y = wh - h;
        }
    }

    /// Fit policy and pending pan checks, applied right before drawing.
    pub fn prepare(&mut self) {
        let oz = self.zoom;
        if self.fit() {
            self.rescale_around_center(oz);
            self.checkpan = true;
        }
        if self.checkpan {
            self.check_pan();
            self.checkpan = false;
        }
    }

    fn rescale_around_center(&mut self, old_zoom: f32) {
        let (cx, cy) = (self.win_w as f32 / 2.0, self.win_h as f32 / 2.0);
        self.x = cx - (cx - self.x) * self.zoom / old_zoom;
        self.y = cy - (cy - self.y) * self.zoom / old_zoom;
    }

    /// Set an explicit zoom, keeping the point under `anchor` (or the window
    /// center) fixed.
    pub fn zoom_to(&mut self, z: f32, anchor: Option<(i32, i32)>) -> bool {
        let z = z.clamp(zoom_min(), zoom_max());
        self.scalemode = ScaleMode::Zoom;
        if zoomdiff(z, self.zoom) == 0.0 {
            return false;
        }
        let (ax, ay) = match anchor {
            Some((x, y)) if x >= 0 && y >= 0 && (x as u32) < self.win_w && (y as u32) < self.win_h => {
                (x as f32, y as f32)
            }
            _ => (self.win_w as f32 / 2.0, self.win_h as f32 / 2.0),
        };
        self.x = ax - (ax - self.x) * z / self.zoom;
        self.y = ay - (ay - self.y) * z / self.zoom;
        self.zoom = z;
        self.checkpan = true;
        true
    }

    /// Step to the next configured zoom level in direction `d`.
    pub fn zoom_step(&mut self, d: i32, anchor: Option<(i32, i32)>) -> bool {
        let next = if d > 0 {
            ZOOM_LEVELS
                .iter()
                .map(|l| l / 100.0)
                .find(|&z| zoomdiff(z, self.zoom) > 0.0)
        } else if d < 0 {
            ZOOM_LEVELS
                .iter()
                .rev()
                .map(|l| l / 100.0)
                .find(|&z| zoomdiff(z, self.zoom) < 0.0)
        } else {
            None
        };
        match next {
            Some(z) => self.zoom_to(z, anchor),
            None => false,
        }
    }

    pub fn set_zoom_percent(&mut self, pct: u32, anchor: Option<(i32, i32)>) -> bool {
        self.zoom_to(pct as f32 / 100.0, anchor)
    }

    pub fn fit_to_window(&mut self, mode: ScaleMode) -> bool {
        let oz = self.zoom;
        self.scalemode = mode;
        if self.fit() {
            self.rescale_around_center(oz);
            self.checkpan = true;
            true
        } else {
            false
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32) -> bool {
        let (ox, oy) = (self.x, self.y);
        self.x = x;
        self.y = y;
        self.check_pan();
        ox != self.x || oy != self.y
    }

    pub fn move_by(&mut self, dx: f32, dy: f32) -> bool {
        self.set_position(self.x + dx, self.y + dy)
    }

    /// Pan the view. `d < 0` moves a whole window, `d == 0` a
    /// 1/PAN_FRACTION of it, `d > 0` that many image pixels.
    pub fn pan(&mut self, dir: Dir, d: i32) -> bool {
        let (dx, dy) = if d > 0 {
            let step = (d as f32 * self.zoom).max(1.0);
            (step, step)
        } else {
            let div = if d < 0 { 1 } else { PAN_FRACTION };
            ((self.win_w / div) as f32, (self.win_h / div) as f32)
        };
        match dir {
            Dir::Left => self.move_by(dx, 0.0),
            Dir::Right => self.move_by(-dx, 0.0),
            Dir::Up => self.move_by(0.0, dy),
            Dir::Down => self.move_by(0.0, -dy),
        }
    }

    pub fn pan_to_edge(&mut self, dir: Dir) -> bool {
        let (ox, oy) = (self.x, self.y);
        match dir {
            Dir::Left => self.x = 0.0,
            Dir::Right => self.x = self.win_w as f32 - self.w as f32 * self.zoom,
            Dir::Up => self.y = 0.0,
            Dir::Down => self.y = self.win_h as f32 - self.h as f32 * self.zoom,
        }
        self.check_pan();
        ox != self.x || oy != self.y
    }

    /// Follow the pointer while dragging. Absolute mode maps the central 80%
    /// of the window onto the whole image; relative mode moves the image by
    /// the pointer's travel since `last`.
    pub fn drag(&mut self, mode: DragMode, pos: (i32, i32), last: (i32, i32)) -> bool {
        let (x, y) = (pos.0 as f32, pos.1 as f32);
        let (px, py) = match mode {
            DragMode::Absolute => {
                let (ww, wh) = (self.win_w as f32, self.win_h as f32);
                (
                    (x - ww * 0.1).clamp(0.0, ww * 0.8) / (ww * 0.8) * (ww - self.w as f32 * self.zoom),
                    (y - wh * 0.1).clamp(0.0, wh * 0.8) / (wh * 0.8) * (wh - self.h as f32 * self.zoom),
                )
            }
            DragMode::Relative => (
                self.x + x - last.0 as f32,
                self.y + y - last.1 as f32,
            ),
        };
        self.set_position(px, py)
    }

    // -----------------------------------------------------------------------
    // Orientation and colour
    // -----------------------------------------------------------------------

    pub fn rotate(&mut self, d: Degree) {
        let turns = d.quarter_turns();
        self.orientation.rotation = (self.orientation.rotation + turns) % 4;
        if turns % 2 == 1 {
            let (ww, wh) = (self.win_w as f32, self.win_h as f32);
            let (w, h) = (self.w as f32 * self.zoom, self.h as f32 * self.zoom);
            let ox = if d == Degree::D90 { self.x } else { ww - self.x - w };
            let oy = if d == Degree::D270 { self.y } else { wh - self.y - h };
            self.x = oy + (ww - wh) / 2.0;
            self.y = ox + (wh - ww) / 2.0;
            std::mem::swap(&mut self.w, &mut self.h);
            self.checkpan = true;
        }
    }

    /// Flip the image as currently displayed.
    pub fn flip(&mut self, dir: FlipDir) {
        let horizontal_in_source = (dir == FlipDir::Horizontal) != self.orientation.swaps_axes();
        if horizontal_in_source {
            self.orientation.flip_h = !self.orientation.flip_h;
        } else {
            self.orientation.flip_v = !self.orientation.flip_v;
        }
    }

    pub fn toggle_antialias(&mut self) {
        self.aa = !self.aa;
    }

    pub fn toggle_alpha(&mut self) {
        self.alpha = !self.alpha;
    }

    /// `d == 0` resets; otherwise the level moves by `d`, clamped to the range.
    pub fn change_gamma(&mut self, d: i32) -> bool {
        let gamma = if d == 0 {
            0
        } else {
            (self.gamma + d).clamp(-GAMMA_RANGE, GAMMA_RANGE)
        };
        if gamma == self.gamma {
            return false;
        }
        self.gamma = gamma;
        self.lut = (gamma != 0).then(|| gamma_lut(gamma_multiplier(gamma)));
        true
    }

    // -----------------------------------------------------------------------
    // Multi-frame images
    // -----------------------------------------------------------------------

    fn frame_goto(&mut self, n: usize) -> bool {
        if n >= self.frame_count() || n == self.sel {
            return false;
        }
        self.sel = n;
        if let Some(f) = self.frame() {
            let (w, h) = self.orientation.display_size(f.width, f.height);
            self.w = w;
            self.h = h;
        }
        self.checkpan = true;
        true
    }

    /// Step `d` frames, wrapping around at either end.
    pub fn navigate_frame(&mut self, d: i32) -> bool {
        let cnt = self.frame_count() as i64;
        if cnt <= 1 || d == 0 {
            return false;
        }
        let n = (self.sel as i64 + d as i64).rem_euclid(cnt) as usize;
        self.frame_goto(n)
    }

    /// Timer tick: show the next frame and ask to be called again after its delay.
    pub fn animate(&mut self) -> Reschedule {
        if !self.animate || !self.is_multiframe() {
            return Reschedule::Done;
        }
        let next = (self.sel + 1) % self.frame_count();
        self.frame_goto(next);
        match self.frame_delay() {
            Some(d) => Reschedule::After(d),
            None => Reschedule::Done,
        }
    }

    pub fn toggle_animation(&mut self) -> bool {
        if !self.is_multiframe() {
            return false;
        }
        self.animate = !self.animate;
        self.animate
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    pub fn render(&mut self, canvas: &mut Canvas<'_>, bg: u32) {
        self.prepare();
        let Some(frame) = self.frame() else {
            return;
        };
        let blit = Blit {
            src: &frame.rgba_bytes,
            src_w: frame.width,
            src_h: frame.height,
            x: self.x,
            y: self.y,
            zoom: self.zoom,
            orientation: self.orientation,
            antialias: self.aa,
            checker: self.alpha,
            gamma: self.lut.as_ref(),
            bg,
        };
        canvas.blit(&blit, self.win_h);
    }
}
