//! The window-system seam. The event loop only talks to a [`Display`]; the
//! winit/softbuffer backend lives in `ui`, tests use a headless one.

use std::os::fd::RawFd;

use crate::error::Result;
use crate::input::{Axis, Button, Mods};
use crate::ui::render::{self, Blit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Arrow,
    Drag,
    Watch,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// `sym` is the xkb-style name of the produced symbol, `unshifted` the
    /// symbol the same key gives without Shift.
    Key {
        sym: String,
        unshifted: String,
        mods: Mods,
        pressed: bool,
        is_modifier: bool,
    },
    Button {
        button: Button,
        pressed: bool,
        mods: Mods,
    },
    Motion {
        x: i32,
        y: i32,
    },
    Scroll {
        axis: Axis,
        /// Positive is down/right.
        value: f64,
        mods: Mods,
    },
    Resized {
        width: u32,
        height: u32,
    },
    RedrawRequested,
    CloseRequested,
}

pub trait Display {
    /// Drawable size in pixels.
    fn size(&self) -> (u32, u32);

    /// Descriptor that becomes readable when the display has events for us.
    fn fd(&self) -> Option<RawFd>;

    /// Process everything pending without blocking and append it to `out`.
    fn dispatch(&mut self, out: &mut Vec<DisplayEvent>) -> Result<()>;

    /// Draw a full frame and commit `damage` (the whole surface when `None`).
    fn render(&mut self, damage: Option<Rect>, draw: &mut dyn FnMut(&mut Canvas<'_>)) -> Result<()>;

    fn set_cursor(&mut self, cursor: CursorKind);
    fn set_title(&mut self, title: &str);
    fn set_fullscreen(&mut self, on: bool);
    fn is_fullscreen(&self) -> bool;

    /// Last known pointer position inside the window.
    fn cursor_pos(&self) -> Option<(i32, i32)>;
}

/// A borrowed 0x00RRGGBB framebuffer.
pub struct Canvas<'a> {
    buf: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(buf: &'a mut [u32], width: u32, height: u32) -> Self {
        debug_assert!(buf.len() >= (width * height) as usize);
        Self { buf, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn clear(&mut self, color: u32) {
        self.buf.fill(color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        render::fill_rect(self.buf, self.width, self.height, x, y, w, h, color);
    }

    pub fn draw_rect(&mut self, x: i32, y: i32, w: u32, h: u32, bw: u32, color: u32) {
        render::draw_rect(self.buf, self.width, self.height, x, y, w, h, bw, color);
    }

    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, max_x: i32, scale: u32, color: u32) -> i32 {
        render::draw_text(self.buf, self.width, self.height, text, x, y, max_x, scale, color)
    }

    /// Blit an image, clipped to the top `clip_h` rows.
    pub fn blit(&mut self, blit: &Blit<'_>, clip_h: u32) {
        blit.draw(self.buf, self.width, clip_h.min(self.height));
    }
}
