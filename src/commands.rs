//! Command set and the declarative binding tables.

use std::io::Write;

use crate::app::App;
use crate::display::{CursorKind, Display};
use crate::error::Result;
use crate::input::{Axis, Button, Mods};
use crate::timers::TimerId;
use crate::ui::state::{Degree, Dir, DragMode, FlipDir, ScaleMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Image,
    Thumb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Available in both modes.
    Quit,
    SwitchMode,
    ToggleFullscreen,
    ToggleBar,
    PrefixExternal,
    First,
    NOrLast,
    ReloadImage,
    RemoveImage,
    ScrollScreen(Dir),
    Zoom(i32),
    ToggleImageMark,
    MarkRange,
    ReverseMarks,
    UnmarkAll,
    NavigateMarked(i32),
    ChangeGamma(i32),

    // Thumbnail grid.
    MoveSel(Dir),
    ReloadAll,
    ScrollThumbs { down: bool, screen: bool },

    // Single image.
    Navigate(i32),
    Alternate,
    NavigateFrame(i32),
    ToggleAnimation,
    Scroll(Dir),
    ScrollToEdge(Dir),
    SetZoom(u32),
    FitToWin(ScaleMode),
    Rotate(Degree),
    Flip(FlipDir),
    ToggleAntialias,
    ToggleAlpha,
    Slideshow,
    CursorNavigate,
    Drag(DragMode),
}

impl Command {
    /// The mode a command is restricted to, `None` for global ones.
    pub fn mode(self) -> Option<Mode> {
        use Command::*;
        match self {
            Quit | SwitchMode | ToggleFullscreen | ToggleBar | PrefixExternal | First
            | NOrLast | ReloadImage | RemoveImage | ScrollScreen(_) | Zoom(_)
            | ToggleImageMark | MarkRange | ReverseMarks | UnmarkAll | NavigateMarked(_)
            | ChangeGamma(_) => None,
            MoveSel(_) | ReloadAll | ScrollThumbs { .. } => Some(Mode::Thumb),
            _ => Some(Mode::Image),
        }
    }

    pub fn applies_to(self, mode: Mode) -> bool {
        self.mode().is_none_or(|m| m == mode)
    }
}

pub struct KeyBinding {
    pub mods: Mods,
    pub key: &'static str,
    pub cmd: Command,
}

pub struct ButtonBinding {
    pub mods: Mods,
    pub button: Button,
    pub cmd: Command,
}

pub struct ScrollBinding {
    pub mods: Mods,
    pub axis: Axis,
    /// -1 is up/left, +1 down/right.
    pub dir: i32,
    pub cmd: Command,
}

const fn key(mods: Mods, key: &'static str, cmd: Command) -> KeyBinding {
    KeyBinding { mods, key, cmd }
}

const NONE: Mods = Mods::NONE;
const CTRL: Mods = Mods::CONTROL;

/// Key bindings, searched in order; the first match wins.
pub static KEYS: &[KeyBinding] = &[
    key(NONE, "q", Command::Quit),
    key(NONE, "Return", Command::SwitchMode),
    key(NONE, "f", Command::ToggleFullscreen),
    key(NONE, "b", Command::ToggleBar),
    key(CTRL, "x", Command::PrefixExternal),
    key(NONE, "g", Command::First),
    key(NONE, "G", Command::NOrLast),
    key(NONE, "r", Command::ReloadImage),
    key(NONE, "D", Command::RemoveImage),
    key(CTRL, "h", Command::ScrollScreen(Dir::Left)),
    key(CTRL, "Left", Command::ScrollScreen(Dir::Left)),
    key(CTRL, "j", Command::ScrollScreen(Dir::Down)),
    key(CTRL, "Down", Command::ScrollScreen(Dir::Down)),
    key(CTRL, "k", Command::ScrollScreen(Dir::Up)),
    key(CTRL, "Up", Command::ScrollScreen(Dir::Up)),
    key(CTRL, "l", Command::ScrollScreen(Dir::Right)),
    key(CTRL, "Right", Command::ScrollScreen(Dir::Right)),
    key(NONE, "plus", Command::Zoom(1)),
    key(NONE, "KP_Add", Command::Zoom(1)),
    key(NONE, "minus", Command::Zoom(-1)),
    key(NONE, "KP_Subtract", Command::Zoom(-1)),
    key(NONE, "m", Command::ToggleImageMark),
    key(NONE, "M", Command::MarkRange),
    key(CTRL, "m", Command::ReverseMarks),
    key(CTRL, "u", Command::UnmarkAll),
    key(NONE, "N", Command::NavigateMarked(1)),
    key(NONE, "P", Command::NavigateMarked(-1)),
    key(NONE, "braceleft", Command::ChangeGamma(-1)),
    key(NONE, "braceright", Command::ChangeGamma(1)),
    key(CTRL, "g", Command::ChangeGamma(0)),
    key(NONE, "h", Command::MoveSel(Dir::Left)),
    key(NONE, "Left", Command::MoveSel(Dir::Left)),
    key(NONE, "j", Command::MoveSel(Dir::Down)),
    key(NONE, "Down", Command::MoveSel(Dir::Down)),
    key(NONE, "k", Command::MoveSel(Dir::Up)),
    key(NONE, "Up", Command::MoveSel(Dir::Up)),
    key(NONE, "l", Command::MoveSel(Dir::Right)),
    key(NONE, "Right", Command::MoveSel(Dir::Right)),
    key(NONE, "R", Command::ReloadAll),
    key(NONE, "n", Command::Navigate(1)),
    key(NONE, "space", Command::Navigate(1)),
    key(NONE, "p", Command::Navigate(-1)),
    key(NONE, "BackSpace", Command::Navigate(-1)),
    key(NONE, "bracketright", Command::Navigate(10)),
    key(NONE, "bracketleft", Command::Navigate(-10)),
    key(CTRL, "6", Command::Alternate),
    key(CTRL, "n", Command::NavigateFrame(1)),
    key(CTRL, "p", Command::NavigateFrame(-1)),
    key(CTRL, "space", Command::ToggleAnimation),
    key(NONE, "h", Command::Scroll(Dir::Left)),
    key(NONE, "Left", Command::Scroll(Dir::Left)),
    key(NONE, "j", Command::Scroll(Dir::Down)),
    key(NONE, "Down", Command::Scroll(Dir::Down)),
    key(NONE, "k", Command::Scroll(Dir::Up)),
    key(NONE, "Up", Command::Scroll(Dir::Up)),
    key(NONE, "l", Command::Scroll(Dir::Right)),
    key(NONE, "Right", Command::Scroll(Dir::Right)),
    key(NONE, "H", Command::ScrollToEdge(Dir::Left)),
    key(NONE, "J", Command::ScrollToEdge(Dir::Down)),
    key(NONE, "K", Command::ScrollToEdge(Dir::Up)),
    key(NONE, "L", Command::ScrollToEdge(Dir::Right)),
    key(NONE, "equal", Command::SetZoom(100)),
    key(NONE, "w", Command::FitToWin(ScaleMode::Down)),
    key(NONE, "W", Command::FitToWin(ScaleMode::Fit)),
    key(NONE, "e", Command::FitToWin(ScaleMode::Width)),
    key(NONE, "E", Command::FitToWin(ScaleMode::Height)),
    key(NONE, "less", Command::Rotate(Degree::D270)),
    key(NONE, "greater", Command::Rotate(Degree::D90)),
    key(NONE, "question", Command::Rotate(Degree::D180)),
    key(NONE, "bar", Command::Flip(FlipDir::Horizontal)),
    key(NONE, "underscore", Command::Flip(FlipDir::Vertical)),
    key(NONE, "a", Command::ToggleAntialias),
    key(NONE, "A", Command::ToggleAlpha),
    key(NONE, "s", Command::Slideshow),
];

/// Image-mode mouse buttons.
pub static BUTTONS: &[ButtonBinding] = &[
    ButtonBinding { mods: NONE, button: Button::Left, cmd: Command::CursorNavigate },
    ButtonBinding { mods: NONE, button: Button::Middle, cmd: Command::Drag(DragMode::Absolute) },
    ButtonBinding { mods: Mods::SHIFT, button: Button::Middle, cmd: Command::Drag(DragMode::Relative) },
    ButtonBinding { mods: NONE, button: Button::Right, cmd: Command::SwitchMode },
];

/// Image-mode wheel.
pub static SCROLLS: &[ScrollBinding] = &[
    ScrollBinding { mods: NONE, axis: Axis::Vertical, dir: 1, cmd: Command::Zoom(-1) },
    ScrollBinding { mods: NONE, axis: Axis::Vertical, dir: -1, cmd: Command::Zoom(1) },
];

impl<D: Display> App<D> {
    /// Run `cmd` with the numeric prefix typed before it. Returns whether the
    /// window needs a redraw.
    pub fn execute(&mut self, cmd: Command, prefix: u32) -> Result<bool> {
        log::debug!("command {:?} (prefix {})", cmd, prefix);
        let cnt = self.files.len();
        let image = self.mode == Mode::Image;
        let dirty = match cmd {
            Command::Quit => {
                if self.mark_output {
                    let mut out = std::io::stdout().lock();
                    for name in self.files.marked_names() {
                        // Nothing useful to do if stdout is gone.
                        let _ = writeln!(out, "{}", name);
                    }
                }
                self.quit = true;
                false
            }
            Command::SwitchMode => {
                self.switch_mode()?;
                true
            }
            Command::ToggleFullscreen => {
                let on = !self.display.is_fullscreen();
                self.display.set_fullscreen(on);
                false
            }
            Command::ToggleBar => {
                self.bar.visible = !self.bar.visible;
                if self.bar.visible {
                    self.open_info();
                } else {
                    self.close_info();
                }
                self.layout_changed();
                true
            }
            Command::PrefixExternal => false,
            Command::First => self.goto_file(0)?,
            Command::NOrLast => {
                let p = prefix as usize;
                let n = if p != 0 && p - 1 < cnt { p - 1 } else { cnt.saturating_sub(1) };
                self.goto_file(n)?
            }
            Command::ReloadImage => {
                if image {
                    self.load_image(self.files.fileidx)?;
                } else {
                    self.display.set_cursor(CursorKind::Watch);
                    let n = self.files.fileidx;
                    if !self.tns.load(&mut self.files, n, true, false) {
                        self.remove_file(n, false)?;
                    }
                    self.tns.dirty = true;
                }
                true
            }
            Command::RemoveImage => {
                self.remove_file(self.files.fileidx, true)?;
                if image {
                    let n = self.files.fileidx.min(self.files.len() - 1);
                    self.load_image(n)?;
                }
                true
            }
            Command::ScrollScreen(dir) => {
                if image {
                    self.view.pan(dir, -1)
                } else {
                    self.tns.scroll(&mut self.files, dir, true)
                }
            }
            Command::Zoom(d) => {
                if image {
                    self.view.zoom_step(d, None)
                } else {
                    self.tns.zoom(&mut self.files, d)
                }
            }
            Command::ToggleImageMark => {
                let n = self.files.fileidx;
                let on = !self.files.get(n).is_some_and(|e| e.flags.marked);
                self.mark_image(n, on)
            }
            Command::MarkRange => self.mark_range(),
            Command::ReverseMarks => {
                self.files.reverse_marks();
                true
            }
            Command::UnmarkAll => {
                self.files.unmark_all();
                true
            }
            Command::NavigateMarked(n) => self.navigate_marked(n, prefix)?,
            Command::ChangeGamma(d) => {
                let step = if prefix > 0 { prefix as i32 } else { 1 };
                self.view.change_gamma(d * step)
            }

            Command::MoveSel(dir) => {
                let count = if prefix > 0 { prefix as usize } else { 1 };
                self.tns.move_selection(&mut self.files, dir, count)
            }
            Command::ReloadAll => {
                self.tns.reset(&mut self.files);
                true
            }
            Command::ScrollThumbs { down, screen } => {
                let dir = if down { Dir::Down } else { Dir::Up };
                self.tns.scroll(&mut self.files, dir, screen)
            }

            Command::Navigate(n) => self.navigate(n, prefix)?,
            Command::Alternate => {
                self.load_image(self.files.alternate)?;
                true
            }
            Command::NavigateFrame(d) => {
                let d = if prefix > 0 { d * prefix as i32 } else { d };
                !self.view.animate && self.view.navigate_frame(d)
            }
            Command::ToggleAnimation => {
                if !self.view.is_multiframe() {
                    false
                } else {
                    match (self.view.toggle_animation(), self.view.frame_delay()) {
                        (true, Some(delay)) => self.timers.arm(TimerId::Animate, delay, true),
                        _ => self.timers.disarm(TimerId::Animate),
                    }
                    true
                }
            }
            Command::Scroll(dir) => self.view.pan(dir, prefix as i32),
            Command::ScrollToEdge(dir) => self.view.pan_to_edge(dir),
            Command::SetZoom(pct) => {
                let pct = if prefix > 0 { prefix } else { pct };
                self.view.set_zoom_percent(pct, None)
            }
            Command::FitToWin(mode) => self.view.fit_to_window(mode),
            Command::Rotate(d) => {
                self.view.rotate(d);
                true
            }
            Command::Flip(dir) => {
                self.view.flip(dir);
                true
            }
            Command::ToggleAntialias => {
                self.view.toggle_antialias();
                true
            }
            Command::ToggleAlpha => {
                self.view.toggle_alpha();
                true
            }
            Command::Slideshow => {
                if prefix > 0 {
                    self.view.ss.on = true;
                    self.view.ss.delay = prefix * 10;
                    self.timers.arm(TimerId::Slideshow, self.slideshow_delay(), true);
                } else if self.view.ss.on {
                    self.view.ss.on = false;
                    self.timers.disarm(TimerId::Slideshow);
                } else {
                    self.view.ss.on = true;
                    self.timers.arm(TimerId::Slideshow, self.slideshow_delay(), true);
                }
                true
            }
            Command::CursorNavigate => self.navigate(self.ptr_third_x() - 1, prefix)?,
            Command::Drag(mode) => self.start_drag(mode),
        };
        Ok(dirty)
    }

    fn switch_mode(&mut self) -> Result<()> {
        if self.mode == Mode::Image {
            self.view.close();
            self.timers.disarm(TimerId::Animate);
            if self.view.ss.on {
                self.view.ss.on = false;
                self.timers.disarm(TimerId::Slideshow);
            }
            self.tns.dirty = true;
            self.mode = Mode::Thumb;
            self.close_info();
        } else {
            self.mode = Mode::Image;
            self.load_image(self.files.fileidx)?;
        }
        self.input.reset();
        Ok(())
    }

    /// Jump to `n` in either mode.
    fn goto_file(&mut self, n: usize) -> Result<bool> {
        if n == self.files.fileidx || n >= self.files.len() {
            return Ok(false);
        }
        match self.mode {
            Mode::Image => self.load_image(n)?,
            Mode::Thumb => {
                self.files.fileidx = n;
                self.tns.dirty = true;
            }
        }
        Ok(true)
    }

    fn navigate(&mut self, n: i32, prefix: u32) -> Result<bool> {
        let n = if prefix > 0 { n as i64 * prefix as i64 } else { n as i64 };
        let last = self.files.len() as i64 - 1;
        let target = (self.files.fileidx as i64 + n).clamp(0, last.max(0)) as usize;
        if target == self.files.fileidx {
            return Ok(false);
        }
        self.load_image(target)?;
        Ok(true)
    }

    fn navigate_marked(&mut self, n: i32, prefix: u32) -> Result<bool> {
        let mut n = if prefix > 0 { n as i64 * prefix as i64 } else { n as i64 };
        let d: i64 = if n > 0 { 1 } else { -1 };
        let mut target = self.files.fileidx;
        let mut i = self.files.fileidx as i64 + d;
        while n != 0 && i >= 0 && (i as usize) < self.files.len() {
            if self.files.get(i as usize).is_some_and(|e| e.flags.marked) {
                n -= d;
                target = i as usize;
            }
            i += d;
        }
        self.goto_file(target)
    }

    fn mark_range(&mut self) -> bool {
        let (from, to) = (self.files.markidx, self.files.fileidx);
        let on = self.files.get(from).is_some_and(|e| e.flags.marked);
        let mut dirty = false;
        if from < to {
            for i in from + 1..=to {
                dirty |= self.mark_image(i, on);
            }
        } else {
            for i in (to..from).rev() {
                dirty |= self.mark_image(i, on);
            }
        }
        dirty
    }
}
