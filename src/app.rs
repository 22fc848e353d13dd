//! Application context and the event loop.

use std::time::{Duration, Instant};

use crate::commands::{Command, Mode};
use crate::config::{APP_NAME, DOUBLE_CLICK_MS, H_TEXT_PAD, RELOAD_DEBOUNCE_MS, V_TEXT_PAD};
use crate::display::{Canvas, CursorKind, Display, DisplayEvent};
use crate::error::Result;
use crate::files::FileList;
use crate::hooks::{InfoHook, KeyHandler, Reaper};
use crate::input::{Action, Button, KeyInput, Mods, Resolver};
use crate::reactor::{Reactor, Source};
use crate::thumbs::{ThumbCache, Work};
use crate::timers::{Reschedule, TimerId, Timers};
use crate::ui::render::{text_height, text_width};
use crate::ui::state::{DragMode, ImageView, ViewOptions};
use crate::watch::FileWatch;

/// Everything the loop needs besides the display and the file list.
pub struct Options {
    pub view: ViewOptions,
    pub mode: Mode,
    pub start: usize,
    pub show_bar: bool,
    pub bar_scale: u32,
    pub fg: u32,
    pub bg: u32,
    /// Print marked file names on quit.
    pub mark_output: bool,
    pub initial_delay: Duration,
    pub repeat_delay: Duration,
    pub info: InfoHook,
    pub keyhandler: KeyHandler,
    pub thumbs: ThumbCache,
    /// Reload the displayed image when it changes on disk.
    pub watch: bool,
}

pub struct Bar {
    pub visible: bool,
    scale: u32,
    left: String,
    right: String,
    /// Shown instead of the regular left field while set.
    status: Option<String>,
}

impl Bar {
    pub fn height(&self) -> u32 {
        if self.visible {
            text_height(self.scale) + 2 * V_TEXT_PAD
        } else {
            0
        }
    }

    fn draw(&self, canvas: &mut Canvas<'_>, y: i32, fg: u32, bg: u32) {
        if !self.visible {
            return;
        }
        let w = canvas.width() as i32;
        canvas.fill_rect(0, y, canvas.width(), self.height(), fg);
        let ty = y + V_TEXT_PAD as i32;
        let rw = text_width(&self.right, self.scale) as i32;
        let rx = (w - H_TEXT_PAD as i32 - rw).max(H_TEXT_PAD as i32);
        canvas.draw_text(&self.right, rx, ty, w, self.scale, bg);
        let left = self.status.as_deref().unwrap_or(&self.left);
        canvas.draw_text(left, H_TEXT_PAD as i32, ty, rx - H_TEXT_PAD as i32, self.scale, bg);
    }
}

#[derive(Debug, Default)]
struct Pointer {
    /// Active middle-button drag and the last pointer position.
    drag: Option<(DragMode, (i32, i32))>,
    /// Thumbnail last toggled by a right-button drag.
    prevsel: Option<usize>,
    firstclick: Option<Instant>,
}

fn digits(mut n: usize) -> usize {
    let mut d = 0;
    while n > 0 {
        d += 1;
        n /= 10;
    }
    d
}

pub struct App<D: Display> {
    // Dropped first: deregisters descriptors while their owners keep them open.
    pub(crate) reactor: Reactor,
    pub(crate) display: D,
    pub(crate) files: FileList,
    pub(crate) view: ImageView,
    pub(crate) tns: ThumbCache,
    pub(crate) mode: Mode,
    pub(crate) timers: Timers,
    pub(crate) input: Resolver,
    pub(crate) info: InfoHook,
    pub(crate) keyhandler: KeyHandler,
    pub(crate) reaper: Reaper,
    pub(crate) watch: Option<FileWatch>,
    pub(crate) bar: Bar,
    pub(crate) redraw: bool,
    pub(crate) quit: bool,
    pub(crate) mark_output: bool,
    fg: u32,
    bg: u32,
    pointer: Pointer,
    /// Index of the last loaded image, the source of `alternate`.
    current: usize,
    events: Vec<DisplayEvent>,
}

impl<D: Display> App<D> {
    pub fn new(display: D, files: FileList, opts: Options) -> Result<Self> {
        let mut reactor = Reactor::new()?;
        if let Some(fd) = display.fd() {
            reactor.register(Source::Display, fd)?;
        }
        let watch = if opts.watch {
            match FileWatch::new() {
                Ok(w) => {
                    reactor.register(Source::Watch, w.fd())?;
                    Some(w)
                }
                Err(e) => {
                    log::warn!("auto-reload disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut app = Self {
            display,
            files,
            view: ImageView::new(&opts.view),
            tns: opts.thumbs,
            mode: opts.mode,
            timers: Timers::new(),
            input: Resolver::new(opts.initial_delay, opts.repeat_delay),
            reactor,
            info: opts.info,
            keyhandler: opts.keyhandler,
            reaper: Reaper::default(),
            watch,
            bar: Bar {
                visible: opts.show_bar,
                scale: opts.bar_scale.max(1),
                left: String::new(),
                right: String::new(),
                status: None,
            },
            redraw: true,
            quit: false,
            mark_output: opts.mark_output,
            fg: opts.fg,
            bg: opts.bg,
            pointer: Pointer::default(),
            current: 0,
            events: Vec::new(),
        };
        let start = opts.start.min(app.files.len().saturating_sub(1));
        app.files.fileidx = start;
        app.current = start;
        app.update_view_size();
        match app.mode {
            Mode::Image => app.load_image(start)?,
            Mode::Thumb => {
                app.tns.dirty = true;
                app.display.set_title(APP_NAME);
            }
        }
        Ok(app)
    }

    /// Run until quit. `LastFileRemoved` comes back as an error.
    pub fn run(&mut self) -> Result<()> {
        while !self.quit {
            self.background_step()?;
            self.fire_timers()?;
            if self.quit {
                break;
            }
            if self.redraw {
                self.render()?;
            }
            let ready = self.reactor.wait(self.wait_bound())?;

            // winit may have queued events without the fd turning readable.
            self.dispatch_display()?;
            if ready.contains(Source::Info) && self.info.read(&mut self.reactor, &mut self.reaper) {
                self.redraw = true;
            }
            if ready.contains(Source::Watch) && self.watch.as_mut().is_some_and(|w| w.drain()) {
                self.timers
                    .arm(TimerId::Reload, Duration::from_millis(RELOAD_DEBOUNCE_MS), true);
            }
            self.reaper.reap();
        }
        log::debug!("leaving event loop");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loop stages
    // -----------------------------------------------------------------------

    /// One unit of thumbnail work: visible cells first, then the cache.
    pub(crate) fn background_step(&mut self) -> Result<()> {
        if self.mode != Mode::Thumb {
            return Ok(());
        }
        let (w, h) = self.area_size();
        self.tns.set_view(&mut self.files, w, h);
        if self.tns.loadnext < self.tns.end {
            if let Work::Failed(n) = self.tns.materialize_step(&mut self.files) {
                self.remove_file(n, false)?;
                self.tns.dirty = true;
            }
            self.redraw = true;
        } else if self.tns.initnext < self.files.len() {
            if let Work::Failed(n) = self.tns.hydrate_step(&mut self.files) {
                self.remove_file(n, false)?;
            }
            if self.tns.initnext >= self.files.len() {
                self.redraw = true;
            }
        }
        Ok(())
    }

    /// How long the reactor may block. Rendering can arm timers, so this
    /// is taken after `render`.
    pub(crate) fn wait_bound(&self) -> Option<Duration> {
        if self.mode == Mode::Thumb && self.tns.is_busy(self.files.len()) {
            return Some(Duration::ZERO);
        }
        self.timers.next_delay(Instant::now())
    }

    fn fire_timers(&mut self) -> Result<()> {
        let now = Instant::now();
        let mut fired = Vec::new();
        let mut animated = false;
        let view = &mut self.view;
        self.timers.poll_and_fire(now, |id, _| match id {
            TimerId::Animate => {
                let next = view.animate();
                animated |= next != Reschedule::Done;
                next
            }
            other => {
                fired.push(other);
                Reschedule::Done
            }
        });
        self.redraw |= animated;

        for id in fired {
            match id {
                TimerId::Slideshow => {
                    if self.mode == Mode::Image && self.view.ss.on {
                        let next = if self.files.fileidx + 1 < self.files.len() {
                            self.files.fileidx + 1
                        } else {
                            0
                        };
                        self.load_image(next)?;
                    }
                }
                TimerId::KeyRepeat => {
                    let action = self.input.repeat(self.mode, &mut self.timers);
                    self.handle_action(action)?;
                }
                TimerId::Reload => self.reload_changed()?,
                TimerId::Animate => {}
            }
        }
        Ok(())
    }

    fn dispatch_display(&mut self) -> Result<()> {
        let mut events = std::mem::take(&mut self.events);
        self.display.dispatch(&mut events)?;
        for ev in events.drain(..) {
            self.handle_event(ev)?;
            if self.quit {
                break;
            }
        }
        self.events = events;
        Ok(())
    }

    pub(crate) fn handle_event(&mut self, ev: DisplayEvent) -> Result<()> {
        match ev {
            DisplayEvent::Key {
                sym,
                unshifted,
                mods,
                pressed,
                is_modifier,
            } => {
                let input = KeyInput {
                    sym: &sym,
                    unshifted: &unshifted,
                    mods,
                    pressed,
                    is_modifier,
                };
                let action = self.input.key(input, self.mode, &mut self.timers);
                self.handle_action(action)?;
            }
            DisplayEvent::Button {
                button,
                pressed,
                mods,
            } => self.on_button(button, pressed, mods)?,
            DisplayEvent::Motion { x, y } => self.on_motion(x, y),
            DisplayEvent::Scroll { axis, value, mods } => {
                let action = self.input.scroll(axis, value, mods, self.mode);
                self.handle_action(action)?;
            }
            DisplayEvent::Resized { width, height } => {
                log::trace!("resized to {}x{}", width, height);
                self.layout_changed();
                self.redraw = true;
            }
            DisplayEvent::RedrawRequested => self.redraw = true,
            DisplayEvent::CloseRequested => self.quit = true,
        }
        Ok(())
    }

    fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::None => {}
            Action::Run { cmd, prefix } => {
                if self.execute(cmd, prefix)? {
                    self.redraw = true;
                }
            }
            Action::External(key) => self.run_key_handler(&key)?,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Files and images
    // -----------------------------------------------------------------------

    /// Show file `new`, dropping files that fail to load on the way.
    pub(crate) fn load_image(&mut self, new: usize) -> Result<()> {
        if new >= self.files.len() {
            return Ok(());
        }
        let prev = new < self.files.fileidx;
        let mut new = new;
        self.timers.disarm(TimerId::Slideshow);
        if new != self.current {
            self.files.alternate = self.current;
        }

        self.view.close();
        loop {
            let Some(entry) = self.files.get(new) else {
                return Ok(());
            };
            let path = entry.path.clone();
            let level = entry.flags.failure_level();
            match self.view.load(&path) {
                Ok(()) => break,
                Err(e) => {
                    log::log!(level, "{}", e);
                    self.remove_file(new, false)?;
                    if new >= self.files.len() {
                        new = self.files.len() - 1;
                    } else if new > 0 && prev {
                        new -= 1;
                    }
                }
            }
        }

        let Some(entry) = self.files.get_mut(new) else {
            return Ok(());
        };
        entry.flags.warn = false;
        let path = entry.path.clone();
        let title = format!("{} - {}", APP_NAME, entry.name);
        self.files.fileidx = new;
        self.current = new;

        self.close_info();
        self.open_info();
        if let Some(w) = self.watch.as_mut() {
            if let Err(e) = w.watch_file(&path) {
                log::debug!("not watching {:?}: {}", path, e);
            }
        }
        match self.view.frame_delay() {
            Some(delay) if self.view.is_multiframe() && self.view.animate => {
                self.timers.arm(TimerId::Animate, delay, true)
            }
            _ => self.timers.disarm(TimerId::Animate),
        }
        self.display.set_title(&title);
        self.redraw = true;
        Ok(())
    }

    /// Drop file `n` from the list and from every index that refers to it.
    pub(crate) fn remove_file(&mut self, n: usize, manual: bool) -> Result<()> {
        self.files.remove(n, manual)?;
        self.tns.removed(n);
        if self.current > n || self.current == self.files.len() {
            self.current -= 1;
        }
        Ok(())
    }

    pub(crate) fn mark_image(&mut self, n: usize, on: bool) -> bool {
        self.files.mark(n, on)
    }

    /// The displayed file changed on disk.
    fn reload_changed(&mut self) -> Result<()> {
        match self.mode {
            Mode::Image if self.view.is_loaded() => {
                self.load_image(self.files.fileidx)?;
            }
            Mode::Image => {}
            Mode::Thumb => {
                self.tns.unload(&mut self.files, self.current);
                self.redraw = true;
            }
        }
        Ok(())
    }

    pub(crate) fn open_info(&mut self) {
        if self.mode != Mode::Image || !self.bar.visible {
            return;
        }
        let Some(entry) = self.files.get(self.files.fileidx) else {
            return;
        };
        let (w, h) = self.view.source_size();
        if let Err(e) = self.info.open(&entry.name, w, h, &mut self.reactor) {
            log::warn!("info hook: {}", e);
        }
    }

    pub(crate) fn close_info(&mut self) {
        self.info.close(&mut self.reactor, &mut self.reaper);
    }

    fn run_key_handler(&mut self, key: &str) -> Result<()> {
        if !self.keyhandler.check() {
            return Ok(());
        }
        let marked = self.mode == Mode::Thumb && self.files.mark_count() > 0;
        let targets: Vec<usize> = if marked {
            (0..self.files.len())
                .filter(|&i| self.files.get(i).is_some_and(|e| e.flags.marked))
                .collect()
        } else {
            vec![self.files.fileidx]
        };

        self.close_info();
        self.bar.status = Some("Running key handler...".to_string());
        self.render()?;
        self.display.set_cursor(CursorKind::Watch);

        let entries: Vec<(&str, &std::path::Path)> = targets
            .iter()
            .filter_map(|&i| self.files.get(i))
            .map(|e| (e.name.as_str(), e.path.as_path()))
            .collect();
        let changed = self.keyhandler.run(key, entries)?;

        let mut any = false;
        for (&i, changed) in targets.iter().zip(changed) {
            if changed {
                self.tns.unload(&mut self.files, i);
                any = true;
            }
        }
        self.bar.status = None;
        if self.mode == Mode::Image {
            if any {
                self.load_image(self.files.fileidx)?;
            } else {
                self.open_info();
            }
        }
        self.reset_cursor();
        self.redraw = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pointer
    // -----------------------------------------------------------------------

    /// Which horizontal third of the window the pointer is in.
    pub(crate) fn ptr_third_x(&self) -> i32 {
        let (w, _) = self.display.size();
        match self.display.cursor_pos() {
            Some((x, _)) if w > 0 => ((x as f64 / (w as f64 * 0.33)) as i32).clamp(0, 2),
            _ => 1,
        }
    }

    pub(crate) fn start_drag(&mut self, mode: DragMode) -> bool {
        let pos = self.display.cursor_pos().unwrap_or((0, 0));
        self.pointer.drag = Some((mode, pos));
        self.display.set_cursor(CursorKind::Drag);
        mode == DragMode::Absolute && self.view.drag(mode, pos, pos)
    }

    fn on_button(&mut self, button: Button, pressed: bool, mods: Mods) -> Result<()> {
        if !pressed {
            self.pointer.prevsel = None;
            if button == Button::Middle && self.pointer.drag.take().is_some() {
                self.reset_cursor();
            }
            return Ok(());
        }
        match self.mode {
            Mode::Image => {
                self.reset_cursor();
                let action = self.input.button(button, mods, self.mode);
                self.handle_action(action)?;
            }
            Mode::Thumb => {
                let Some((x, y)) = self.display.cursor_pos() else {
                    return Ok(());
                };
                let Some(sel) = self.tns.translate(&self.files, x, y) else {
                    return Ok(());
                };
                match button {
                    Button::Left => {
                        let now = Instant::now();
                        let double = self
                            .pointer
                            .firstclick
                            .is_some_and(|t| now.duration_since(t) <= Duration::from_millis(DOUBLE_CLICK_MS));
                        if sel != self.files.fileidx {
                            self.files.fileidx = sel;
                            self.pointer.firstclick = Some(now);
                            self.redraw = true;
                        } else if double {
                            self.pointer.firstclick = None;
                            self.execute(Command::SwitchMode, 0)?;
                            self.redraw = true;
                        } else {
                            self.pointer.firstclick = Some(now);
                        }
                    }
                    Button::Right => {
                        let on = !self.files.get(sel).is_some_and(|e| e.flags.marked);
                        if self.mark_image(sel, on) {
                            self.redraw = true;
                        }
                        self.pointer.prevsel = Some(sel);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn on_motion(&mut self, x: i32, y: i32) {
        if let Some((mode, last)) = self.pointer.drag {
            if self.mode == Mode::Image && self.view.drag(mode, (x, y), last) {
                self.redraw = true;
            }
            self.pointer.drag = Some((mode, (x, y)));
            return;
        }
        self.reset_cursor();
        if self.mode != Mode::Thumb {
            return;
        }
        let Some(prev) = self.pointer.prevsel else {
            return;
        };
        if let Some(sel) = self.tns.translate(&self.files, x, y) {
            if sel != prev {
                self.pointer.prevsel = Some(sel);
                let on = !self.files.get(sel).is_some_and(|e| e.flags.marked);
                if self.mark_image(sel, on) {
                    self.redraw = true;
                }
            }
        }
    }

    fn reset_cursor(&mut self) {
        let cursor = match self.mode {
            Mode::Image if self.pointer.drag.is_some() => CursorKind::Drag,
            Mode::Image => {
                let lo = if self.files.fileidx > 0 { 0 } else { 1 };
                let hi = if self.files.fileidx + 1 < self.files.len() { 2 } else { 1 };
                match self.ptr_third_x().max(lo).min(hi) {
                    0 => CursorKind::Left,
                    2 => CursorKind::Right,
                    _ => CursorKind::Arrow,
                }
            }
            Mode::Thumb if self.tns.is_busy(self.files.len()) => CursorKind::Watch,
            Mode::Thumb => CursorKind::Arrow,
        };
        self.display.set_cursor(cursor);
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    /// Drawable area above the bar.
    fn area_size(&self) -> (u32, u32) {
        let (w, h) = self.display.size();
        (w, h.saturating_sub(self.bar.height()).max(1))
    }

    fn update_view_size(&mut self) {
        let (w, h) = self.area_size();
        self.view.set_window(w, h);
    }

    /// Window or bar geometry changed.
    pub(crate) fn layout_changed(&mut self) {
        self.update_view_size();
        self.view.checkpan = true;
        self.tns.dirty = true;
    }

    fn update_info(&mut self) {
        let cnt = self.files.len();
        let idx = self.files.fileidx;
        let fw = digits(cnt);
        let Some(entry) = self.files.get(idx) else {
            return;
        };
        let mark = if entry.flags.marked { "* " } else { "" };
        let sep = "  ";
        let mut right = String::from(mark);
        let left = match self.mode {
            Mode::Thumb => {
                right.push_str(&format!("{:0fw$}/{}", idx + 1, cnt));
                if self.tns.loadnext < self.tns.end {
                    format!("Loading... {:0fw$}", self.tns.loadnext + 1)
                } else if self.tns.initnext < cnt {
                    format!("Caching... {:0fw$}", self.tns.initnext + 1)
                } else {
                    entry.name.clone()
                }
            }
            Mode::Image => {
                if self.view.ss.on {
                    let d = self.view.ss.delay;
                    if d % 10 != 0 {
                        right.push_str(&format!("{:.1}s{sep}", d as f32 / 10.0));
                    } else {
                        right.push_str(&format!("{}s{sep}", d / 10));
                    }
                }
                if self.view.gamma != 0 {
                    right.push_str(&format!("G{:+}{sep}", self.view.gamma));
                }
                right.push_str(&format!("{:3}%{sep}", (self.view.zoom * 100.0) as i32));
                let frames = self.view.frame_count();
                if frames > 1 {
                    let fnw = digits(frames);
                    right.push_str(&format!("{:0fnw$}/{}{sep}", self.view.sel + 1, frames));
                }
                right.push_str(&format!("{:0fw$}/{}", idx + 1, cnt));
                if self.info.is_enabled() {
                    self.info.text()
                } else {
                    entry.name.clone()
                }
            }
        };
        self.bar.left = left;
        self.bar.right = right;
    }

    /// How long the slideshow stays on the current image.
    pub(crate) fn slideshow_delay(&self) -> Duration {
        let mut t = Duration::from_millis(self.view.ss.delay as u64 * 100);
        if self.view.is_multiframe() && self.view.animate {
            t = t.max(self.view.anim_length());
        }
        t
    }

    pub(crate) fn render(&mut self) -> Result<()> {
        self.redraw = false;
        let (w, area_h) = self.area_size();
        match self.mode {
            Mode::Image => self.view.set_window(w, area_h),
            Mode::Thumb => self.tns.set_view(&mut self.files, w, area_h),
        }
        self.update_info();
        self.reset_cursor();

        let Self {
            display,
            view,
            tns,
            files,
            bar,
            mode,
            fg,
            bg,
            ..
        } = self;
        let (fg, bg, mode) = (*fg, *bg, *mode);
        display.render(None, &mut |canvas: &mut Canvas<'_>| {
            canvas.clear(bg);
            match mode {
                Mode::Image => view.render(canvas, bg),
                Mode::Thumb => tns.render(files, canvas, area_h, fg, bg),
            }
            bar.draw(canvas, area_h as i32, fg, bg);
        })?;

        if self.mode == Mode::Image && self.view.ss.on && !self.timers.is_armed(TimerId::Slideshow) {
            let t = self.slideshow_delay();
            self.timers.arm(TimerId::Slideshow, t, true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::{AsRawFd, RawFd};
    use std::os::unix::net::UnixStream;
    use std::path::Path;

    use image::{Rgba, RgbaImage};

    use crate::display::Rect;
    use crate::error::Error;
    use crate::hooks::Hook;
    use crate::input::Axis;
    use crate::ui::state::Dir;

    /// Window-less display: replays scripted events and keeps its descriptor
    /// readable so the loop never blocks.
    struct Headless {
        size: (u32, u32),
        script: Vec<DisplayEvent>,
        frames: usize,
        cursor: Option<(i32, i32)>,
        last_cursor: Option<CursorKind>,
        fullscreen: bool,
        title: String,
        _tx: UnixStream,
        rx: UnixStream,
    }

    impl Headless {
        fn new(width: u32, height: u32) -> Self {
            let (mut tx, rx) = UnixStream::pair().unwrap();
            tx.write_all(b"x").unwrap();
            Self {
                size: (width, height),
                script: Vec::new(),
                frames: 0,
                cursor: None,
                last_cursor: None,
                fullscreen: false,
                title: String::new(),
                _tx: tx,
                rx,
            }
        }
    }

    impl Display for Headless {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn fd(&self) -> Option<RawFd> {
            Some(self.rx.as_raw_fd())
        }

        fn dispatch(&mut self, out: &mut Vec<DisplayEvent>) -> Result<()> {
            if !self.script.is_empty() {
                out.push(self.script.remove(0));
            }
            Ok(())
        }

        fn render(&mut self, _damage: Option<Rect>, draw: &mut dyn FnMut(&mut Canvas<'_>)) -> Result<()> {
            let (w, h) = self.size;
            let mut buf = vec![0u32; (w * h) as usize];
            draw(&mut Canvas::new(&mut buf, w, h));
            self.frames += 1;
            Ok(())
        }

        fn set_cursor(&mut self, cursor: CursorKind) {
            self.last_cursor = Some(cursor);
        }

        fn set_title(&mut self, title: &str) {
            self.title = title.to_string();
        }

        fn set_fullscreen(&mut self, on: bool) {
            self.fullscreen = on;
        }

        fn is_fullscreen(&self) -> bool {
            self.fullscreen
        }

        fn cursor_pos(&self) -> Option<(i32, i32)> {
            self.cursor
        }
    }

    fn write_png(dir: &Path, name: &str) {
        RgbaImage::from_pixel(40, 30, Rgba([200, 10, 10, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn list(dir: &Path) -> FileList {
        let mut files = FileList::new();
        files.scan_dir(dir, false).unwrap();
        files
    }

    fn options(dir: &Path, mode: Mode) -> Options {
        Options {
            view: ViewOptions::default(),
            mode,
            start: 0,
            show_bar: false,
            bar_scale: 1,
            fg: 0,
            bg: 0xffffff,
            mark_output: false,
            initial_delay: Duration::from_millis(600),
            repeat_delay: Duration::from_millis(40),
            info: InfoHook::new(Hook::disabled()),
            keyhandler: KeyHandler::new(Hook::disabled()),
            thumbs: ThumbCache::new(Some(dir.join(".cache")), false),
            watch: false,
        }
    }

    fn key(sym: &str) -> DisplayEvent {
        DisplayEvent::Key {
            sym: sym.to_string(),
            unshifted: sym.to_lowercase(),
            mods: if sym.chars().any(|c| c.is_uppercase()) { Mods::SHIFT } else { Mods::NONE },
            pressed: true,
            is_modifier: false,
        }
    }

    fn settle(app: &mut App<Headless>) {
        for _ in 0..100 {
            app.background_step().unwrap();
            if !app.tns.is_busy(app.files.len()) {
                return;
            }
        }
        panic!("thumbnails never settled");
    }

    #[test]
    fn unreadable_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["a.png", "b.png", "c.png"] {
            write_png(dir.path(), n);
        }
        std::fs::write(dir.path().join("d.png"), b"garbage").unwrap();
        let files = list(dir.path());
        assert_eq!(files.len(), 4);

        let mut app = App::new(Headless::new(800, 600), files, options(dir.path(), Mode::Thumb)).unwrap();
        settle(&mut app);
        assert_eq!(app.files.len(), 3);
        assert!(app.files.iter().all(|e| e.name != "d.png" && !e.name.ends_with("/d.png")));
    }

    #[test]
    fn given_unreadable_file_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        std::fs::write(dir.path().join("bad.png"), b"garbage").unwrap();
        let mut files = FileList::new();
        for n in ["bad.png", "a.png", "b.png"] {
            assert!(files.add_file(&dir.path().join(n).to_string_lossy(), true));
        }
        assert_eq!(files.get(0).unwrap().flags.failure_level(), log::Level::Warn);

        let app = App::new(Headless::new(200, 200), files, options(dir.path(), Mode::Image)).unwrap();
        assert_eq!(app.files.len(), 2);
        assert_eq!(app.files.fileidx, 0);
        assert!(app.files.get(0).unwrap().name.ends_with("a.png"));
        assert!(app.view.is_loaded());
        // A file that has been shown once is no longer reported.
        assert_eq!(app.files.get(0).unwrap().flags.failure_level(), log::Level::Debug);
        assert_eq!(app.files.get(1).unwrap().flags.failure_level(), log::Level::Warn);
    }

    #[test]
    fn scrolling_grid_materializes_one_new_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_png(dir.path(), &format!("{i}.png"));
        }
        // One column, four rows at the default 142 pixel cell.
        let mut app =
            App::new(Headless::new(150, 600), list(dir.path()), options(dir.path(), Mode::Thumb)).unwrap();
        settle(&mut app);
        assert_eq!((app.tns.first, app.tns.end), (0, 4));
        assert!(app.files.get(0).unwrap().thumb.is_some());
        assert!(app.files.get(4).unwrap().thumb.is_none());

        assert!(app.execute(Command::ScrollThumbs { down: true, screen: false }, 0).unwrap());
        let mut steps = 0;
        while app.tns.is_busy(app.files.len()) || steps == 0 {
            app.background_step().unwrap();
            steps += 1;
            assert!(steps < 10);
        }
        assert_eq!(steps, 1);
        assert_eq!((app.tns.first, app.tns.end), (1, 5));
        assert!(app.files.get(4).unwrap().thumb.is_some());
        assert!(app.files.get(0).unwrap().thumb.is_some());
    }

    #[test]
    fn navigation_and_alternate() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["a.png", "b.png", "c.png"] {
            write_png(dir.path(), n);
        }
        let mut app = App::new(Headless::new(200, 200), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        assert!(app.view.is_loaded());
        assert!(app.display.title.ends_with("a.png"));

        assert!(app.execute(Command::Navigate(1), 0).unwrap());
        assert_eq!(app.files.fileidx, 1);
        assert!(app.execute(Command::NOrLast, 0).unwrap());
        assert_eq!(app.files.fileidx, 2);
        assert!(app.execute(Command::Alternate, 0).unwrap());
        assert_eq!(app.files.fileidx, 1);
        assert!(app.execute(Command::First, 0).unwrap());
        assert_eq!(app.files.fileidx, 0);
        assert!(!app.execute(Command::Navigate(-1), 0).unwrap());
        assert!(app.execute(Command::Navigate(1), 2).unwrap());
        assert_eq!(app.files.fileidx, 2);
        assert!(app.execute(Command::NOrLast, 1).unwrap());
        assert_eq!(app.files.fileidx, 0);
    }

    #[test]
    fn broken_neighbour_is_skipped_when_navigating() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        std::fs::write(dir.path().join("b.png"), b"garbage").unwrap();
        write_png(dir.path(), "c.png");
        let mut app = App::new(Headless::new(200, 200), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        app.execute(Command::Navigate(1), 0).unwrap();
        assert_eq!(app.files.len(), 2);
        assert_eq!(app.files.current().unwrap().path.file_name().unwrap(), "c.png");
    }

    #[test]
    fn removing_last_file() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        let mut app = App::new(Headless::new(200, 200), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        match app.execute(Command::RemoveImage, 0) {
            Err(Error::LastFileRemoved { manual: true }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn only_broken_files_fail_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"garbage").unwrap();
        let files = list(dir.path());
        match App::new(Headless::new(200, 200), files, options(dir.path(), Mode::Image)) {
            Err(Error::LastFileRemoved { manual: false }) => {}
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("startup should fail"),
        }
    }

    #[test]
    fn marks_and_range() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_png(dir.path(), &format!("{i}.png"));
        }
        let mut app = App::new(Headless::new(800, 600), list(dir.path()), options(dir.path(), Mode::Thumb)).unwrap();
        app.execute(Command::ToggleImageMark, 0).unwrap();
        app.files.fileidx = 3;
        assert!(app.execute(Command::MarkRange, 0).unwrap());
        assert_eq!(app.files.mark_count(), 4);
        app.files.fileidx = 0;
        assert!(app.execute(Command::NavigateMarked(1), 2).unwrap());
        assert_eq!(app.files.fileidx, 2);
        app.execute(Command::ReverseMarks, 0).unwrap();
        assert_eq!(app.files.mark_count(), 1);
        app.execute(Command::UnmarkAll, 0).unwrap();
        assert_eq!(app.files.mark_count(), 0);
    }

    #[test]
    fn slideshow_prefix_sets_delay() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        let mut app = App::new(Headless::new(200, 200), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        app.execute(Command::Slideshow, 3).unwrap();
        assert!(app.view.ss.on);
        assert_eq!(app.view.ss.delay, 30);
        assert!(app.timers.is_armed(TimerId::Slideshow));
        app.execute(Command::Slideshow, 0).unwrap();
        assert!(!app.view.ss.on);
        assert!(!app.timers.is_armed(TimerId::Slideshow));
    }

    #[test]
    fn slideshow_bounds_the_reactor_wait() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        let mut opts = options(dir.path(), Mode::Image);
        opts.view = ViewOptions { slideshow: 10, ..ViewOptions::default() };
        let mut app = App::new(Headless::new(200, 200), list(dir.path()), opts).unwrap();

        // One loop turn up to the wait.
        app.background_step().unwrap();
        app.fire_timers().unwrap();
        app.render().unwrap();
        let bound = app.wait_bound().unwrap();
        assert!(bound <= Duration::from_secs(1));

        app.execute(Command::Slideshow, 0).unwrap();
        assert_eq!(app.wait_bound(), None);

        // Turning it back on without a count arms at once.
        app.execute(Command::Slideshow, 0).unwrap();
        assert!(app.view.ss.on);
        assert!(app.wait_bound().is_some());
    }

    #[test]
    fn bar_fields() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            write_png(dir.path(), &format!("{i:02}.png"));
        }
        let mut opts = options(dir.path(), Mode::Image);
        opts.show_bar = true;
        let mut app = App::new(Headless::new(400, 300), list(dir.path()), opts).unwrap();
        app.execute(Command::ToggleImageMark, 0).unwrap();
        app.execute(Command::ChangeGamma(1), 2).unwrap();
        app.render().unwrap();
        assert!(app.bar.left.ends_with("00.png"));
        assert_eq!(app.bar.right, "* G+2  100%  01/12");
    }

    #[test]
    fn switch_mode_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        let mut app = App::new(Headless::new(400, 300), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        app.execute(Command::Slideshow, 0).unwrap();
        app.execute(Command::SwitchMode, 0).unwrap();
        assert_eq!(app.mode, Mode::Thumb);
        assert!(!app.view.ss.on);
        assert!(!app.view.is_loaded());
        app.execute(Command::MoveSel(Dir::Right), 0).unwrap();
        app.execute(Command::SwitchMode, 0).unwrap();
        assert_eq!(app.mode, Mode::Image);
        assert_eq!(app.files.fileidx, 1);
        assert!(app.view.is_loaded());
    }

    #[test]
    fn loop_runs_scripted_keys_until_quit() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["a.png", "b.png", "c.png"] {
            write_png(dir.path(), n);
        }
        let mut display = Headless::new(300, 200);
        display.script = vec![key("n"), key("n"), key("p"), key("q")];
        let mut app = App::new(display, list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        app.run().unwrap();
        assert!(app.quit);
        assert_eq!(app.files.fileidx, 1);
        assert!(app.display.frames > 0);
    }

    #[test]
    fn close_request_stops_loop() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        let mut display = Headless::new(300, 200);
        display.script = vec![DisplayEvent::CloseRequested];
        let mut app = App::new(display, list(dir.path()), options(dir.path(), Mode::Thumb)).unwrap();
        app.run().unwrap();
        assert!(app.quit);
    }

    #[test]
    fn thumb_clicks_select_and_open() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write_png(dir.path(), &format!("{i}.png"));
        }
        let mut app = App::new(Headless::new(800, 600), list(dir.path()), options(dir.path(), Mode::Thumb)).unwrap();
        settle(&mut app);
        let dim = app.tns.dim() as i32;
        let (x, y) = (app.tns.x + dim + 2, app.tns.y + 2);
        app.display.cursor = Some((x, y));
        let click = |pressed| DisplayEvent::Button {
            button: Button::Left,
            pressed,
            mods: Mods::NONE,
        };
        app.handle_event(click(true)).unwrap();
        app.handle_event(click(false)).unwrap();
        assert_eq!(app.files.fileidx, 1);
        assert_eq!(app.mode, Mode::Thumb);
        app.handle_event(click(true)).unwrap();
        assert_eq!(app.mode, Mode::Image);
        assert!(app.view.is_loaded());

        app.execute(Command::SwitchMode, 0).unwrap();
        let right = DisplayEvent::Button {
            button: Button::Right,
            pressed: true,
            mods: Mods::NONE,
        };
        app.handle_event(right).unwrap();
        assert!(app.files.get(1).unwrap().flags.marked);
    }

    #[test]
    fn key_handler_receives_marked_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        for n in ["a.png", "b.png", "c.png"] {
            write_png(dir.path(), n);
        }
        let script = dir.path().join("key-handler");
        std::fs::write(&script, "#!/bin/sh\ncat > \"$(dirname \"$0\")/out-$1\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut opts = options(dir.path(), Mode::Thumb);
        opts.keyhandler = KeyHandler::new(Hook::at(script));
        let mut app = App::new(Headless::new(400, 300), list(dir.path()), opts).unwrap();
        app.mark_image(0, true);
        app.mark_image(2, true);
        app.run_key_handler("C-a").unwrap();

        let out = std::fs::read_to_string(dir.path().join("out-C-a")).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("a.png"));
        assert!(lines[1].ends_with("c.png"));
        assert!(app.bar.status.is_none());
    }

    #[test]
    fn wheel_zooms_image() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        let mut app = App::new(Headless::new(300, 200), list(dir.path()), options(dir.path(), Mode::Image)).unwrap();
        let z = app.view.zoom;
        app.handle_event(DisplayEvent::Scroll {
            axis: Axis::Vertical,
            value: -10.0,
            mods: Mods::NONE,
        })
        .unwrap();
        assert!(app.view.zoom > z);
    }
}
