//! winit + softbuffer backend for [`Display`].
//!
//! The event loop is never run; it is pumped without blocking whenever the
//! reactor says its descriptor is readable, and after every wait.

use std::num::NonZeroU32;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use softbuffer::Surface;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, KeyLocation, NamedKey};
use winit::platform::modifier_supplement::KeyEventExtModifierSupplement;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::platform::wayland::WindowAttributesExtWayland;
use winit::platform::x11::WindowAttributesExtX11;
use winit::window::{CursorIcon, Fullscreen, Window, WindowAttributes, WindowId};

use crate::display::{Canvas, CursorKind, Display, DisplayEvent, Rect};
use crate::error::{Error, Result};
use crate::input::{symbol_name, Axis, Button, Mods};

pub mod render;
pub mod state;

/// Wheel units per line step, matching what pixel-precise devices report.
const LINE_STEP: f64 = 10.0;

/// Window setup taken from the command line.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub title: String,
    /// Window class (X11) / app id (Wayland).
    pub class: String,
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

struct Handler {
    attrs: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    context: Option<softbuffer::Context<Arc<Window>>>,
    surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    surface_size: (u32, u32),
    size: (u32, u32),
    events: Vec<DisplayEvent>,
    modifiers: Mods,
    cursor_pos: Option<(i32, i32)>,
    error: Option<String>,
}

impl Handler {
    fn create_window(&mut self, event_loop: &ActiveEventLoop, attrs: WindowAttributes) -> std::result::Result<(), String> {
        let window = Arc::new(event_loop.create_window(attrs).map_err(|e| e.to_string())?);
        let context = softbuffer::Context::new(Arc::clone(&window)).map_err(|e| e.to_string())?;
        let surface = Surface::new(&context, Arc::clone(&window)).map_err(|e| e.to_string())?;
        let PhysicalSize { width, height } = window.inner_size();
        self.size = (width.max(1), height.max(1));
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
        Ok(())
    }

    fn key_event(&mut self, event: &KeyEvent) {
        let Some(sym) = key_sym(&event.logical_key, event.location) else {
            return;
        };
        let unshifted = key_sym(&event.key_without_modifiers(), event.location).unwrap_or_else(|| sym.clone());
        // Held keys repeat through our own timer.
        if event.repeat {
            return;
        }
        self.events.push(DisplayEvent::Key {
            is_modifier: is_modifier(&event.logical_key),
            sym,
            unshifted,
            mods: self.modifiers,
            pressed: event.state == ElementState::Pressed,
        });
    }
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(attrs) = self.attrs.take() else {
            return;
        };
        if let Err(e) = self.create_window(event_loop, attrs) {
            self.error = Some(e);
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.events.push(DisplayEvent::CloseRequested),

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let size = (width.max(1), height.max(1));
                if size != self.size {
                    self.size = size;
                    self.events.push(DisplayEvent::Resized {
                        width: size.0,
                        height: size.1,
                    });
                }
            }

            WindowEvent::ModifiersChanged(m) => {
                let state = m.state();
                let mut mods = Mods::NONE;
                if state.shift_key() {
                    mods = mods | Mods::SHIFT;
                }
                if state.control_key() {
                    mods = mods | Mods::CONTROL;
                }
                if state.alt_key() {
                    mods = mods | Mods::MOD1;
                }
                self.modifiers = mods;
            }

            WindowEvent::KeyboardInput { event, .. } => self.key_event(&event),

            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => Button::Left,
                    MouseButton::Middle => Button::Middle,
                    MouseButton::Right => Button::Right,
                    MouseButton::Back => Button::Other(8),
                    MouseButton::Forward => Button::Other(9),
                    MouseButton::Other(n) => Button::Other(n),
                };
                self.events.push(DisplayEvent::Button {
                    button,
                    pressed: state == ElementState::Pressed,
                    mods: self.modifiers,
                });
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                let pos = (x as i32, y as i32);
                self.cursor_pos = Some(pos);
                self.events.push(DisplayEvent::Motion { x: pos.0, y: pos.1 });
            }

            WindowEvent::CursorLeft { .. } => self.cursor_pos = None,

            WindowEvent::MouseWheel { delta, .. } => {
                // winit reports content motion; positive values here mean
                // scrolling down/right.
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (-x as f64 * LINE_STEP, -y as f64 * LINE_STEP),
                    MouseScrollDelta::PixelDelta(PhysicalPosition { x, y }) => (-x, -y),
                };
                for (axis, value) in [(Axis::Vertical, dy), (Axis::Horizontal, dx)] {
                    if value != 0.0 {
                        self.events.push(DisplayEvent::Scroll {
                            axis,
                            value,
                            mods: self.modifiers,
                        });
                    }
                }
            }

            WindowEvent::RedrawRequested => self.events.push(DisplayEvent::RedrawRequested),

            _ => {}
        }
    }
}

fn is_modifier(key: &Key) -> bool {
    matches!(
        key,
        Key::Named(
            NamedKey::Shift
                | NamedKey::Control
                | NamedKey::Alt
                | NamedKey::AltGraph
                | NamedKey::Super
                | NamedKey::Meta
                | NamedKey::Hyper
                | NamedKey::CapsLock
                | NamedKey::NumLock
                | NamedKey::ScrollLock
                | NamedKey::Fn
                | NamedKey::FnLock
                | NamedKey::Symbol
                | NamedKey::SymbolLock
        )
    )
}

/// xkb-style name of a logical key.
fn key_sym(key: &Key, location: KeyLocation) -> Option<String> {
    match key {
        Key::Character(s) => {
            let mut chars = s.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return Some(s.to_string());
            }
            if location == KeyLocation::Numpad {
                match c {
                    '+' => return Some("KP_Add".to_string()),
                    '-' => return Some("KP_Subtract".to_string()),
                    '*' => return Some("KP_Multiply".to_string()),
                    '/' => return Some("KP_Divide".to_string()),
                    _ => {}
                }
            }
            Some(symbol_name(c))
        }
        Key::Named(named) => {
            let name = match named {
                NamedKey::Space => "space",
                NamedKey::Enter => "Return",
                NamedKey::Escape => "Escape",
                NamedKey::Tab => "Tab",
                NamedKey::Backspace => "BackSpace",
                NamedKey::Delete => "Delete",
                NamedKey::Insert => "Insert",
                NamedKey::Home => "Home",
                NamedKey::End => "End",
                NamedKey::PageUp => "Prior",
                NamedKey::PageDown => "Next",
                NamedKey::ArrowLeft => "Left",
                NamedKey::ArrowRight => "Right",
                NamedKey::ArrowUp => "Up",
                NamedKey::ArrowDown => "Down",
                NamedKey::Shift => "Shift_L",
                NamedKey::Control => "Control_L",
                NamedKey::Alt => "Alt_L",
                NamedKey::Super => "Super_L",
                other => return Some(format!("{:?}", other)),
            };
            Some(name.to_string())
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Display implementation
// ---------------------------------------------------------------------------

pub struct WinitDisplay {
    event_loop: EventLoop<()>,
    handler: Handler,
}

impl WinitDisplay {
    pub fn new(opts: &WindowOptions) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::Display(e.to_string()))?;
        let mut attrs = Window::default_attributes()
            .with_title(opts.title.clone())
            .with_inner_size(PhysicalSize::new(opts.width.max(1), opts.height.max(1)));
        attrs = WindowAttributesExtWayland::with_name(attrs, opts.class.clone(), opts.class.clone());
        attrs = WindowAttributesExtX11::with_name(attrs, opts.class.clone(), opts.class.clone());
        if opts.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut display = Self {
            event_loop,
            handler: Handler {
                attrs: Some(attrs),
                window: None,
                context: None,
                surface: None,
                surface_size: (0, 0),
                size: (opts.width.max(1), opts.height.max(1)),
                events: Vec::new(),
                modifiers: Mods::NONE,
                cursor_pos: None,
                error: None,
            },
        };
        // The window only exists once the loop delivered `resumed`.
        while display.handler.window.is_none() {
            display.pump(Some(Duration::from_millis(10)))?;
        }
        log::debug!("window created, {}x{}", display.handler.size.0, display.handler.size.1);
        Ok(display)
    }

    fn pump(&mut self, timeout: Option<Duration>) -> Result<()> {
        let status = self.event_loop.pump_app_events(timeout, &mut self.handler);
        if let Some(e) = self.handler.error.take() {
            return Err(Error::Display(e));
        }
        if let PumpStatus::Exit(code) = status {
            return Err(Error::Display(format!("event loop exited ({})", code)));
        }
        Ok(())
    }
}

impl Display for WinitDisplay {
    fn size(&self) -> (u32, u32) {
        self.handler.size
    }

    fn fd(&self) -> Option<RawFd> {
        Some(self.event_loop.as_raw_fd())
    }

    fn dispatch(&mut self, out: &mut Vec<DisplayEvent>) -> Result<()> {
        self.pump(Some(Duration::ZERO))?;
        out.append(&mut self.handler.events);
        Ok(())
    }

    fn render(&mut self, damage: Option<Rect>, draw: &mut dyn FnMut(&mut Canvas<'_>)) -> Result<()> {
        let (width, height) = self.handler.size;
        let Some(surface) = self.handler.surface.as_mut() else {
            return Ok(());
        };
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return Ok(());
        };
        if self.handler.surface_size != (width, height) {
            surface.resize(w, h).map_err(|e| Error::Display(e.to_string()))?;
            self.handler.surface_size = (width, height);
        }
        let mut buffer = surface.buffer_mut().map_err(|e| Error::Display(e.to_string()))?;
        {
            let mut canvas = Canvas::new(&mut buffer, width, height);
            draw(&mut canvas);
        }
        let damage = damage.and_then(|r| {
            Some(softbuffer::Rect {
                x: r.x,
                y: r.y,
                width: NonZeroU32::new(r.width)?,
                height: NonZeroU32::new(r.height)?,
            })
        });
        let presented = match damage {
            Some(rect) => buffer.present_with_damage(&[rect]),
            None => buffer.present(),
        };
        presented.map_err(|e| Error::Display(e.to_string()))
    }

    fn set_cursor(&mut self, cursor: CursorKind) {
        let Some(window) = &self.handler.window else {
            return;
        };
        let icon = match cursor {
            CursorKind::Arrow => CursorIcon::Default,
            CursorKind::Drag => CursorIcon::Grabbing,
            CursorKind::Watch => CursorIcon::Wait,
            CursorKind::Left => CursorIcon::WResize,
            CursorKind::Right => CursorIcon::EResize,
        };
        window.set_cursor(icon);
    }

    fn set_title(&mut self, title: &str) {
        if let Some(window) = &self.handler.window {
            window.set_title(title);
        }
    }

    fn set_fullscreen(&mut self, on: bool) {
        if let Some(window) = &self.handler.window {
            window.set_fullscreen(on.then_some(Fullscreen::Borderless(None)));
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.handler
            .window
            .as_ref()
            .is_some_and(|w| w.fullscreen().is_some())
    }

    fn cursor_pos(&self) -> Option<(i32, i32)> {
        self.handler.cursor_pos
    }
}
