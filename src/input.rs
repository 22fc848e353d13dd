//! Keyboard, button and wheel resolution against the binding tables.

use std::ops::BitOr;
use std::time::Duration;

use crate::commands::{Command, Mode, BUTTONS, KEYS, SCROLLS};
use crate::timers::{TimerId, Timers};

/// Modifier state, X11-style bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Mods(u32);

impl Mods {
    pub const NONE: Mods = Mods(0);
    pub const SHIFT: Mods = Mods(1);
    pub const CONTROL: Mods = Mods(1 << 2);
    pub const MOD1: Mods = Mods(1 << 3);

    const RELEVANT: u32 = Self::SHIFT.0 | Self::CONTROL.0 | Self::MOD1.0;

    pub fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn without(self, other: Mods) -> Mods {
        Mods(self.0 & !other.0)
    }

    /// Only the bits bindings care about.
    pub fn relevant(self) -> Mods {
        Mods(self.0 & Self::RELEVANT)
    }
}

impl BitOr for Mods {
    type Output = Mods;

    fn bitor(self, rhs: Mods) -> Mods {
        Mods(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Wheel travel needed before a scroll binding fires.
const SCROLL_THRESHOLD: f64 = 4.0;

/// A key press as reported by the display.
#[derive(Debug, Clone, Copy)]
pub struct KeyInput<'a> {
    pub sym: &'a str,
    pub unshifted: &'a str,
    pub mods: Mods,
    pub pressed: bool,
    pub is_modifier: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Run { cmd: Command, prefix: u32 },
    /// Forward a key to the key-handler hook, already modifier-prefixed.
    External(String),
}

/// Key-handler argument: `C-`, `M-` and `S-` prefixes followed by the symbol.
pub fn key_name(mods: Mods, sym: &str) -> String {
    let mut name = String::with_capacity(sym.len() + 6);
    if mods.contains(Mods::CONTROL) {
        name.push_str("C-");
    }
    if mods.contains(Mods::MOD1) {
        name.push_str("M-");
    }
    if mods.contains(Mods::SHIFT) {
        name.push_str("S-");
    }
    name.push_str(sym);
    name
}

/// xkb-style name for a character symbol.
pub fn symbol_name(c: char) -> String {
    let name = match c {
        ' ' => "space",
        '!' => "exclam",
        '"' => "quotedbl",
        '#' => "numbersign",
        '$' => "dollar",
        '%' => "percent",
        '&' => "ampersand",
        '\'' => "apostrophe",
        '(' => "parenleft",
        ')' => "parenright",
        '*' => "asterisk",
        '+' => "plus",
        ',' => "comma",
        '-' => "minus",
        '.' => "period",
        '/' => "slash",
        ':' => "colon",
        ';' => "semicolon",
        '<' => "less",
        '=' => "equal",
        '>' => "greater",
        '?' => "question",
        '@' => "at",
        '[' => "bracketleft",
        '\\' => "backslash",
        ']' => "bracketright",
        '^' => "asciicircum",
        '_' => "underscore",
        '`' => "grave",
        '{' => "braceleft",
        '|' => "bar",
        '}' => "braceright",
        '~' => "asciitilde",
        _ => return c.to_string(),
    };
    name.to_string()
}

#[derive(Debug, Clone)]
struct HeldKey {
    sym: String,
    sh: Mods,
    mods: Mods,
}

/// Input state machine: normal dispatch, numeric prefix accumulation and the
/// one-shot external prefix.
#[derive(Debug)]
pub struct Resolver {
    extprefix: bool,
    prefix: u32,
    scroll_accum: f64,
    held: Option<HeldKey>,
    initial_delay: Duration,
    repeat_delay: Duration,
}

impl Resolver {
    /// A zero `repeat_delay` disables key repeat.
    pub fn new(initial_delay: Duration, repeat_delay: Duration) -> Self {
        Self {
            extprefix: false,
            prefix: 0,
            scroll_accum: 0.0,
            held: None,
            initial_delay,
            repeat_delay,
        }
    }

    #[cfg(test)]
    pub fn in_external_prefix(&self) -> bool {
        self.extprefix
    }

    /// Drop any pending prefix state, e.g. on mode switch.
    pub fn reset(&mut self) {
        self.extprefix = false;
        self.prefix = 0;
    }

    fn lookup(sym: &str, sh: Mods, mods: Mods, mode: Mode) -> Option<Command> {
        KEYS.iter()
            .find(|b| {
                b.key == sym
                    && (b.mods | sh).relevant() == mods.relevant()
                    && b.cmd.applies_to(mode)
            })
            .map(|b| b.cmd)
    }

    pub fn key(&mut self, input: KeyInput<'_>, mode: Mode, timers: &mut Timers) -> Action {
        timers.disarm(TimerId::KeyRepeat);
        self.held = None;
        if !input.pressed || input.is_modifier {
            return Action::None;
        }

        let shift_changes_sym = input.sym != input.unshifted;
        if input.sym == "Escape" && input.mods.relevant() == Mods::NONE {
            self.reset();
            return Action::None;
        }
        if self.extprefix {
            self.extprefix = false;
            let sh = if shift_changes_sym { Mods::SHIFT } else { Mods::NONE };
            return Action::External(key_name(input.mods.without(sh).relevant(), input.sym));
        }
        if let Some(d) = single_digit(input.sym) {
            if !input.mods.contains(Mods::CONTROL) && !input.mods.contains(Mods::MOD1) {
                self.prefix = self.prefix.saturating_mul(10).saturating_add(d);
                return Action::None;
            }
        }

        // Shift never blocks a match: a symbol it changes already differs
        // from the unshifted binding.
        let sh = if input.mods.contains(Mods::SHIFT) { Mods::SHIFT } else { Mods::NONE };
        let prefix = std::mem::take(&mut self.prefix);
        let Some(cmd) = Self::lookup(input.sym, sh, input.mods, mode) else {
            log::trace!("unbound key {}", key_name(input.mods.relevant(), input.sym));
            return Action::None;
        };
        if cmd == Command::PrefixExternal {
            self.extprefix = true;
            return Action::None;
        }
        if !self.repeat_delay.is_zero() {
            self.held = Some(HeldKey {
                sym: input.sym.to_string(),
                sh,
                mods: input.mods,
            });
            timers.arm(TimerId::KeyRepeat, self.initial_delay, true);
        }
        Action::Run { cmd, prefix }
    }

    /// KeyRepeat timer tick: dispatch the held key again.
    pub fn repeat(&mut self, mode: Mode, timers: &mut Timers) -> Action {
        let Some(held) = &self.held else {
            return Action::None;
        };
        match Self::lookup(&held.sym, held.sh, held.mods, mode) {
            Some(cmd) => {
                timers.arm(TimerId::KeyRepeat, self.repeat_delay, true);
                Action::Run { cmd, prefix: 0 }
            }
            None => {
                self.held = None;
                Action::None
            }
        }
    }

    /// Image-mode button bindings. Thumbnail clicks need the grid and are
    /// handled by the caller.
    pub fn button(&mut self, button: Button, mods: Mods, mode: Mode) -> Action {
        if mode != Mode::Image {
            return Action::None;
        }
        BUTTONS
            .iter()
            .find(|b| b.button == button && b.mods.relevant() == mods.relevant() && b.cmd.applies_to(mode))
            .map(|b| Action::Run {
                cmd: b.cmd,
                prefix: std::mem::take(&mut self.prefix),
            })
            .unwrap_or(Action::None)
    }

    /// Accumulate wheel travel; fires once per threshold crossing.
    pub fn scroll(&mut self, axis: Axis, value: f64, mods: Mods, mode: Mode) -> Action {
        self.scroll_accum += value;
        if self.scroll_accum.abs() < SCROLL_THRESHOLD {
            return Action::None;
        }
        let dir = if self.scroll_accum < 0.0 { -1 } else { 1 };
        self.scroll_accum = 0.0;

        match mode {
            Mode::Thumb if axis == Axis::Vertical => Action::Run {
                cmd: Command::ScrollThumbs {
                    down: dir > 0,
                    screen: mods.contains(Mods::CONTROL),
                },
                prefix: 0,
            },
            Mode::Thumb => Action::None,
            Mode::Image => SCROLLS
                .iter()
                .find(|s| {
                    s.axis == axis
                        && s.dir == dir
                        && s.mods.relevant() == mods.relevant()
                        && s.cmd.applies_to(mode)
                })
                .map(|s| Action::Run {
                    cmd: s.cmd,
                    prefix: 0,
                })
                .unwrap_or(Action::None),
        }
    }
}

fn single_digit(sym: &str) -> Option<u32> {
    let mut chars = sym.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    c.to_digit(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::state::{Dir, DragMode};

    fn resolver() -> Resolver {
        Resolver::new(Duration::from_millis(600), Duration::from_millis(40))
    }

    fn press<'a>(sym: &'a str, unshifted: &'a str, mods: Mods) -> KeyInput<'a> {
        KeyInput {
            sym,
            unshifted,
            mods,
            pressed: true,
            is_modifier: false,
        }
    }

    fn run(cmd: Command, prefix: u32) -> Action {
        Action::Run { cmd, prefix }
    }

    #[test]
    fn plain_key_resolves_by_mode() {
        let mut r = resolver();
        let mut t = Timers::new();
        assert_eq!(
            r.key(press("h", "h", Mods::NONE), Mode::Image, &mut t),
            run(Command::Scroll(Dir::Left), 0)
        );
        assert_eq!(
            r.key(press("h", "h", Mods::NONE), Mode::Thumb, &mut t),
            run(Command::MoveSel(Dir::Left), 0)
        );
    }

    #[test]
    fn shifted_letter_needs_its_own_binding() {
        let mut r = resolver();
        let mut t = Timers::new();
        // Shift+g produces G, bound to n_or_last.
        assert_eq!(
            r.key(press("G", "g", Mods::SHIFT), Mode::Image, &mut t),
            run(Command::NOrLast, 0)
        );
        // Ctrl+Shift+g gives G, which has no Control binding.
        assert_eq!(
            r.key(press("G", "g", Mods::SHIFT | Mods::CONTROL), Mode::Image, &mut t),
            Action::None
        );
    }

    #[test]
    fn shift_is_absorbed_for_unshiftable_symbols() {
        let mut r = resolver();
        let mut t = Timers::new();
        // Ctrl+Shift+Left: Left has no distinct shifted form.
        assert_eq!(
            r.key(press("Left", "Left", Mods::SHIFT | Mods::CONTROL), Mode::Image, &mut t),
            run(Command::ScrollScreen(Dir::Left), 0)
        );
        // Shift+plus on layouts where '+' is itself shifted.
        assert_eq!(
            r.key(press("plus", "equal", Mods::SHIFT), Mode::Image, &mut t),
            run(Command::Zoom(1), 0)
        );
    }

    #[test]
    fn control_must_match_exactly() {
        let mut r = resolver();
        let mut t = Timers::new();
        assert_eq!(
            r.key(press("g", "g", Mods::CONTROL), Mode::Image, &mut t),
            run(Command::ChangeGamma(0), 0)
        );
        assert_eq!(
            r.key(press("q", "q", Mods::MOD1), Mode::Image, &mut t),
            Action::None
        );
    }

    #[test]
    fn digits_accumulate_prefix_until_dispatch() {
        let mut r = resolver();
        let mut t = Timers::new();
        assert_eq!(r.key(press("1", "1", Mods::NONE), Mode::Image, &mut t), Action::None);
        assert_eq!(r.key(press("2", "2", Mods::NONE), Mode::Image, &mut t), Action::None);
        assert_eq!(r.prefix, 12);
        assert_eq!(
            r.key(press("g", "g", Mods::NONE), Mode::Image, &mut t),
            run(Command::First, 12)
        );
        assert_eq!(r.prefix, 0);

        // An unbound key also clears it.
        r.key(press("3", "3", Mods::NONE), Mode::Image, &mut t);
        r.key(press("F7", "F7", Mods::NONE), Mode::Image, &mut t);
        assert_eq!(r.prefix, 0);
    }

    #[test]
    fn control_digit_is_a_binding_not_a_prefix() {
        let mut r = resolver();
        let mut t = Timers::new();
        assert_eq!(
            r.key(press("6", "6", Mods::CONTROL), Mode::Image, &mut t),
            run(Command::Alternate, 0)
        );

        // A pending count goes to the binding, or is dropped when none matches.
        r.key(press("2", "2", Mods::NONE), Mode::Image, &mut t);
        assert_eq!(
            r.key(press("6", "6", Mods::CONTROL), Mode::Image, &mut t),
            run(Command::Alternate, 2)
        );
        r.key(press("4", "4", Mods::NONE), Mode::Image, &mut t);
        assert_eq!(r.key(press("3", "3", Mods::MOD1), Mode::Image, &mut t), Action::None);
        assert_eq!(r.prefix, 0);
    }

    #[test]
    fn external_prefix_forwards_one_key() {
        let mut r = resolver();
        let mut t = Timers::new();
        assert_eq!(r.key(press("x", "x", Mods::CONTROL), Mode::Image, &mut t), Action::None);
        assert!(r.in_external_prefix());
        assert_eq!(
            r.key(press("X", "x", Mods::SHIFT | Mods::CONTROL), Mode::Image, &mut t),
            Action::External("C-X".to_string())
        );
        assert!(!r.in_external_prefix());

        r.key(press("x", "x", Mods::CONTROL), Mode::Image, &mut t);
        assert_eq!(
            r.key(press("Return", "Return", Mods::SHIFT | Mods::MOD1), Mode::Image, &mut t),
            Action::External("M-S-Return".to_string())
        );
    }

    #[test]
    fn escape_cancels_external_prefix() {
        let mut r = resolver();
        let mut t = Timers::new();
        r.key(press("x", "x", Mods::CONTROL), Mode::Image, &mut t);
        assert_eq!(r.key(press("Escape", "Escape", Mods::NONE), Mode::Image, &mut t), Action::None);
        assert!(!r.in_external_prefix());
        assert_eq!(
            r.key(press("q", "q", Mods::NONE), Mode::Image, &mut t),
            run(Command::Quit, 0)
        );
    }

    #[test]
    fn modifier_keys_and_releases_are_ignored() {
        let mut r = resolver();
        let mut t = Timers::new();
        let mut input = press("Shift_L", "Shift_L", Mods::SHIFT);
        input.is_modifier = true;
        assert_eq!(r.key(input, Mode::Image, &mut t), Action::None);
        let mut input = press("q", "q", Mods::NONE);
        input.pressed = false;
        assert_eq!(r.key(input, Mode::Image, &mut t), Action::None);
    }

    #[test]
    fn key_repeat_arms_and_cancels() {
        let mut r = resolver();
        let mut t = Timers::new();
        r.key(press("j", "j", Mods::NONE), Mode::Image, &mut t);
        assert!(t.is_armed(TimerId::KeyRepeat));
        t.disarm(TimerId::KeyRepeat);
        assert_eq!(r.repeat(Mode::Image, &mut t), run(Command::Scroll(Dir::Down), 0));
        assert!(t.is_armed(TimerId::KeyRepeat));

        let mut release = press("j", "j", Mods::NONE);
        release.pressed = false;
        r.key(release, Mode::Image, &mut t);
        assert!(!t.is_armed(TimerId::KeyRepeat));
        assert_eq!(r.repeat(Mode::Image, &mut t), Action::None);
    }

    #[test]
    fn zero_repeat_delay_disables_repeat() {
        let mut r = Resolver::new(Duration::from_millis(600), Duration::ZERO);
        let mut t = Timers::new();
        r.key(press("j", "j", Mods::NONE), Mode::Image, &mut t);
        assert!(!t.is_armed(TimerId::KeyRepeat));
    }

    #[test]
    fn wheel_accumulates_to_threshold() {
        let mut r = resolver();
        assert_eq!(r.scroll(Axis::Vertical, 2.0, Mods::NONE, Mode::Image), Action::None);
        assert_eq!(
            r.scroll(Axis::Vertical, 2.0, Mods::NONE, Mode::Image),
            run(Command::Zoom(-1), 0)
        );
        assert_eq!(
            r.scroll(Axis::Vertical, -10.0, Mods::NONE, Mode::Image),
            run(Command::Zoom(1), 0)
        );
        assert_eq!(r.scroll(Axis::Horizontal, 10.0, Mods::NONE, Mode::Image), Action::None);
    }

    #[test]
    fn wheel_scrolls_thumbnails() {
        let mut r = resolver();
        assert_eq!(
            r.scroll(Axis::Vertical, 5.0, Mods::CONTROL, Mode::Thumb),
            run(Command::ScrollThumbs { down: true, screen: true }, 0)
        );
        assert_eq!(
            r.scroll(Axis::Vertical, -5.0, Mods::NONE, Mode::Thumb),
            run(Command::ScrollThumbs { down: false, screen: false }, 0)
        );
    }

    #[test]
    fn buttons_only_in_image_mode() {
        let mut r = resolver();
        assert_eq!(
            r.button(Button::Right, Mods::NONE, Mode::Image),
            run(Command::SwitchMode, 0)
        );
        assert_eq!(r.button(Button::Right, Mods::NONE, Mode::Thumb), Action::None);
        assert_eq!(r.button(Button::Left, Mods::CONTROL, Mode::Image), Action::None);
        assert_eq!(
            r.button(Button::Middle, Mods::NONE, Mode::Image),
            run(Command::Drag(DragMode::Absolute), 0)
        );
        assert_eq!(
            r.button(Button::Middle, Mods::SHIFT, Mode::Image),
            run(Command::Drag(DragMode::Relative), 0)
        );
    }

    #[test]
    fn names() {
        assert_eq!(key_name(Mods::CONTROL | Mods::MOD1 | Mods::SHIFT, "x"), "C-M-S-x");
        assert_eq!(key_name(Mods::NONE, "space"), "space");
        assert_eq!(symbol_name('+'), "plus");
        assert_eq!(symbol_name('a'), "a");
        assert_eq!(symbol_name('{'), "braceleft");
    }
}
