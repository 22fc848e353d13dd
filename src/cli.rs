use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{BG_COLOR, FG_COLOR, WIN_HEIGHT, WIN_WIDTH};
use crate::ui::render::rgb;
use crate::ui::state::ScaleMode;

pub const HELP_KEYS: &str = "\
Key Bindings (both modes):
  q             : Quit (prints marked files with -o)
  Return        : Switch between image and thumbnail mode
  f             : Toggle fullscreen
  b             : Toggle the bar
  Ctrl-x KEY    : Run the key-handler hook with KEY
  g / G         : First / last image (G with count: image N)
  r             : Reload image
  D             : Remove image from the list
  Ctrl-h/j/k/l  : Scroll one screen
  + / -         : Zoom in / out
  m / M         : Mark image / mark range
  Ctrl-m / Ctrl-u : Reverse marks / unmark all
  N / P         : Next / previous marked image
  { / } / Ctrl-g: Gamma down / up / reset

Image mode:
  n / p / Space / BackSpace : Next / previous image
  [ / ]         : Jump 10 images back / forward
  Ctrl-6        : Alternate image
  Ctrl-n / Ctrl-p : Next / previous frame
  Ctrl-Space    : Toggle animation
  h/j/k/l       : Pan (count: pixels)
  H/J/K/L       : Pan to edge
  = / w / W / e / E : 100% (count: percent) / fit / fit and enlarge / fit width / fit height
  < / > / ?     : Rotate 270 / 90 / 180
  | / _         : Flip horizontally / vertically
  a / A         : Toggle antialias / alpha checkerboard
  s             : Toggle slideshow (count: delay in seconds)
  Left click    : Previous / next image by window third
  Middle drag   : Pan (Shift: move with the pointer)
  Right click   : Thumbnail mode
  Wheel         : Zoom

Thumbnail mode:
  h/j/k/l, arrows : Move selection
  R             : Reload all thumbnails
  Wheel         : Scroll (Ctrl: one screen)
  Left click    : Select, double click opens
  Right click   : Mark, drag to mark more
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scale {
    /// Fit, never enlarge
    #[value(alias = "d")]
    Shrink,
    #[value(alias = "f")]
    Fit,
    #[value(alias = "w")]
    Width,
    #[value(alias = "h")]
    Height,
}

impl From<Scale> for ScaleMode {
    fn from(s: Scale) -> Self {
        match s {
            Scale::Shrink => ScaleMode::Down,
            Scale::Fit => ScaleMode::Fit,
            Scale::Width => ScaleMode::Width,
            Scale::Height => ScaleMode::Height,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ivy", version, about = "A simple image viewer", after_help = HELP_KEYS)]
pub struct Cli {
    /// Files or directories to view; `-` reads names from stdin
    pub paths: Vec<PathBuf>,

    /// Read file names from stdin, one per line
    #[arg(short = 'i')]
    pub stdin: bool,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Start a slideshow with this delay in seconds (tenths precision)
    #[arg(short = 'S', value_name = "SECONDS", value_parser = parse_delay)]
    pub slideshow: Option<u32>,

    /// Scale mode
    #[arg(short = 's', value_name = "MODE")]
    pub scale: Option<Scale>,

    /// Initial zoom in percent
    #[arg(short = 'z', value_name = "PERCENT")]
    pub zoom: Option<f32>,

    /// Start at 100% zoom
    #[arg(short = 'Z')]
    pub zoom_100: bool,

    /// Play animations with this frame rate (implies -a)
    #[arg(short = 'A', value_name = "FRAMERATE", value_parser = clap::value_parser!(u32).range(1..))]
    pub framerate: Option<u32>,

    /// Play animations
    #[arg(short = 'a')]
    pub animate: bool,

    /// Initial gamma level
    #[arg(short = 'G', value_name = "GAMMA", allow_hyphen_values = true)]
    pub gamma: Option<i32>,

    /// Index (1-based) of the first image to show
    #[arg(short = 'n', value_name = "NUM")]
    pub start: Option<usize>,

    /// Start in thumbnail mode
    #[arg(short = 't')]
    pub thumbnails: bool,

    /// Remove the thumbnail cache and exit
    #[arg(short = 'c')]
    pub clean_cache: bool,

    /// Window size
    #[arg(short = 'g', value_name = "WxH", value_parser = parse_geometry)]
    pub geometry: Option<(u32, u32)>,

    /// Start in fullscreen
    #[arg(short = 'f')]
    pub fullscreen: bool,

    /// Hide the bar
    #[arg(short = 'b')]
    pub hide_bar: bool,

    /// Background color (#RRGGBB)
    #[arg(short = 'B', value_name = "COLOR", value_parser = parse_color)]
    pub bg: Option<u32>,

    /// Foreground color (#RRGGBB)
    #[arg(short = 'C', value_name = "COLOR", value_parser = parse_color)]
    pub fg: Option<u32>,

    /// Window class / application id
    #[arg(short = 'N', value_name = "NAME")]
    pub class: Option<String>,

    /// Bar font scale
    #[arg(short = 'F', value_name = "SCALE", default_value = "1", value_parser = clap::value_parser!(u32).range(1..=8))]
    pub font_scale: u32,

    /// Don't write thumbnails to the disk cache
    #[arg(short = 'p')]
    pub private: bool,

    /// Print the names of marked files on quit
    #[arg(short = 'o')]
    pub mark_output: bool,

    /// Only report errors
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Initial delay in ms before key-hold repeat begins
    #[arg(long, default_value = "600")]
    pub initial_delay: u64,

    /// Key-hold repeat interval in ms; 0 disables repeat
    #[arg(long, default_value = "40")]
    pub repeat_delay: u64,
}

impl Cli {
    pub fn scale_mode(&self) -> ScaleMode {
        if self.zoom.is_some() || self.zoom_100 {
            ScaleMode::Zoom
        } else {
            self.scale.map(ScaleMode::from).unwrap_or(ScaleMode::Down)
        }
    }

    pub fn zoom_factor(&self) -> f32 {
        match self.zoom {
            _ if self.zoom_100 => 1.0,
            Some(pct) => pct / 100.0,
            None => 1.0,
        }
    }

    /// Forced frame delay in ms from `-A`.
    pub fn frame_delay(&self) -> Option<u32> {
        self.framerate.map(|fps| (1000 / fps).max(1))
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.geometry.unwrap_or((WIN_WIDTH, WIN_HEIGHT))
    }

    pub fn colors(&self) -> (u32, u32) {
        let [r, g, b] = FG_COLOR;
        let fg = self.fg.unwrap_or(rgb(r, g, b));
        let [r, g, b] = BG_COLOR;
        let bg = self.bg.unwrap_or(rgb(r, g, b));
        (fg, bg)
    }

    /// `-` among the paths means the same as `-i`.
    pub fn reads_stdin(&self) -> bool {
        self.stdin || self.paths.iter().any(|p| p.as_os_str() == "-")
    }
}

fn parse_delay(s: &str) -> Result<u32, String> {
    let secs: f32 = s.trim().parse().map_err(|e| format!("{}", e))?;
    if !(secs > 0.0) {
        return Err("delay must be positive".to_string());
    }
    Ok(((secs * 10.0).round() as u32).max(1))
}

fn parse_geometry(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {:?}", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("width: {}", e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("height: {}", e))?;
    if w == 0 || h == 0 {
        return Err("window size must be nonzero".to_string());
    }
    Ok((w, h))
}

fn parse_color(s: &str) -> Result<u32, String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return Err(format!("expected #RRGGBB, got {:?}", s));
    }
    u32::from_str_radix(hex, 16).map_err(|e| format!("{}: {}", s, e))
}
