//! Compiled-in defaults. Anything the user can change lives in `cli`.

/// Zoom levels in percent used by the zoom-in/zoom-out commands.
/// The first and last entries are also the minimum and maximum zoom.
pub const ZOOM_LEVELS: &[f32] = &[12.5, 25.0, 50.0, 75.0, 100.0, 150.0, 200.0, 400.0, 800.0];

pub fn zoom_min() -> f32 {
    ZOOM_LEVELS[0] / 100.0
}

pub fn zoom_max() -> f32 {
    ZOOM_LEVELS[ZOOM_LEVELS.len() - 1] / 100.0
}

/// Gamma levels in `[-GAMMA_RANGE, 0]` map onto multipliers `[0, 1]`,
/// levels in `(0, GAMMA_RANGE]` onto `(1, GAMMA_MAX]`.
pub const GAMMA_MAX: f64 = 10.0;
pub const GAMMA_RANGE: i32 = 32;

/// Panning moves the image by 1/PAN_FRACTION of the window size.
pub const PAN_FRACTION: u32 = 5;

pub const ANTI_ALIAS: bool = true;
pub const ALPHA_LAYER: bool = false;

/// Thumbnail edge lengths in pixels; the largest one is what the disk cache stores.
pub const THUMB_SIZES: &[u32] = &[32, 64, 96, 128, 160];
pub const THUMB_SIZE: usize = 3;

pub const WIN_WIDTH: u32 = 800;
pub const WIN_HEIGHT: u32 = 600;

pub const SLIDESHOW_DELAY: u32 = 5;

pub const DOUBLE_CLICK_MS: u64 = 300;
/// Delay used for animation frames that declare none.
pub const DEF_FRAME_DELAY_MS: u32 = 75;
/// Quiet period after a filesystem change before the image is reloaded.
pub const RELOAD_DEBOUNCE_MS: u64 = 100;

/// Capacity of the left bar field that the info hook writes into.
pub const BAR_L_LEN: usize = 512;
pub const H_TEXT_PAD: u32 = 5;
pub const V_TEXT_PAD: u32 = 1;

/// Window background; the bar is drawn inverted (foreground fill, background text).
pub const BG_COLOR: [u8; 3] = [255, 255, 255];
pub const FG_COLOR: [u8; 3] = [0, 0, 0];

pub const APP_NAME: &str = "ivy";
