mod app;
mod cli;
mod commands;
mod config;
mod display;
mod error;
mod files;
mod hooks;
mod input;
mod loader;
mod reactor;
mod thumbs;
mod timers;
mod ui;
mod watch;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use crate::app::{App, Options};
use crate::cli::Cli;
use crate::commands::Mode;
use crate::config::APP_NAME;
use crate::error::{Error, Result};
use crate::files::FileList;
use crate::hooks::{Hook, InfoHook, KeyHandler};
use crate::thumbs::ThumbCache;
use crate::ui::state::ViewOptions;
use crate::ui::{WindowOptions, WinitDisplay};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    files::init_collation();

    let res = run(cli);
    let code = exit_code(&res);
    match &res {
        Err(e) if code != 0 => log::error!("{}", e),
        _ => {}
    }
    ExitCode::from(code)
}

/// Quitting by removing the last file is a normal exit; losing every file to
/// load errors exits with 3.
fn exit_code(res: &Result<()>) -> u8 {
    match res {
        Ok(()) | Err(Error::LastFileRemoved { manual: true }) => 0,
        Err(Error::LastFileRemoved { manual: false }) => 3,
        Err(_) => 1,
    }
}

fn cache_dir() -> Option<PathBuf> {
    dirs_next::cache_dir().map(|d| d.join(APP_NAME))
}

fn collect_files(cli: &Cli) -> FileList {
    let mut files = FileList::new();
    if cli.reads_stdin() {
        let n = files.read_names(io::stdin().lock());
        log::debug!("{} names from stdin", n);
    }
    for path in cli.paths.iter().filter(|p| p.as_os_str() != "-") {
        if path.is_dir() {
            if let Err(e) = files.scan_dir(path, cli.recursive) {
                log::warn!("{}", e);
            }
        } else {
            files.add_file(&path.to_string_lossy(), true);
        }
    }
    files
}

fn run(cli: Cli) -> Result<()> {
    if cli.clean_cache {
        if let Some(dir) = cache_dir() {
            log::info!("removing {:?}", dir);
            thumbs::clean_cache(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        return Ok(());
    }

    let files = collect_files(&cli);
    if files.is_empty() {
        return Err(Error::NoFiles);
    }
    log::info!("{} files", files.len());

    let (width, height) = cli.window_size();
    let display = WinitDisplay::new(&WindowOptions {
        width,
        height,
        fullscreen: cli.fullscreen,
        title: APP_NAME.to_string(),
        class: cli.class.clone().unwrap_or_else(|| APP_NAME.to_string()),
    })?;

    let (fg, bg) = cli.colors();
    let opts = Options {
        view: ViewOptions {
            scalemode: cli.scale_mode(),
            zoom: cli.zoom_factor(),
            animate: cli.animate || cli.framerate.is_some(),
            framedelay: cli.frame_delay(),
            gamma: cli.gamma.unwrap_or(0),
            slideshow: cli.slideshow.unwrap_or(0),
        },
        mode: if cli.thumbnails { Mode::Thumb } else { Mode::Image },
        start: cli.start.map(|n| n.saturating_sub(1)).unwrap_or(0),
        show_bar: !cli.hide_bar,
        bar_scale: cli.font_scale,
        fg,
        bg,
        mark_output: cli.mark_output,
        initial_delay: Duration::from_millis(cli.initial_delay),
        repeat_delay: Duration::from_millis(cli.repeat_delay),
        info: InfoHook::new(Hook::discover("image-info")),
        keyhandler: KeyHandler::new(Hook::discover("key-handler")),
        thumbs: ThumbCache::new(cache_dir(), cli.private),
        watch: true,
    };

    let mut app = App::new(display, files, opts)?;
    app.run()
}
