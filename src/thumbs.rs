//! Thumbnail cache and grid.
//!
//! Thumbnails are produced in two stages. Hydration walks the whole list with
//! `initnext` and makes sure the on-disk cache holds a fresh entry for every
//! file, which is cheap once the cache is warm. Materialization walks the
//! visible window `[first, end)` with `loadnext` and puts pixels in memory.
//! The event loop interleaves one step at a time, visible work first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::{ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};

use crate::config::{THUMB_SIZE, THUMB_SIZES};
use crate::display::Canvas;
use crate::files::FileList;
use crate::loader;
use crate::ui::render::{Blit, Orientation};
use crate::ui::state::Dir;

/// In-memory thumbnail, sized for the current grid tier.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Window position, assigned when the grid is laid out.
    pub x: i32,
    pub y: i32,
}

impl Thumbnail {
    fn from_image(img: &RgbaImage, dim: u32) -> Self {
        let small = loader::shrink_to(img, dim);
        let (width, height) = small.dimensions();
        Self {
            pixels: small.into_raw(),
            width,
            height,
            x: 0,
            y: 0,
        }
    }
}

/// Outcome of one unit of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Work {
    Idle,
    Done,
    /// The file could not be decoded and should leave the list.
    Failed(usize),
}

fn largest_size() -> u32 {
    THUMB_SIZES[THUMB_SIZES.len() - 1]
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remove the whole on-disk cache.
pub fn clean_cache(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

pub struct ThumbCache {
    cache_dir: Option<PathBuf>,
    private: bool,
    pub initnext: usize,
    pub loadnext: usize,
    pub first: usize,
    pub end: usize,
    /// Origin of the grid in window pixels.
    pub x: i32,
    pub y: i32,
    pub cols: usize,
    pub rows: usize,
    zl: usize,
    bw: u32,
    dim: u32,
    /// Layout must be recomputed before the next draw.
    pub dirty: bool,
}

impl ThumbCache {
    pub fn new(cache_dir: Option<PathBuf>, private: bool) -> Self {
        let mut tns = Self {
            cache_dir,
            private,
            initnext: 0,
            loadnext: 0,
            first: 0,
            end: 0,
            x: 0,
            y: 0,
            cols: 0,
            rows: 0,
            zl: THUMB_SIZE,
            bw: 0,
            dim: 0,
            dirty: true,
        };
        tns.update_dim();
        tns
    }

    /// Edge length of the current size tier.
    pub fn size(&self) -> u32 {
        THUMB_SIZES[self.zl]
    }

    /// Grid cell pitch including border and padding.
    #[cfg(test)]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    fn update_dim(&mut self) {
        let size = self.size();
        self.bw = (((size - 1) >> 5) + 1).min(4);
        self.dim = size + 2 * self.bw + 6;
    }

    pub fn is_busy(&self, filecnt: usize) -> bool {
        self.loadnext < self.end || self.initnext < filecnt
    }

    // -----------------------------------------------------------------------
    // Disk cache
    // -----------------------------------------------------------------------

    /// Cache file for `path`: hex SHA-256 of the absolute path and the stored
    /// size tier, split into a 3-character directory and the rest.
    pub fn cache_path(&self, path: &Path) -> Option<PathBuf> {
        let base = self.cache_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        hasher.update(format!(":{}", largest_size()).as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        let (first, rest) = hex.split_at(3);
        Some(base.join(first).join(format!("{rest}.png")))
    }

    fn cache_is_fresh(&self, path: &Path) -> bool {
        let Some(cfile) = self.cache_path(path) else {
            return false;
        };
        match (mtime(&cfile), mtime(path)) {
            (Some(cached), Some(source)) => cached >= source,
            _ => false,
        }
    }

    fn cache_load(&self, path: &Path) -> Option<RgbaImage> {
        if !self.cache_is_fresh(path) {
            return None;
        }
        let cfile = self.cache_path(path)?;
        match image::open(&cfile) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                log::debug!("unreadable cache entry {:?}: {}", cfile, e);
                None
            }
        }
    }

    /// Store `img` for `path`, stamped with the source's mtime. Best effort.
    fn cache_write(&self, path: &Path, img: &RgbaImage) {
        if self.private {
            return;
        }
        let Some(cfile) = self.cache_path(path) else {
            return;
        };
        let result = (|| -> io::Result<()> {
            if let Some(parent) = cfile.parent() {
                fs::create_dir_all(parent)?;
            }
            img.save_with_format(&cfile, ImageFormat::Png)
                .map_err(io::Error::other)?;
            if let Some(source) = mtime(path) {
                fs::File::options().write(true).open(&cfile)?.set_modified(source)?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            log::debug!("could not cache thumbnail {:?}: {}", cfile, e);
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Produce the thumbnail for entry `n`. With `cache_only` the disk cache
    /// is brought up to date but nothing is kept in memory; `force` skips
    /// the cache and decodes the source. Returns false when the source can't
    /// be decoded.
    pub fn load(&mut self, files: &mut FileList, n: usize, force: bool, cache_only: bool) -> bool {
        let dim = self.size();
        let Some(entry) = files.get(n) else {
            return false;
        };
        let path = entry.path.clone();
        let level = entry.flags.failure_level();

        let mut source = None;
        let mut cached = false;
        if !force {
            if cache_only && self.cache_is_fresh(&path) {
                cached = true;
            } else if let Some(img) = self.cache_load(&path) {
                source = Some(img);
                cached = true;
            }
        }
        if !cached {
            match loader::decode_still(&path) {
                Ok(img) => {
                    let small = loader::shrink_to(&img, largest_size());
                    self.cache_write(&path, &small);
                    source = Some(small);
                }
                Err(e) => {
                    log::log!(level, "{}", e);
                    return false;
                }
            }
        }

        let Some(entry) = files.get_mut(n) else {
            return false;
        };
        if !cache_only {
            entry.thumb = source.map(|img| Thumbnail::from_image(&img, dim));
        }
        entry.flags.thumb_init = true;

        if n == self.initnext {
            while files.get(self.initnext).is_some_and(|e| e.flags.thumb_init) {
                self.initnext += 1;
            }
        }
        if n == self.loadnext && !cache_only {
            while self.loadnext < self.end
                && files.get(self.loadnext).is_some_and(|e| e.thumb.is_some())
            {
                self.loadnext += 1;
            }
        }
        true
    }

    /// Drop the in-memory thumbnail of `n` and mark it for re-hydration.
    pub fn unload(&mut self, files: &mut FileList, n: usize) {
        if let Some(entry) = files.get_mut(n) {
            entry.thumb = None;
            entry.flags.thumb_init = false;
            self.initnext = self.initnext.min(n);
            if (self.first..self.end).contains(&n) {
                self.loadnext = self.loadnext.min(n);
            }
        }
    }

    /// One materialization step within the visible window.
    pub fn materialize_step(&mut self, files: &mut FileList) -> Work {
        if self.loadnext >= self.end || self.loadnext >= files.len() {
            return Work::Idle;
        }
        let n = self.loadnext;
        if self.load(files, n, false, false) {
            Work::Done
        } else {
            Work::Failed(n)
        }
    }

    /// One hydration step across the whole list.
    pub fn hydrate_step(&mut self, files: &mut FileList) -> Work {
        if self.initnext >= files.len() {
            return Work::Idle;
        }
        let n = self.initnext;
        if self.load(files, n, false, true) {
            Work::Done
        } else {
            Work::Failed(n)
        }
    }

    /// Keep the cursors consistent after entry `n` left the list.
    pub fn removed(&mut self, n: usize) {
        if n < self.loadnext {
            self.loadnext -= 1;
        }
        if n < self.initnext {
            self.initnext -= 1;
        }
        self.dirty = true;
    }

    /// Forget everything and start over.
    pub fn reset(&mut self, files: &mut FileList) {
        for entry in files.iter_mut() {
            entry.thumb = None;
            entry.flags.thumb_init = false;
        }
        self.initnext = 0;
        self.loadnext = 0;
        self.first = 0;
        self.end = 0;
        self.dirty = true;
    }

    // -----------------------------------------------------------------------
    // Grid layout and navigation
    // -----------------------------------------------------------------------

    fn check_view(&mut self, files: &mut FileList, scrolled: bool) {
        let cols = self.cols.max(1);
        let page = cols * self.rows.max(1);
        self.first -= self.first % cols;
        let sel = files.fileidx;
        let r = sel % cols;
        if scrolled {
            let last = files.len().saturating_sub(1);
            if sel >= self.first + page {
                files.fileidx = (self.first + r + cols * (self.rows.max(1) - 1)).min(last);
            } else if sel < self.first {
                files.fileidx = (self.first + r).min(last);
            }
        } else if self.first + page <= sel {
            self.first = sel - r - cols * (self.rows.max(1) - 1);
            self.dirty = true;
        } else if self.first > sel {
            self.first = sel - r;
            self.dirty = true;
        }
    }

    /// Lay the grid out for a `win_w`x`win_h` area. Only does work when the
    /// layout is dirty; `loadnext` is reset to the first visible entry
    /// without pixels (or `end` when all are present).
    pub fn set_view(&mut self, files: &mut FileList, win_w: u32, win_h: u32) {
        if !self.dirty {
            return;
        }
        let cnt_total = files.len();
        self.cols = ((win_w / self.dim) as usize).max(1);
        self.rows = ((win_h / self.dim) as usize).max(1);
        let mut cnt;
        if cnt_total < self.cols * self.rows {
            self.first = 0;
            cnt = cnt_total;
        } else {
            self.check_view(files, false);
            cnt = self.cols * self.rows;
            if self.first + cnt > cnt_total {
                let r = self.first + cnt - cnt_total;
                if r >= self.cols {
                    self.first -= r - r % self.cols;
                }
                cnt -= r % self.cols;
            }
        }
        let shown_rows = cnt / self.cols + usize::from(cnt % self.cols != 0);
        self.x = (win_w as i32 - (cnt.min(self.cols) as u32 * self.dim) as i32) / 2 + self.bw as i32 + 3;
        self.y = (win_h as i32 - (shown_rows as u32 * self.dim) as i32) / 2 + self.bw as i32 + 3;
        self.end = self.first + cnt;

        let size = self.size() as i32;
        let dim = self.dim as i32;
        self.loadnext = self.end;
        for (k, i) in (self.first..self.end).enumerate() {
            let cx = self.x + (k % self.cols) as i32 * dim;
            let cy = self.y + (k / self.cols) as i32 * dim;
            match files.get_mut(i).and_then(|e| e.thumb.as_mut()) {
                Some(t) => {
                    t.x = cx + (size - t.width as i32) / 2;
                    t.y = cy + (size - t.height as i32) / 2;
                }
                None => self.loadnext = self.loadnext.min(i),
            }
        }
        self.dirty = false;
        log::trace!(
            "grid {}x{} showing [{}, {}), loadnext {}",
            self.cols,
            self.rows,
            self.first,
            self.end,
            self.loadnext
        );
    }

    /// Grid index under window position `(x, y)`.
    pub fn translate(&self, files: &FileList, x: i32, y: i32) -> Option<usize> {
        if x < self.x || y < self.y || self.dim == 0 {
            return None;
        }
        let dim = self.dim as i32;
        let col = ((x - self.x) / dim) as usize;
        if col >= self.cols {
            return None;
        }
        let n = self.first + ((y - self.y) / dim) as usize * self.cols + col;
        (n < files.len() && n < self.end).then_some(n)
    }

    pub fn move_selection(&mut self, files: &mut FileList, dir: Dir, cnt: usize) -> bool {
        let total = files.len();
        if total == 0 {
            return false;
        }
        let cols = self.cols.max(1);
        let old = files.fileidx;
        let cnt = cnt.max(1);
        let sel = old;
        files.fileidx = match dir {
            Dir::Up => sel.saturating_sub(cnt * cols).max(sel % cols),
            Dir::Down => {
                let max = cols * ((total - 1) / cols) + ((total - 1) % cols).min(sel % cols);
                (sel + cnt * cols).min(max)
            }
            Dir::Left => sel.saturating_sub(cnt),
            Dir::Right => (sel + cnt).min(total - 1),
        };
        if files.fileidx != old {
            self.check_view(files, false);
        }
        files.fileidx != old
    }

    /// Scroll by a row (or a whole screen), pulling the selection along.
    pub fn scroll(&mut self, files: &mut FileList, dir: Dir, screen: bool) -> bool {
        let cols = self.cols.max(1);
        let rows = self.rows.max(1);
        let total = files.len();
        let old = self.first;
        let d = cols * if screen { rows } else { 1 };
        match dir {
            Dir::Down => {
                let mut max = total as i64 - (cols * rows) as i64;
                if total % cols != 0 {
                    max += (cols - total % cols) as i64;
                }
                self.first = (self.first as i64 + d as i64).min(max).max(0) as usize;
            }
            Dir::Up => self.first = self.first.saturating_sub(d),
            _ => {}
        }
        if self.first != old {
            self.check_view(files, true);
            self.dirty = true;
        }
        self.first != old
    }

    /// Change the size tier. All in-memory thumbnails are dropped; the disk
    /// cache stays valid since it stores the largest tier.
    pub fn zoom(&mut self, files: &mut FileList, d: i32) -> bool {
        let old = self.zl;
        let zl = self.zl as i32 + d.signum();
        self.zl = zl.clamp(0, THUMB_SIZES.len() as i32 - 1) as usize;
        self.update_dim();
        if self.zl != old {
            for entry in files.iter_mut() {
                entry.thumb = None;
            }
            self.dirty = true;
        }
        self.zl != old
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    pub fn render(&mut self, files: &mut FileList, canvas: &mut Canvas<'_>, area_h: u32, fg: u32, bg: u32) {
        self.set_view(files, canvas.width(), area_h);
        for i in self.first..self.end {
            let Some(entry) = files.get(i) else {
                break;
            };
            let Some(t) = &entry.thumb else {
                continue;
            };
            let blit = Blit {
                src: &t.pixels,
                src_w: t.width,
                src_h: t.height,
                x: t.x as f32,
                y: t.y as f32,
                zoom: 1.0,
                orientation: Orientation::default(),
                antialias: false,
                checker: false,
                gamma: None,
                bg,
            };
            canvas.blit(&blit, area_h);
            if i == files.fileidx {
                self.highlight(canvas, t, fg);
            }
            if entry.flags.marked {
                self.mark(canvas, t, fg);
            }
        }
    }

    fn highlight(&self, canvas: &mut Canvas<'_>, t: &Thumbnail, color: u32) {
        let oxy = (self.bw as i32 + 1) / 2 + 1 + self.bw as i32 / 2;
        let owh = 2 * oxy as u32;
        canvas.draw_rect(t.x - oxy, t.y - oxy, t.width + owh, t.height + owh, self.bw, color);
    }

    fn mark(&self, canvas: &mut Canvas<'_>, t: &Thumbnail, color: u32) {
        let s = self.bw + 2;
        canvas.fill_rect(t.x + t.width as i32, t.y + t.height as i32, s, s, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_list(n: usize) -> (tempfile::TempDir, FileList) {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FileList::new();
        for i in 0..n {
            let p = dir.path().join(format!("{i}.png"));
            RgbaImage::from_pixel(40, 20, Rgba([i as u8, 0, 0, 255]))
                .save(&p)
                .unwrap();
            assert!(files.add_file(&p.to_string_lossy(), true));
        }
        (dir, files)
    }

    fn cache(tmp: &tempfile::TempDir) -> ThumbCache {
        ThumbCache::new(Some(tmp.path().join("cache")), false)
    }

    #[test]
    fn dims_follow_tier() {
        let tns = ThumbCache::new(None, false);
        assert_eq!(tns.size(), 128);
        assert_eq!(tns.dim(), 128 + 2 * 4 + 6);
    }

    #[test]
    fn cache_path_is_stable_and_split() {
        let tmp = tempfile::tempdir().unwrap();
        let tns = cache(&tmp);
        let a = tns.cache_path(Path::new("/a/b.png")).unwrap();
        let b = tns.cache_path(Path::new("/a/b.png")).unwrap();
        let c = tns.cache_path(Path::new("/a/c.png")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let dir = a.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(dir.len(), 3);
        assert_eq!(a.extension().unwrap(), "png");
        assert!(ThumbCache::new(None, false).cache_path(Path::new("/x")).is_none());
    }

    #[test]
    fn hydration_writes_fresh_cache_entries() {
        let (tmp, mut files) = png_list(3);
        let mut tns = cache(&tmp);
        while tns.hydrate_step(&mut files) == Work::Done {}
        assert_eq!(tns.initnext, 3);
        for e in files.iter() {
            assert!(e.flags.thumb_init);
            assert!(e.thumb.is_none());
            assert!(tns.cache_is_fresh(&e.path));
        }
        assert_eq!(tns.hydrate_step(&mut files), Work::Idle);
    }

    #[test]
    fn private_mode_writes_nothing() {
        let (tmp, mut files) = png_list(1);
        let mut tns = ThumbCache::new(Some(tmp.path().join("cache")), true);
        assert_eq!(tns.hydrate_step(&mut files), Work::Done);
        assert!(!tmp.path().join("cache").exists());
    }

    #[test]
    fn stale_cache_is_ignored() {
        let (tmp, mut files) = png_list(1);
        let mut tns = cache(&tmp);
        tns.hydrate_step(&mut files);
        let path = files.get(0).unwrap().path.clone();
        let cfile = tns.cache_path(&path).unwrap();
        let older = SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::options().write(true).open(&cfile).unwrap().set_modified(older).unwrap();
        assert!(!tns.cache_is_fresh(&path));
    }

    #[test]
    fn undecodable_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("bad.png");
        fs::write(&p, b"nope").unwrap();
        let mut files = FileList::new();
        files.add_file(&p.to_string_lossy(), false);
        let mut tns = cache(&tmp);
        assert_eq!(tns.hydrate_step(&mut files), Work::Failed(0));
        assert_eq!(tns.initnext, 0);
    }

    #[test]
    fn materialization_stays_inside_window() {
        let (tmp, mut files) = png_list(5);
        let mut tns = cache(&tmp);
        // One column, four rows.
        let dim = tns.dim();
        tns.set_view(&mut files, dim, dim * 4);
        assert_eq!((tns.first, tns.end, tns.loadnext), (0, 4, 0));

        while tns.materialize_step(&mut files) == Work::Done {}
        assert_eq!(tns.loadnext, 4);
        assert!(files.get(4).unwrap().thumb.is_none());
        assert!(files.iter().take(4).all(|e| e.thumb.is_some()));
    }

    #[test]
    fn scrolling_loads_only_new_cell_and_keeps_old() {
        let (tmp, mut files) = png_list(5);
        let mut tns = cache(&tmp);
        let dim = tns.dim();
        tns.set_view(&mut files, dim, dim * 4);
        while tns.materialize_step(&mut files) == Work::Done {}

        assert!(tns.scroll(&mut files, Dir::Down, false));
        assert_eq!(files.fileidx, 1);
        tns.set_view(&mut files, dim, dim * 4);
        assert_eq!((tns.first, tns.end, tns.loadnext), (1, 5, 4));

        let mut loads = 0;
        while tns.materialize_step(&mut files) == Work::Done {
            loads += 1;
        }
        assert_eq!(loads, 1);
        assert_eq!(tns.loadnext, 5);
        assert!(files.get(0).unwrap().thumb.is_some());
        assert!(files.get(4).unwrap().thumb.is_some());
    }

    #[test]
    fn scrolling_into_partial_row_keeps_selection_in_range() {
        let (tmp, mut files) = png_list(5);
        let mut tns = cache(&tmp);
        let dim = tns.dim();
        // Three columns, one row; the second row holds only 3 and 4.
        tns.set_view(&mut files, dim * 3, dim);
        files.fileidx = 2;
        assert!(tns.scroll(&mut files, Dir::Down, false));
        assert_eq!(tns.first, 3);
        assert_eq!(files.fileidx, 4);
        assert!(files.fileidx < files.len());
    }

    #[test]
    fn unload_resets_hydration() {
        let (tmp, mut files) = png_list(3);
        let mut tns = cache(&tmp);
        while tns.hydrate_step(&mut files) == Work::Done {}
        tns.unload(&mut files, 1);
        assert!(!files.get(1).unwrap().flags.thumb_init);
        assert_eq!(tns.initnext, 1);
        assert_eq!(tns.hydrate_step(&mut files), Work::Done);
        assert_eq!(tns.initnext, 3);
    }

    #[test]
    fn move_selection_in_grid() {
        let (tmp, mut files) = png_list(7);
        let mut tns = cache(&tmp);
        let dim = tns.dim();
        // Three columns, three rows.
        tns.set_view(&mut files, dim * 3, dim * 3);
        assert!(tns.move_selection(&mut files, Dir::Down, 1));
        assert_eq!(files.fileidx, 3);
        assert!(tns.move_selection(&mut files, Dir::Right, 2));
        assert_eq!(files.fileidx, 5);
        // Last row only has index 6 in column 0.
        assert!(tns.move_selection(&mut files, Dir::Down, 1));
        assert_eq!(files.fileidx, 6);
        assert!(!tns.move_selection(&mut files, Dir::Down, 1));
        assert!(tns.move_selection(&mut files, Dir::Up, 5));
        assert_eq!(files.fileidx, 0);
        assert!(!tns.move_selection(&mut files, Dir::Left, 1));
    }

    #[test]
    fn selection_below_window_scrolls_view() {
        let (tmp, mut files) = png_list(5);
        let mut tns = cache(&tmp);
        let dim = tns.dim();
        tns.set_view(&mut files, dim, dim * 2);
        assert!(tns.move_selection(&mut files, Dir::Down, 3));
        assert_eq!(files.fileidx, 3);
        assert!(tns.dirty);
        tns.set_view(&mut files, dim, dim * 2);
        assert_eq!((tns.first, tns.end), (2, 4));
    }

    #[test]
    fn translate_hits_cells() {
        let (tmp, mut files) = png_list(5);
        let mut tns = cache(&tmp);
        let dim = tns.dim() as i32;
        tns.set_view(&mut files, (dim * 3) as u32, (dim * 2) as u32);
        assert_eq!(tns.translate(&files, tns.x + 1, tns.y + 1), Some(0));
        assert_eq!(tns.translate(&files, tns.x + dim + 1, tns.y + dim + 1), Some(4));
        assert_eq!(tns.translate(&files, tns.x + 2 * dim + 1, tns.y + dim + 1), None);
        assert_eq!(tns.translate(&files, tns.x - 1, tns.y), None);
    }

    #[test]
    fn zoom_changes_tier_and_drops_pixels() {
        let (tmp, mut files) = png_list(2);
        let mut tns = cache(&tmp);
        tns.set_view(&mut files, 800, 600);
        while tns.materialize_step(&mut files) == Work::Done {}
        assert!(tns.zoom(&mut files, 1));
        assert_eq!(tns.size(), 160);
        assert!(files.iter().all(|e| e.thumb.is_none()));
        assert!(!tns.zoom(&mut files, 1));
        assert!(tns.zoom(&mut files, -1));
        assert_eq!(tns.size(), 128);
    }

    #[test]
    fn removal_moves_cursors_back() {
        let mut tns = ThumbCache::new(None, false);
        tns.initnext = 4;
        tns.loadnext = 2;
        tns.removed(1);
        assert_eq!((tns.initnext, tns.loadnext), (3, 1));
        tns.removed(3);
        assert_eq!((tns.initnext, tns.loadnext), (3, 1));
    }

    #[test]
    fn clean_cache_removes_tree() {
        let (tmp, mut files) = png_list(1);
        let mut tns = cache(&tmp);
        tns.hydrate_step(&mut files);
        let dir = tmp.path().join("cache");
        assert!(dir.exists());
        clean_cache(&dir).unwrap();
        assert!(!dir.exists());
        clean_cache(&dir).unwrap();
    }
}
