use std::cmp::Ordering;
use std::ffi::CString;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::thumbs::Thumbnail;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tga", "tiff", "tif", "webp", "ico", "pnm", "pbm",
    "pgm", "ppm", "pam", "dds", "hdr", "exr", "ff", "qoi",
];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileFlags {
    /// Report decode failures; only set for names the user typed.
    pub warn: bool,
    pub marked: bool,
    /// The disk cache holds an up-to-date thumbnail for this file.
    pub thumb_init: bool,
}

impl FileFlags {
    /// Level at which a failure to load this file is logged.
    pub fn failure_level(&self) -> log::Level {
        if self.warn {
            log::Level::Warn
        } else {
            log::Level::Debug
        }
    }
}

/// One file and everything keyed to its position in the list. Thumbnails
/// live here so that removal can never leave them out of step.
#[derive(Debug)]
pub struct FileEntry {
    /// Name as given by the user or built during the directory scan.
    pub name: String,
    /// Canonical absolute path, resolved once at insertion.
    pub path: PathBuf,
    pub flags: FileFlags,
    pub thumb: Option<Thumbnail>,
}

#[derive(Debug, Default)]
pub struct FileList {
    entries: Vec<FileEntry>,
    pub fileidx: usize,
    pub alternate: usize,
    markcnt: usize,
    pub markidx: usize,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, n: usize) -> Option<&FileEntry> {
        self.entries.get(n)
    }

    pub fn get_mut(&mut self, n: usize) -> Option<&mut FileEntry> {
        self.entries.get_mut(n)
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&FileEntry> {
        self.entries.get(self.fileidx)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileEntry> {
        self.entries.iter_mut()
    }

    pub fn mark_count(&self) -> usize {
        self.markcnt
    }

    /// Validate `name` and append it. Problems are only reported for names
    /// the user typed; scan results that vanish or can't be read are skipped.
    pub fn add_file(&mut self, name: &str, given: bool) -> bool {
        if name.is_empty() {
            return false;
        }
        let path = match fs::File::open(name).and_then(|_| fs::canonicalize(name)) {
            Ok(p) => p,
            Err(e) => {
                if given {
                    log::warn!("{}: {}", name, e);
                } else {
                    log::debug!("skipping {}: {}", name, e);
                }
                return false;
            }
        };
        self.entries.push(FileEntry {
            name: name.to_string(),
            path,
            flags: FileFlags {
                warn: given,
                ..FileFlags::default()
            },
            thumb: None,
        });
        true
    }

    /// Drop entry `n`, keeping every index that points into the list valid.
    /// Emptying the list is not allowed: the caller gets `LastFileRemoved`
    /// and is expected to shut down.
    pub fn remove(&mut self, n: usize, manual: bool) -> Result<()> {
        if n >= self.entries.len() {
            return Ok(());
        }
        if self.entries.len() == 1 {
            return Err(Error::LastFileRemoved { manual });
        }
        let removed = self.entries.remove(n);
        if removed.flags.marked {
            self.markcnt -= 1;
        }
        let cnt = self.entries.len();
        for idx in [&mut self.fileidx, &mut self.alternate, &mut self.markidx] {
            if *idx > n || *idx == cnt {
                *idx -= 1;
            }
        }
        log::debug!("removed {} ({} files left)", removed.name, cnt);
        Ok(())
    }

    /// Set the mark on `n`. Returns whether anything changed.
    pub fn mark(&mut self, n: usize, on: bool) -> bool {
        let Some(entry) = self.entries.get_mut(n) else {
            return false;
        };
        self.markidx = n;
        if entry.flags.marked == on {
            return false;
        }
        entry.flags.marked = on;
        if on {
            self.markcnt += 1;
        } else {
            self.markcnt -= 1;
        }
        true
    }

    pub fn reverse_marks(&mut self) {
        for entry in &mut self.entries {
            entry.flags.marked = !entry.flags.marked;
        }
        self.markcnt = self.entries.len() - self.markcnt;
    }

    pub fn unmark_all(&mut self) {
        for entry in &mut self.entries {
            entry.flags.marked = false;
        }
        self.markcnt = 0;
    }

    pub fn marked_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.flags.marked)
            .map(|e| e.name.as_str())
    }

    /// Order `[start, end)` by the collation rules of the current locale.
    pub fn sort_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.entries.len());
        if start + 1 >= end {
            return;
        }
        self.entries[start..end].sort_by(|a, b| collate(&a.name, &b.name));
    }

    /// Add the images of `dir` (and its subdirectories when `recursive`),
    /// sorting just the freshly added block.
    pub fn scan_dir(&mut self, dir: &Path, recursive: bool) -> Result<()> {
        let start = self.entries.len();
        self.scan_dir_inner(dir, recursive, true)?;
        self.sort_range(start, self.entries.len());
        log::info!(
            "Scanned {:?}: {} images",
            dir,
            self.entries.len() - start
        );
        Ok(())
    }

    fn scan_dir_inner(&mut self, dir: &Path, recursive: bool, top: bool) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if top => return Err(Error::io(dir, e)),
            Err(e) => {
                log::debug!("skipping {:?}: {}", dir, e);
                return Ok(());
            }
        };
        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        for entry in entries.filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_dir() {
                if recursive {
                    subdirs.push(p);
                }
            } else if is_image_file(&p) {
                files.push(p);
            }
        }

        for p in files {
            self.add_file(&p.to_string_lossy(), false);
        }
        subdirs.sort();
        for sub in subdirs {
            self.scan_dir_inner(&sub, true, false)?;
        }
        Ok(())
    }

    /// Read one file name per line, as produced by `find` and friends.
    pub fn read_names(&mut self, reader: impl BufRead) -> usize {
        let mut added = 0;
        for line in reader.lines().map_while(|l| l.ok()) {
            if self.add_file(line.trim_end_matches('\r'), true) {
                added += 1;
            }
        }
        added
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    match (CString::new(a), CString::new(b)) {
        (Ok(ca), Ok(cb)) => {
            // SAFETY: both pointers come from live, NUL-terminated CStrings.
            let r = unsafe { libc::strcoll(ca.as_ptr(), cb.as_ptr()) };
            r.cmp(&0)
        }
        _ => a.cmp(b),
    }
}

/// Switch string collation to the user's locale so `sort_range` follows it.
pub fn init_collation() {
    // SAFETY: called once from main before anything else reads the locale.
    unsafe {
        libc::setlocale(libc::LC_COLLATE, c"".as_ptr());
    }
}
