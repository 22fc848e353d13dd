//! Change notification for the displayed file.
//!
//! notify delivers events on its own thread; they are queued on a channel and
//! a byte is written to a socket pair so that the event loop can wait on the
//! read end like any other descriptor.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};

pub struct FileWatch {
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    wake: UnixStream,
    dir: Option<PathBuf>,
    target: Option<PathBuf>,
}

fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
    )
}

impl FileWatch {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (wake, mut notify_end) =
            UnixStream::pair().map_err(|e| Error::io("watch socket", e))?;
        wake.set_nonblocking(true)
            .map_err(|e| Error::io("watch socket", e))?;
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if tx.send(event).is_ok() {
                    let _ = notify_end.write_all(&[1]);
                }
            }
            Err(e) => log::debug!("watch error: {}", e),
        })?;
        Ok(Self {
            watcher,
            rx,
            wake,
            dir: None,
            target: None,
        })
    }

    /// Descriptor that turns readable when events are queued.
    pub fn fd(&self) -> RawFd {
        self.wake.as_raw_fd()
    }

    /// Follow `path` instead of whatever was watched before. The parent
    /// directory is watched so that replace-by-rename is seen too.
    pub fn watch_file(&mut self, path: &Path) -> Result<()> {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/"));
        if self.dir.as_deref() != Some(dir.as_path()) {
            if let Some(old) = self.dir.take() {
                if let Err(e) = self.watcher.unwatch(&old) {
                    log::debug!("unwatch {:?}: {}", old, e);
                }
            }
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            self.dir = Some(dir);
        }
        self.target = Some(path.to_path_buf());
        log::trace!("watching {:?}", path);
        Ok(())
    }

    /// Consume queued events. Returns whether the watched file was written.
    pub fn drain(&mut self) -> bool {
        let mut buf = [0u8; 64];
        loop {
            match self.wake.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            let hit = self
                .target
                .as_ref()
                .is_some_and(|t| event.paths.iter().any(|p| p == t));
            if hit && is_write(&event.kind) {
                log::debug!("{:?} changed on disk ({:?})", self.target, event.kind);
                changed = true;
            }
        }
        changed
    }
}
