//! Readiness selector over the loop's descriptors.

use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

use polling::{Event, Events, PollMode, Poller};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Display,
    /// Info hook stdout.
    Info,
    /// Filesystem watcher wakeup pipe.
    Watch,
}

impl Source {
    const ALL: [Source; 3] = [Source::Display, Source::Info, Source::Watch];

    fn key(self) -> usize {
        self as usize
    }
}

/// Sources that were ready after a wait.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ready(u8);

impl Ready {
    pub fn contains(self, source: Source) -> bool {
        self.0 & (1 << source.key()) != 0
    }

    fn insert(&mut self, source: Source) {
        self.0 |= 1 << source.key();
    }

    #[cfg(test)]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

pub struct Reactor {
    poller: Poller,
    events: Events,
    fds: [Option<RawFd>; 3],
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            poller: Poller::new().map_err(Error::Reactor)?,
            events: Events::new(),
            fds: [None; 3],
        })
    }

    /// Watch `fd` for readability as `source`, replacing whatever was there.
    /// The caller must keep `fd` open until it deregisters it.
    pub fn register(&mut self, source: Source, fd: RawFd) -> Result<()> {
        self.deregister(source);
        // SAFETY: every owner deregisters its descriptor before closing it.
        unsafe {
            self.poller
                .add_with_mode(fd, Event::readable(source.key()), PollMode::Level)
                .map_err(Error::Reactor)?;
        }
        self.fds[source.key()] = Some(fd);
        log::trace!("reactor: {:?} on fd {}", source, fd);
        Ok(())
    }

    pub fn deregister(&mut self, source: Source) {
        if let Some(fd) = self.fds[source.key()].take() {
            // SAFETY: the descriptor is still open, see `register`.
            let fd = unsafe { BorrowedFd::borrow_raw(fd) };
            if let Err(e) = self.poller.delete(fd) {
                log::debug!("reactor: removing {:?}: {}", source, e);
            }
        }
    }

    #[cfg(test)]
    pub fn is_registered(&self, source: Source) -> bool {
        self.fds[source.key()].is_some()
    }

    /// Block until a source is readable or `timeout` passes (`None` waits
    /// forever).
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Ready> {
        self.events.clear();
        match self.poller.wait(&mut self.events, timeout) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Ready::default()),
            Err(e) => return Err(Error::Reactor(e)),
        }
        let mut ready = Ready::default();
        for ev in self.events.iter() {
            if let Some(source) = Source::ALL.into_iter().find(|s| s.key() == ev.key) {
                ready.insert(source);
            }
        }
        Ok(ready)
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        for source in Source::ALL {
            self.deregister(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn timeout_without_sources() {
        let mut r = Reactor::new().unwrap();
        let ready = r.wait(Some(Duration::from_millis(1))).unwrap();
        assert!(ready.is_empty());
    }

    #[test]
    fn reports_readable_source_until_drained() {
        let mut r = Reactor::new().unwrap();
        let (mut tx, rx) = UnixStream::pair().unwrap();
        r.register(Source::Watch, rx.as_raw_fd()).unwrap();
        assert!(r.is_registered(Source::Watch));

        tx.write_all(b"x").unwrap();
        let ready = r.wait(Some(Duration::from_secs(1))).unwrap();
        assert!(ready.contains(Source::Watch));
        assert!(!ready.contains(Source::Info));

        // Level-triggered: still ready while unread.
        let ready = r.wait(Some(Duration::from_millis(10))).unwrap();
        assert!(ready.contains(Source::Watch));

        r.deregister(Source::Watch);
        assert!(!r.is_registered(Source::Watch));
        let ready = r.wait(Some(Duration::from_millis(1))).unwrap();
        assert!(ready.is_empty());
    }

    #[test]
    fn register_replaces_previous_fd() {
        let mut r = Reactor::new().unwrap();
        let (_tx1, rx1) = UnixStream::pair().unwrap();
        let (mut tx2, rx2) = UnixStream::pair().unwrap();
        r.register(Source::Info, rx1.as_raw_fd()).unwrap();
        r.register(Source::Info, rx2.as_raw_fd()).unwrap();
        tx2.write_all(b"y").unwrap();
        let ready = r.wait(Some(Duration::from_secs(1))).unwrap();
        assert!(ready.contains(Source::Info));
        r.deregister(Source::Info);
    }
}
