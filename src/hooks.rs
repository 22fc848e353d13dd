//! External helper programs: the image-info hook feeding the status bar and
//! the key handler run on the external prefix.

use std::fs;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::SystemTime;

use crate::config::{APP_NAME, BAR_L_LEN};
use crate::error::Result;
use crate::reactor::{Reactor, Source};

/// A hook executable, checked once at startup.
#[derive(Debug)]
pub struct Hook {
    path: PathBuf,
    /// Why the hook can't be run, if it can't.
    err: Option<String>,
    warned: bool,
}

impl Hook {
    /// Look for `name` under `<config dir>/ivy/exec/`.
    pub fn discover(name: &str) -> Self {
        match dirs_next::config_dir() {
            Some(dir) => Self::at(dir.join(APP_NAME).join("exec").join(name)),
            None => Self {
                path: PathBuf::from(name),
                err: Some("no config directory".to_string()),
                warned: false,
            },
        }
    }

    pub fn at(path: PathBuf) -> Self {
        let err = match fs::metadata(&path) {
            Ok(m) if m.is_file() && m.permissions().mode() & 0o111 != 0 => None,
            Ok(_) => Some("not an executable file".to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(e) = &err {
            log::debug!("hook {:?} disabled: {}", path, e);
        }
        Self {
            path,
            err,
            warned: false,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            err: Some("disabled".to_string()),
            warned: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.err.is_none()
    }

    /// Warn about a missing hook the first time it is asked for.
    fn check(&mut self) -> bool {
        match &self.err {
            None => true,
            Some(e) => {
                if !self.warned {
                    log::warn!("{}: {}", self.path.display(), e);
                    self.warned = true;
                }
                false
            }
        }
    }
}

/// Collects killed or finished children without blocking.
#[derive(Debug, Default)]
pub struct Reaper {
    children: Vec<Child>,
}

impl Reaper {
    pub fn adopt(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Wait for whichever children have exited.
    pub fn reap(&mut self) {
        self.children.retain_mut(|c| match c.try_wait() {
            Ok(Some(status)) => {
                log::trace!("child {} exited: {}", c.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::debug!("waiting for child {}: {}", c.id(), e);
                false
            }
        });
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.children.len()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        for c in &mut self.children {
            let _ = c.wait();
        }
    }
}

fn set_nonblocking(fd: i32) -> io::Result<()> {
    // SAFETY: plain fcntl flag manipulation on a descriptor we own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Runs `image-info <name> <width> <height>` per loaded image and streams its
/// stdout into the bar, folding newlines into single spaces.
pub struct InfoHook {
    hook: Hook,
    running: Option<(Child, ChildStdout)>,
    text: Vec<u8>,
    lastsep: bool,
}

impl InfoHook {
    pub fn new(hook: Hook) -> Self {
        Self {
            hook,
            running: None,
            text: Vec::new(),
            lastsep: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.hook.is_enabled()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }

    pub fn open(&mut self, name: &str, width: u32, height: u32, reactor: &mut Reactor) -> Result<()> {
        if !self.hook.is_enabled() || self.is_running() {
            return Ok(());
        }
        self.text.clear();
        self.lastsep = false;
        let spawned = Command::new(&self.hook.path)
            .arg(name)
            .arg(width.to_string())
            .arg(height.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                log::warn!("exec {}: {}", self.hook.path.display(), e);
                return Ok(());
            }
        };
        let Some(stdout) = child.stdout.take() else {
            return Ok(());
        };
        let fd = stdout.as_raw_fd();
        if let Err(e) = set_nonblocking(fd) {
            log::debug!("info hook pipe: {}", e);
        }
        reactor.register(Source::Info, fd)?;
        log::debug!("info hook started for {} (pid {})", name, child.id());
        self.running = Some((child, stdout));
        Ok(())
    }

    /// Drain the pipe. Returns true once the hook finished (or filled the
    /// bar) and the text is final.
    pub fn read(&mut self, reactor: &mut Reactor, reaper: &mut Reaper) -> bool {
        let Some((_, stdout)) = &mut self.running else {
            return false;
        };
        let mut buf = [0u8; BAR_L_LEN];
        let done = 'outer: loop {
            let n = match stdout.read(&mut buf) {
                Ok(0) => break true,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("info hook read: {}", e);
                    break true;
                }
            };
            for &b in &buf[..n] {
                if b == b'\n' {
                    if !self.lastsep {
                        self.text.push(b' ');
                        self.lastsep = true;
                    }
                } else {
                    self.text.push(b);
                    self.lastsep = false;
                }
                if self.text.len() + 1 == BAR_L_LEN {
                    break 'outer true;
                }
            }
        };
        if done {
            if self.lastsep {
                self.text.pop();
                self.lastsep = false;
            }
            self.close(reactor, reaper);
        }
        done
    }

    /// Stop a running hook: SIGTERM and close the pipe.
    pub fn close(&mut self, reactor: &mut Reactor, reaper: &mut Reaper) {
        let Some((child, stdout)) = self.running.take() else {
            return;
        };
        reactor.deregister(Source::Info);
        drop(stdout);
        // SAFETY: the child has not been waited for yet, so its pid is live.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        reaper.adopt(child);
    }
}

/// Runs `key-handler <key>` with file names on stdin and waits for it.
pub struct KeyHandler {
    hook: Hook,
}

impl KeyHandler {
    pub fn new(hook: Hook) -> Self {
        Self { hook }
    }

    /// Whether running is possible; warns once if not.
    pub fn check(&mut self) -> bool {
        self.hook.check()
    }

    /// Feed `paths` (display name and path) to the handler, block until it
    /// exits and report which of them changed on disk meanwhile.
    pub fn run<'a, I>(&mut self, key: &str, files: I) -> Result<Vec<bool>>
    where
        I: IntoIterator<Item = (&'a str, &'a Path)>,
    {
        let files: Vec<(&str, &Path)> = files.into_iter().collect();
        let before: Vec<Option<SystemTime>> = files.iter().map(|(_, p)| mtime(p)).collect();

        log::debug!("key handler {} for {} file(s)", key, files.len());
        let mut child = match Command::new(&self.hook.path)
            .arg(key)
            .stdin(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                log::warn!("exec {}: {}", self.hook.path.display(), e);
                return Ok(vec![false; files.len()]);
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            for (name, _) in &files {
                if let Err(e) = writeln!(stdin, "{}", name) {
                    log::debug!("key handler stdin: {}", e);
                    break;
                }
            }
        }
        match child.wait() {
            Ok(status) if !status.success() => log::debug!("key handler exited with {}", status),
            Ok(_) => {}
            Err(e) => log::warn!("waiting for key handler: {}", e),
        }

        Ok(files
            .iter()
            .zip(before)
            .map(|((_, p), old)| match (old, mtime(p)) {
                (Some(a), Some(b)) => a != b,
                _ => true,
            })
            .collect())
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
