use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("display: {0}")]
    Display(String),

    #[error("event loop: {0}")]
    Reactor(#[source] io::Error),

    #[error("watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("no valid image file given, aborting")]
    NoFiles,

    /// The file list ran empty. `manual` tells whether the user asked for it.
    #[error("no more files to display, aborting")]
    LastFileRemoved { manual: bool },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Error::Decode {
            path: path.into(),
            source,
        }
    }
}
