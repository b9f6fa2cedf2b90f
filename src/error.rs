/*!
The crate's error type.

Most of these never escape a connection task; they get logged and turned
into a closed connection or a "left" notice.
*/
use std::{
    io::ErrorKind,
    path::PathBuf,
};

use tokio::sync::mpsc::error::SendError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection closed")]
    Eof,
    #[error("I/O error: {0}")]
    IOError(std::io::Error),
    #[error("hub inbound channel closed")]
    HubClosed,
    #[error("unable to read banner {path:?}: {source}")]
    Banner {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Eof
        } else {
            Error::IOError(e)
        }
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(_: SendError<T>) -> Self {
        Error::HubClosed
    }
}
