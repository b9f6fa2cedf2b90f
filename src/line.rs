/*!
Line-at-a-time access to a client's byte stream.

Everything above this module only ever deals in lines of text, so any
`AsyncRead + AsyncWrite` stream can stand in for a `TcpStream`.
*/
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt,
    BufReader, ReadHalf, WriteHalf,
};

use crate::error::Error;

/// Split a stream into independently-owned line reader and writer halves.
pub fn split<S>(stream: S) -> (LineReader<ReadHalf<S>>, LineWriter<WriteHalf<S>>)
where S: AsyncRead + AsyncWrite
{
    let (read_half, write_half) = tokio::io::split(stream);
    (LineReader::new(read_half), LineWriter::new(write_half))
}

pub struct LineReader<R> {
    inner: BufReader<R>,
    buff: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(r: R) -> LineReader<R> {
        LineReader { inner: BufReader::new(r), buff: Vec::new() }
    }

    /// Read the next line, newline included if there was one.
    ///
    /// A final fragment without a trailing newline is still returned as a
    /// line; the call after that returns `Ok(None)`. Bytes that aren't
    /// valid UTF-8 come through as U+FFFD.
    pub async fn read_line(&mut self) -> Result<Option<String>, Error> {
        self.buff.clear();
        match self.inner.read_until(b'\n', &mut self.buff).await? {
            0 => Ok(None),
            _ => Ok(Some(String::from_utf8_lossy(&self.buff).into_owned())),
        }
    }
}

pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(w: W) -> LineWriter<W> {
        LineWriter { inner: w }
    }

    /// Write `text` verbatim and flush it. Callers supply the newline.
    pub async fn send(&mut self, text: &str) -> Result<(), Error> {
        self.inner.write_all(text.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
