/*!
Per-client state, and the pair of tasks that move lines between a client's
connection and the hub.
*/
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::{self, error::TrySendError, Receiver, Sender},
};
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

use crate::{
    error::Error,
    hub::Hub,
    line::{LineReader, LineWriter},
    message::{self, Broadcast, Line},
    registry::SessionId,
};

/// The hub's end of a client: its name, and the sending side of its
/// mailbox.
///
/// Closing happens by consuming the session, so it can happen only once.
pub struct ClientSession {
    id: SessionId,
    name: String,
    mailbox: Sender<Line>,
    closed: CancellationToken,
}

/// The session's end of a client: the receiving side of its mailbox.
pub struct Outbox {
    rx: Receiver<Line>,
    closed: CancellationToken,
}

impl ClientSession {
    /// Create a session with a fresh mailbox holding at most `capacity`
    /// undelivered lines. Normally reached through `Hub::open_session`,
    /// which supplies the id.
    pub fn new(id: SessionId, name: String, capacity: usize) -> (ClientSession, Outbox) {
        let (tx, rx) = mpsc::channel(capacity);
        let closed = CancellationToken::new();
        let session = ClientSession {
            id,
            name,
            mailbox: tx,
            closed: closed.clone(),
        };

        (session, Outbox { rx, closed })
    }

    pub fn id(&self) -> SessionId { self.id }

    pub fn name(&self) -> &str { &self.name }

    /// Offer a line without waiting. Fails if the mailbox is full or its
    /// writer is gone.
    pub fn try_deliver(&self, line: Line) -> Result<(), TrySendError<Line>> {
        self.mailbox.try_send(line)
    }

    /// Close the mailbox and tell both of this session's tasks to let go of
    /// the connection.
    pub fn close(self) {
        self.closed.cancel();
        // Dropping `self.mailbox` ends the writer's stream of lines.
    }
}

impl Outbox {
    pub async fn recv(&mut self) -> Option<Line> {
        self.rx.recv().await
    }

    /// Token that's cancelled when the session is closed.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// Reads a client's lines and publishes them to the hub.
pub struct SessionReader<R> {
    id: SessionId,
    name: String,
    reader: LineReader<R>,
    hub: Hub,
    closed: CancellationToken,
}

impl<R: AsyncRead + Unpin> SessionReader<R> {
    pub fn new(
        id: SessionId,
        name: String,
        reader: LineReader<R>,
        hub: Hub,
        closed: CancellationToken,
    ) -> SessionReader<R> {
        SessionReader { id, name, reader, hub, closed }
    }

    async fn pump(&mut self) -> Result<(), Error> {
        while let Some(line) = self.reader.read_line().await? {
            let text = line.trim();
            if text.is_empty() { continue; }

            let line = message::chat_line(&chrono::Local::now(), &self.name, text);
            self.hub.publish(Broadcast::chat(self.id, line)).await?;
        }

        Ok(())
    }

    /// Read until the client goes away or the session is closed, then
    /// announce the departure and deregister.
    pub async fn run(mut self) {
        event!(Level::DEBUG, "session {} reader started", &self.id);

        let closed = self.closed.clone();
        let res = tokio::select! {
            _ = closed.cancelled() => Ok(()),
            res = self.pump() => res,
        };
        match res {
            Ok(()) | Err(Error::Eof) => {},
            Err(e) => {
                event!(Level::DEBUG, "session {} read error: {}", &self.id, &e);
            },
        }

        let notice = Broadcast::notice(message::left(&self.name));
        if let Err(e) = self.hub.publish(notice).await {
            event!(Level::ERROR,
                "session {}: unable to announce departure: {}", &self.id, &e
            );
        }
        self.hub.remove(self.id);

        event!(Level::DEBUG, "session {} reader stopped", &self.id);
    }
}

/// Writes a session's history backlog, then its mailbox, to the client.
pub struct SessionWriter<W> {
    id: SessionId,
    writer: LineWriter<W>,
    backlog: Vec<Line>,
    outbox: Outbox,
    hub: Hub,
}

impl<W: AsyncWrite + Unpin> SessionWriter<W> {
    pub fn new(
        id: SessionId,
        writer: LineWriter<W>,
        backlog: Vec<Line>,
        outbox: Outbox,
        hub: Hub,
    ) -> SessionWriter<W> {
        SessionWriter { id, writer, backlog, outbox, hub }
    }

    async fn drain(&mut self) -> Result<(), Error> {
        for line in std::mem::take(&mut self.backlog) {
            self.writer.send(&line).await?;
        }
        while let Some(line) = self.outbox.recv().await {
            self.writer.send(&line).await?;
        }

        Ok(())
    }

    /// Write until the mailbox closes, a write fails, or the session is
    /// closed. Any of these means the session is finished.
    pub async fn run(mut self) {
        event!(Level::DEBUG, "session {} writer started", &self.id);

        let closed = self.outbox.closed_token();
        let res = tokio::select! {
            _ = closed.cancelled() => Ok(()),
            res = self.drain() => res,
        };
        if let Err(e) = res {
            event!(Level::WARN, "session {} write error: {}", &self.id, &e);
        }

        self.hub.remove(self.id);
        if let Err(e) = self.writer.shutdown().await {
            event!(Level::TRACE,
                "session {}: error shutting down connection: {}", &self.id, &e
            );
        }

        event!(Level::DEBUG, "session {} writer stopped", &self.id);
    }
}
