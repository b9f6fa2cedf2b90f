/*!
Admission of a freshly accepted connection.

Greets the client with the banner, takes its first line as a name, and
once the hub admits it, sets its reader and writer tasks running.
*/
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{event, Level};

use crate::{
    hub::Hub,
    line::{self, LineReader, LineWriter},
    message::{self, Broadcast, NAME_TAKEN_TEXT, SERVER_FULL_TEXT},
    registry::Rejection,
    session::{SessionReader, SessionWriter},
};

/// Read a requested name. A client that has hung up (or can't be read)
/// gets the empty name, along with a flag saying there's nothing more to
/// read.
async fn read_name<R: AsyncRead + Unpin>(reader: &mut LineReader<R>) -> (String, bool) {
    match reader.read_line().await {
        Ok(Some(line)) => (line.trim().to_owned(), false),
        Ok(None) => (String::new(), true),
        Err(e) => {
            event!(Level::DEBUG, "error reading name: {}", &e);
            (String::new(), true)
        },
    }
}

/// Best-effort close of a connection that never got admitted.
async fn turn_away<W>(mut writer: LineWriter<W>, text: &str, conn_n: usize)
where W: AsyncWrite + Unpin
{
    if let Err(e) = writer.send(text).await {
        event!(Level::DEBUG, "connection {}: error sending rejection: {}", conn_n, &e);
    }
    if let Err(e) = writer.shutdown().await {
        event!(Level::DEBUG, "connection {}: error shutting down: {}", conn_n, &e);
    }
}

/// Run the admission handshake on `stream`. If the client is admitted,
/// this spawns its reader and writer tasks and returns.
///
/// A name that's already taken leaves the connection open, and the
/// client's next line is tried as a name instead. A full server closes
/// the connection.
pub async fn handle_connection<S>(hub: Hub, banner: Arc<str>, stream: S, conn_n: usize)
where S: AsyncRead + AsyncWrite + Send + 'static
{
    let (mut reader, mut writer) = line::split(stream);

    if let Err(e) = writer.send(&banner).await {
        event!(Level::DEBUG, "connection {}: error sending banner: {}", conn_n, &e);
    }

    let (id, name, backlog, outbox) = loop {
        let (name, hung_up) = read_name(&mut reader).await;
        let (session, outbox) = hub.open_session(name.clone());

        match hub.register(session) {
            Ok((id, backlog)) => break (id, name, backlog, outbox),
            Err((Rejection::NameTaken, _)) => {
                event!(Level::INFO,
                    "connection {}: name {:?} already in use", conn_n, &name
                );
                if hung_up {
                    turn_away(writer, NAME_TAKEN_TEXT, conn_n).await;
                    return;
                }
                if let Err(e) = writer.send(NAME_TAKEN_TEXT).await {
                    event!(Level::DEBUG,
                        "connection {}: error sending notice: {}", conn_n, &e
                    );
                    return;
                }
            },
            Err((Rejection::Full, _)) => {
                event!(Level::INFO,
                    "connection {}: server full; turning away {:?}", conn_n, &name
                );
                turn_away(writer, SERVER_FULL_TEXT, conn_n).await;
                return;
            },
        }
    };

    event!(Level::INFO,
        "connection {} admitted as session {} ({:?}); {} live, replaying {} lines",
        conn_n, &id, &name, hub.population(), backlog.len()
    );

    if let Err(e) = hub.publish(Broadcast::notice(message::joined(&name))).await {
        event!(Level::ERROR, "session {}: unable to announce arrival: {}", &id, &e);
    }

    let closed = outbox.closed_token();
    let session_writer = SessionWriter::new(id, writer, backlog, outbox, hub.clone());
    let session_reader = SessionReader::new(id, name, reader, hub, closed);
    tokio::spawn(session_writer.run());
    tokio::spawn(session_reader.run());
}
