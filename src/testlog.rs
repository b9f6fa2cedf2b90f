/*!
Collects what the crate logs while a future runs, for tests that care
about how loudly something is reported.
*/
use std::{
    future::Future,
    io::Write,
    sync::Arc,
};

use parking_lot::Mutex;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

/// Run `fut` to completion on this thread and return everything logged at
/// DEBUG or above while it ran, one event per line.
pub async fn capture<F: Future>(fut: F) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    {
        let _guard = tracing::subscriber::set_default(subscriber);
        fut.await;
    }

    let bytes = captured.0.lock().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
