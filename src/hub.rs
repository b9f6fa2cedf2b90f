/*!
The chat server's driving nexus.

A `Hub` is a cheap, cloneable handle held by every connection task. The
registry of live sessions and the history log sit behind one lock shared
by all handles; the only thing that appends to the history or fills
mailboxes is the single `Broadcaster` task, which gives every line one
position in one global order.
*/
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{event, Level};

use crate::{
    error::Error,
    history::HistoryLog,
    message::{Broadcast, Line},
    registry::{Registry, Rejection, SessionId, SessionIds},
    session::{ClientSession, Outbox},
};

/// Capacity of the channel from session readers to the `Broadcaster`.
const INBOUND_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Most sessions that may be live at once.
    pub max_clients: usize,
    /// Most undelivered lines a session may have before it gets evicted.
    pub mailbox_capacity: usize,
    /// Most lines of history kept, if any limit.
    pub history_limit: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_clients: 10, mailbox_capacity: 10, history_limit: None }
    }
}

struct HubState {
    registry: Registry,
    history: HistoryLog,
}

#[derive(Clone)]
pub struct Hub {
    state: Arc<RwLock<HubState>>,
    inbound: Sender<Broadcast>,
    ids: Arc<SessionIds>,
    limits: Limits,
}

/// Consumes the hub's inbound channel and fans each line out to every live
/// session.
pub struct Broadcaster {
    state: Arc<RwLock<HubState>>,
    inbound: Receiver<Broadcast>,
}

impl Hub {
    /// The `Broadcaster` should be spawned as its own task. It runs until
    /// every `Hub` handle has been dropped.
    pub fn new(limits: Limits) -> (Hub, Broadcaster) {
        let state = Arc::new(RwLock::new(HubState {
            registry: Registry::new(limits.max_clients),
            history: HistoryLog::new(limits.history_limit),
        }));
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

        let hub = Hub {
            state: state.clone(),
            inbound: tx,
            ids: Arc::new(SessionIds::default()),
            limits,
        };
        let broadcaster = Broadcaster { state, inbound: rx };
        (hub, broadcaster)
    }

    pub fn limits(&self) -> &Limits { &self.limits }

    /// A new, not yet registered, session with this hub's next id and a
    /// mailbox of the configured size.
    pub fn open_session(&self, name: String) -> (ClientSession, Outbox) {
        ClientSession::new(self.ids.next(), name, self.limits.mailbox_capacity)
    }

    /// Admit `session` and return the history it has yet to see.
    ///
    /// Admission and the history snapshot happen under one lock, so every
    /// line is either in the returned backlog or will arrive in the
    /// session's mailbox, and never both.
    pub fn register(
        &self,
        session: ClientSession
    ) -> Result<(SessionId, Vec<Line>), (Rejection, ClientSession)> {
        let mut state = self.state.write();
        let id = state.registry.add(session)?;
        let backlog = state.history.snapshot();
        event!(Level::DEBUG,
            "registered session {}; {} live", &id, state.registry.len()
        );
        Ok((id, backlog))
    }

    /// Deregister and close a session. Safe to call on a session that's
    /// already gone.
    pub fn remove(&self, id: SessionId) {
        let mut state = self.state.write();
        if let Some(name) = state.registry.remove(id) {
            event!(Level::DEBUG,
                "removed session {} ({:?}); {} live",
                &id, &name, state.registry.len()
            );
        }
    }

    /// Queue a line for broadcast.
    pub async fn publish(&self, msg: Broadcast) -> Result<(), Error> {
        event!(Level::TRACE, "publishing {:?}", &msg);
        self.inbound.send(msg).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn is_live(&self, id: SessionId) -> bool {
        self.state.read().registry.contains(id)
    }

    /// Names of the live sessions, in order of admission.
    #[cfg(test)]
    pub fn names(&self) -> Vec<String> {
        self.state.read().registry.iter().map(|s| s.name().to_owned()).collect()
    }

    pub fn population(&self) -> usize {
        self.state.read().registry.len()
    }

    #[cfg(test)]
    pub fn history_len(&self) -> usize {
        self.state.read().history.len()
    }
}

impl Broadcaster {
    /// Record `msg` in the history and offer it to every live session
    /// except its origin, evicting any session whose mailbox is full.
    fn fan_out(&self, msg: Broadcast) {
        let mut state = self.state.write();
        state.history.append(msg.text.clone());
        event!(Level::TRACE,
            "broadcasting {:?}; history is {} lines", &msg.text, state.history.len()
        );

        let mut evicted: Vec<SessionId> = Vec::new();
        for session in state.registry.iter().filter(|s| msg.is_for(s.id())) {
            if let Err(e) = session.try_deliver(msg.text.clone()) {
                event!(Level::DEBUG,
                    "evicting session {} ({:?}): {}",
                    &session.id(), session.name(), &e
                );
                evicted.push(session.id());
            }
        }
        for id in evicted.into_iter() {
            state.registry.remove(id);
        }
    }

    pub async fn run(mut self) {
        event!(Level::DEBUG, "broadcaster is running");

        while let Some(msg) = self.inbound.recv().await {
            self.fan_out(msg);
        }

        event!(Level::WARN, "inbound channel closed; broadcaster stopping");
    }

    /// Take whatever has been published but not yet broadcast.
    #[cfg(test)]
    pub fn pending(&mut self) -> Vec<Broadcast> {
        let mut v = Vec::new();
        while let Ok(msg) = self.inbound.try_recv() {
            v.push(msg);
        }
        v
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{message, testlog};

    fn join(hub: &Hub, name: &str) -> (SessionId, Vec<Line>, Outbox) {
        let (session, outbox) = hub.open_session(name.into());
        match hub.register(session) {
            Ok((id, backlog)) => (id, backlog, outbox),
            Err((r, _)) => panic!("{} rejected: {:?}", name, r),
        }
    }

    async fn drain(outbox: &mut Outbox) -> Vec<Line> {
        let mut v = Vec::new();
        while let Ok(Some(line)) = tokio::time::timeout(
            std::time::Duration::from_millis(20), outbox.recv()
        ).await {
            v.push(line);
        }
        v
    }

    #[tokio::test]
    async fn fan_out_appends_and_delivers() {
        let (hub, broadcaster) = Hub::new(Limits::default());
        let (a, _, mut a_box) = join(&hub, "a");
        let (_b, _, mut b_box) = join(&hub, "b");

        broadcaster.fan_out(Broadcast::notice("hello all\n".into()));
        broadcaster.fan_out(Broadcast::chat(a, "[t][a]: hi\n".into()));

        assert_eq!(hub.history_len(), 2);
        assert_eq!(drain(&mut a_box).await, vec![Line::from("hello all\n")]);
        assert_eq!(
            drain(&mut b_box).await,
            vec![Line::from("hello all\n"), Line::from("[t][a]: hi\n")]
        );
    }

    #[tokio::test]
    async fn full_mailbox_is_evicted() {
        let (hub, broadcaster) = Hub::new(Limits::default());
        let (slow, _, mut slow_box) = join(&hub, "slow");
        let (fast, _, mut fast_box) = join(&hub, "fast");
        let slow_closed = slow_box.closed_token();

        for n in 0..10 {
            broadcaster.fan_out(Broadcast::notice(format!("{}\n", n)));
            assert_eq!(fast_box.recv().await.as_deref(), Some(&*format!("{}\n", n)));
        }
        assert!(hub.is_live(slow));

        broadcaster.fan_out(Broadcast::notice("one too many\n".into()));

        assert!(!hub.is_live(slow));
        assert!(hub.is_live(fast));
        assert!(slow_closed.is_cancelled());
        assert_eq!(fast_box.recv().await.as_deref(), Some("one too many\n"));

        // The slow session keeps what it had queued, and nothing more.
        assert_eq!(drain(&mut slow_box).await.len(), 10);
        assert!(slow_box.recv().await.is_none());
    }

    #[tokio::test]
    async fn register_snapshots_history() {
        let (hub, broadcaster) = Hub::new(Limits::default());
        broadcaster.fan_out(Broadcast::notice("first\n".into()));
        broadcaster.fan_out(Broadcast::notice("second\n".into()));

        let (_, backlog, mut outbox) = join(&hub, "late");
        assert_eq!(backlog, vec![Line::from("first\n"), Line::from("second\n")]);

        broadcaster.fan_out(Broadcast::notice("third\n".into()));
        assert_eq!(drain(&mut outbox).await, vec![Line::from("third\n")]);
    }

    #[tokio::test]
    async fn run_keeps_one_order() {
        let (hub, broadcaster) = Hub::new(Limits::default());
        let (_, _, mut a_box) = join(&hub, "a");
        let (_, _, mut b_box) = join(&hub, "b");
        let task = tokio::spawn(broadcaster.run());

        for n in 0..8 {
            hub.publish(Broadcast::notice(message::joined(&n.to_string())))
                .await
                .unwrap();
        }

        let a_lines = drain(&mut a_box).await;
        let b_lines = drain(&mut b_box).await;
        assert_eq!(a_lines.len(), 8);
        assert_eq!(a_lines, b_lines);

        drop(hub);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn losing_every_handle_stops_broadcaster_loudly() {
        let (hub, broadcaster) = Hub::new(Limits::default());
        drop(hub);

        let logs = testlog::capture(broadcaster.run()).await;
        assert!(
            logs.lines().any(|l| l.contains("WARN") && l.contains("inbound channel closed")),
            "got {:?}", &logs
        );
    }

    #[test]
    fn session_ids_are_per_hub() {
        let (hub, _broadcaster) = Hub::new(Limits::default());
        let (a, _a_box) = hub.open_session("a".into());
        let (b, _b_box) = hub.open_session("b".into());
        let (c, _c_box) = hub.clone().open_session("c".into());
        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
        assert_ne!(a.id(), c.id());

        // Another hub counts on its own.
        let (other, _other_broadcaster) = Hub::new(Limits::default());
        let (d, _d_box) = other.open_session("d".into());
        assert_eq!(d.id(), a.id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_keeps_names_unique() {
        let limits = Limits { max_clients: 5, ..Limits::default() };
        let (hub, _broadcaster) = Hub::new(limits);

        let mut tasks = Vec::new();
        for n in 0..40 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let name = format!("user{}", n % 8);
                let (session, outbox) = hub.open_session(name);
                hub.register(session).ok().map(|(id, _)| (id, outbox))
            }));
        }

        let mut admitted = Vec::new();
        for t in tasks {
            if let Some(x) = t.await.unwrap() {
                admitted.push(x);
            }
        }

        assert_eq!(admitted.len(), 5);
        assert_eq!(hub.population(), 5);
        let mut names = hub.names();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}
