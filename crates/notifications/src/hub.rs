//! Session registry and broadcast.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use domain::OrderEvent;
use event_bus::Subscription;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};

use crate::Notification;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a live session, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hub settings.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Frames a session may have queued before it counts as blocked.
    pub session_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session_capacity: 32,
        }
    }
}

/// Handle to one connected client.
///
/// The hub only ever pushes frames into the bounded sender; whoever owns
/// the matching receiver writes them to the client.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    sender: mpsc::Sender<Arc<str>>,
}

impl Session {
    pub fn new(sender: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id: SessionId::next(),
            sender,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn deliver(&self, frame: &Arc<str>) -> Result<(), DeliveryFailure> {
        self.sender
            .try_send(Arc::clone(frame))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => DeliveryFailure::Full,
                mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
            })
    }
}

/// Why a frame could not be handed to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// The session's queue is full: the client is not keeping up.
    #[error("session queue is full")]
    Full,

    /// The session's receiver is gone: the client disconnected.
    #[error("session is closed")]
    Closed,
}

/// Fans order events out to every registered session.
///
/// Delivery is best effort and never waits on a session: a session that
/// cannot take a frame right away is dropped, and the others are still
/// served.
pub struct NotificationHub {
    sessions: RwLock<HashMap<SessionId, Session>>,
    config: HubConfig,
}

impl NotificationHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Creates a session with the configured queue capacity.
    ///
    /// The session still has to be [registered](Self::register).
    pub fn open_session(&self) -> (Session, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(self.config.session_capacity.max(1));
        (Session::new(sender), receiver)
    }

    /// Adds a session; it receives every broadcast from now on.
    pub async fn register(&self, session: Session) -> SessionId {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session);
        metrics::gauge!("ws_sessions_active").set(sessions.len() as f64);
        tracing::info!(session_id = %id, "session registered");
        id
    }

    /// Removes a session. Unknown ids are ignored.
    ///
    /// Returns true if the session was registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id).is_some();
        if removed {
            metrics::gauge!("ws_sessions_active").set(sessions.len() as f64);
            tracing::info!(session_id = %id, "session unregistered");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sends the event to every session, returning how many accepted it.
    ///
    /// The event is serialized once. Sessions that fail delivery are
    /// unregistered.
    #[tracing::instrument(skip(self, event), fields(kind = %event.kind, order_id = %event.order_id()))]
    pub async fn broadcast(&self, event: &OrderEvent) -> usize {
        let frame = match Notification::from(event).encode() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode notification");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for session in sessions.values() {
                match session.deliver(&frame) {
                    Ok(()) => delivered += 1,
                    Err(failure) => failed.push((session.id(), failure)),
                }
            }
        }

        metrics::counter!("notifications_sent_total").increment(delivered as u64);

        for (id, failure) in failed {
            tracing::warn!(session_id = %id, reason = %failure, "dropping session");
            metrics::counter!("notifications_dropped_total").increment(1);
            self.unregister(id).await;
        }

        delivered
    }

    /// Broadcasts every event from the subscription until the bus goes away.
    pub async fn run(self: Arc<Self>, mut events: Subscription) {
        tracing::info!(subscriber = events.name(), "notification hub started");
        while let Some(event) = events.recv().await {
            self.broadcast(&event).await;
        }
        tracing::info!("notification hub stopped");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
