//! Message router
//!
//! One `Router` is shared by every connection task. Each inbound text frame
//! goes through [`Router::handle_frame`]: classify, mirror to monitors, then
//! dispatch by category. Routing never fails the caller; the result of each
//! frame is reported as a [`RouteOutcome`].
//!
//! Membership changes (declare, disconnect) and directory replies run one at
//! a time, so the last `RECEIVE.CLIENT_LIST` a session gets always matches
//! the registry.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::delivery::{deliver, deliver_all};
use super::directory::DirectoryBroadcaster;
use super::liveness::{ack_frame, pong_frame, Keepalive, Liveness};
use super::mirror::MonitorMirror;
use super::observer::{NoopObserver, RelayObserver, RoutingRecord};
use crate::protocol::{
    AdminKind, Category, ContentKind, Envelope, Message, Payload, Receiver, SystemSignal, SERVER,
};
use crate::registry::SessionRegistry;
use crate::session::{ConnectionHandle, ConnectionId, Role, SessionInfo};
use crate::stats::{RelayStats, StatsSnapshot};

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Connection bound to an identity
    Declared { role: Role },
    /// Queued for a single named session
    Delivered { receiver: String },
    /// Queued for this many regular sessions
    Broadcast { recipients: usize },
    /// Addressed to the server; logged, not forwarded
    Logged,
    /// Receiver identity is not registered; the sender was told
    UnknownReceiver(String),
    /// Directory sent to the requester
    Directory,
    /// Liveness signal consumed or answered
    System,
    Dropped(DropReason),
}

/// Why a frame produced no delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    /// Client sent a `RECEIVE.*` or `ADMIN.*` category
    ServerOnlyCategory,
    /// Receiver's queue rejected the frame
    SendFailed,
    /// `SYSTEM` addressed to an identity that is not registered
    UnknownSystemTarget,
    /// Connection is not attached to the registry
    Unattached,
    /// Declared identity is a routing keyword (`ALL`, `SERVER`)
    ReservedIdentity,
    /// `SYSTEM` value with no routing rule
    Ignored,
}

/// Routes classified messages between sessions
///
/// `receiver: "ALL"` reaches every declared regular session except the
/// sending connection. Monitors never get the broadcast itself; they see
/// the original frame through the mirror.
pub struct Router<O: RelayObserver = NoopObserver> {
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
    observer: Arc<O>,
    mirror: MonitorMirror,
    directory: DirectoryBroadcaster,
    liveness: Liveness,
    membership: Mutex<()>,
}

impl Router<NoopObserver> {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_observer(registry, NoopObserver)
    }
}

impl<O: RelayObserver> Router<O> {
    /// Create a router reporting events to `observer`
    pub fn with_observer(registry: Arc<SessionRegistry>, observer: O) -> Self {
        let stats = Arc::new(RelayStats::new());

        Self {
            mirror: MonitorMirror::new(Arc::clone(&registry), Arc::clone(&stats)),
            directory: DirectoryBroadcaster::new(Arc::clone(&registry), Arc::clone(&stats)),
            liveness: Liveness::new(Arc::clone(&registry), Arc::clone(&stats)),
            membership: Mutex::new(()),
            registry,
            stats,
            observer: Arc::new(observer),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn observer(&self) -> &Arc<O> {
        &self.observer
    }

    /// Counters plus live session counts
    pub async fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.registry.counts().await)
    }

    /// Register a new, undeclared connection
    pub async fn connect(&self, handle: ConnectionHandle) {
        self.registry.attach(handle).await;
        self.stats.record_connection();
    }

    /// Process one inbound text frame
    pub async fn handle_frame(&self, connection: ConnectionId, text: &str) -> RouteOutcome {
        self.stats.record_frame();
        self.registry.touch(connection).await;

        let message = match Message::classify(text) {
            Ok(message) => message,
            Err(e) => {
                self.stats.record_malformed();
                tracing::warn!(
                    connection_id = %connection,
                    error = %e,
                    "Dropping malformed frame"
                );
                self.observer.on_malformed(connection, &e);
                return RouteOutcome::Dropped(DropReason::Malformed);
            }
        };

        // Monitors see the traffic whatever the routing outcome
        let record = message
            .category()
            .is_mirrored()
            .then(|| RoutingRecord::new(&message));
        if let Some(record) = &record {
            self.mirror.mirror(text, record).await;
        }

        self.stats.record_routed();

        let outcome = match message {
            Message::Declaration { identity } => self.declare(connection, &identity).await,
            Message::Content {
                kind,
                emitter,
                receiver,
                payload,
                request_ack,
            } => {
                self.route_content(connection, kind, &emitter, receiver, &payload, request_ack)
                    .await
            }
            Message::DirectoryRequest { emitter } => self.reply_directory(connection, &emitter).await,
            Message::System {
                emitter,
                receiver,
                signal,
            } => self.route_system(connection, text, &emitter, receiver, signal).await,
            Message::ServerOnly { category, emitter } => {
                tracing::warn!(
                    connection_id = %connection,
                    emitter = %emitter,
                    category = %category,
                    "Dropping server-only category sent by client"
                );
                RouteOutcome::Dropped(DropReason::ServerOnlyCategory)
            }
        };

        if let Some(record) = &record {
            self.observer.on_routed(record, &outcome);
        }

        outcome
    }

    /// Remove a closed connection and tell everyone who needs to know
    pub async fn disconnect(&self, connection: ConnectionId) {
        let _membership = self.membership.lock().await;
        let Some(info) = self.registry.remove(connection).await else {
            tracing::debug!(connection_id = %connection, "Undeclared connection closed");
            return;
        };

        tracing::info!(
            connection_id = %connection,
            identity = %info.username,
            role = %info.role,
            "Session departed"
        );
        self.observer.on_departed(&info);

        if info.role == Role::Regular {
            self.mirror
                .notify(AdminKind::ClientDisconnected, info.to_value())
                .await;
            self.directory.broadcast().await;
        }
    }

    /// Run one keepalive tick for a connection
    pub async fn keepalive(&self, connection: ConnectionId, idle_timeout: Option<Duration>) -> Keepalive {
        self.liveness.tick(connection, idle_timeout).await
    }

    async fn declare(&self, connection: ConnectionId, identity: &str) -> RouteOutcome {
        if !matches!(Receiver::parse(identity), Receiver::Identity(_)) {
            tracing::warn!(connection_id = %connection, identity = %identity, "Rejecting reserved identity");
            self.reply(
                connection,
                Envelope::new(
                    Category::Receive(ContentKind::Text),
                    SERVER,
                    identity,
                    format!("Identity {identity} is reserved"),
                )
                .to_frame(),
            )
            .await;
            return RouteOutcome::Dropped(DropReason::ReservedIdentity);
        }

        let _membership = self.membership.lock().await;
        let Some(registration) = self.registry.register(identity, connection).await else {
            tracing::warn!(connection_id = %connection, identity = %identity, "Declaration from unattached connection");
            return RouteOutcome::Dropped(DropReason::Unattached);
        };
        let handle = self.registry.handle(connection).await;
        let info = self
            .registry
            .session(connection)
            .await
            .as_ref()
            .and_then(SessionInfo::from_state);

        if let Some(handle) = &handle {
            let welcome = Envelope::new(
                Category::Receive(ContentKind::Text),
                SERVER,
                identity,
                format!("Welcome, {identity}!"),
            )
            .to_frame();
            deliver(handle, welcome, &self.stats);
        }

        if let (Some((old, Role::Regular)), Some(info)) = (&registration.previous, &info) {
            let departed = SessionInfo {
                username: old.clone(),
                role: Role::Regular,
                ..info.clone()
            };
            self.mirror
                .notify(AdminKind::ClientDisconnected, departed.to_value())
                .await;
        }

        match registration.role {
            Role::Regular => {
                if let Some(info) = &info {
                    self.mirror
                        .notify(AdminKind::ClientConnected, info.to_value())
                        .await;
                }
                self.directory.broadcast().await;
            }
            Role::Monitor => {
                if let Some(handle) = &handle {
                    self.directory.full_snapshot(handle, identity).await;
                }
                if registration.directory_changed() {
                    self.directory.broadcast().await;
                }
            }
        }

        if let Some(info) = &info {
            self.observer.on_declared(info);
        }

        RouteOutcome::Declared {
            role: registration.role,
        }
    }

    /// Forward chat content as `RECEIVE.*`
    ///
    /// `ALL` fans out to regular sessions other than `connection`, so a
    /// sender never gets its own broadcast back. `SERVER` and an empty
    /// receiver are logged only.
    async fn route_content(
        &self,
        connection: ConnectionId,
        kind: ContentKind,
        emitter: &str,
        receiver: Receiver,
        payload: &Payload,
        request_ack: bool,
    ) -> RouteOutcome {
        let category = Category::Send(kind).remap();
        let frame = Envelope::new(category, emitter, receiver.as_str(), payload.as_str()).to_frame();

        let (outcome, delivered) = match &receiver {
            Receiver::Server | Receiver::Unset => {
                tracing::debug!(
                    connection_id = %connection,
                    emitter = %emitter,
                    category = %category,
                    "Message addressed to server"
                );
                (RouteOutcome::Logged, false)
            }
            Receiver::All => {
                let regulars = self.registry.handles(Role::Regular, Some(connection)).await;
                let recipients = deliver_all(&regulars, &frame, &self.stats);
                tracing::debug!(
                    emitter = %emitter,
                    category = %category,
                    recipients,
                    "Broadcast"
                );
                (RouteOutcome::Broadcast { recipients }, recipients > 0)
            }
            Receiver::Identity(name) => match self.registry.lookup(name).await {
                Some(target) => {
                    if deliver(&target, frame, &self.stats) {
                        tracing::debug!(
                            emitter = %emitter,
                            receiver = %name,
                            category = %category,
                            "Delivered"
                        );
                        (RouteOutcome::Delivered { receiver: name.clone() }, true)
                    } else {
                        (RouteOutcome::Dropped(DropReason::SendFailed), false)
                    }
                }
                None => {
                    self.stats.record_unknown_receiver();
                    tracing::debug!(emitter = %emitter, receiver = %name, "Unknown receiver");
                    self.reply(
                        connection,
                        Envelope::new(
                            Category::Receive(ContentKind::Text),
                            SERVER,
                            emitter,
                            format!("Receiver {name} not found"),
                        )
                        .to_frame(),
                    )
                    .await;
                    (RouteOutcome::UnknownReceiver(name.clone()), false)
                }
            },
        };

        if request_ack && delivered {
            self.reply(connection, ack_frame(receiver.as_str(), emitter))
                .await;
        }

        outcome
    }

    async fn reply_directory(&self, connection: ConnectionId, emitter: &str) -> RouteOutcome {
        let _membership = self.membership.lock().await;
        match self.registry.handle(connection).await {
            Some(handle) => {
                self.directory.reply(&handle, emitter).await;
                RouteOutcome::Directory
            }
            None => RouteOutcome::Dropped(DropReason::Unattached),
        }
    }

    async fn route_system(
        &self,
        connection: ConnectionId,
        raw: &str,
        emitter: &str,
        receiver: Receiver,
        signal: SystemSignal,
    ) -> RouteOutcome {
        match (signal, receiver) {
            (SystemSignal::Ping, receiver) if receiver.is_relay() => {
                self.reply(connection, pong_frame(emitter)).await;
                RouteOutcome::System
            }
            (SystemSignal::Pong, receiver) if receiver.is_relay() => {
                tracing::trace!(connection_id = %connection, emitter = %emitter, "Pong");
                RouteOutcome::System
            }
            (SystemSignal::Pong | SystemSignal::Ack, Receiver::Identity(name)) => {
                let Some(target) = self.registry.lookup(&name).await else {
                    tracing::debug!(emitter = %emitter, receiver = %name, "SYSTEM target not registered");
                    return RouteOutcome::Dropped(DropReason::UnknownSystemTarget);
                };
                if deliver(&target, Bytes::copy_from_slice(raw.as_bytes()), &self.stats) {
                    RouteOutcome::Delivered { receiver: name }
                } else {
                    RouteOutcome::Dropped(DropReason::SendFailed)
                }
            }
            (signal, receiver) => {
                tracing::debug!(
                    emitter = %emitter,
                    receiver = %receiver.as_str(),
                    value = %signal.as_str(),
                    "Ignoring SYSTEM message"
                );
                RouteOutcome::Dropped(DropReason::Ignored)
            }
        }
    }

    /// Queue a frame back on the sending connection
    async fn reply(&self, connection: ConnectionId, frame: Bytes) -> bool {
        match self.registry.handle(connection).await {
            Some(handle) => deliver(&handle, frame, &self.stats),
            None => false,
        }
    }
}
