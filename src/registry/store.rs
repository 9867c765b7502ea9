//! Session registry implementation
//!
//! Owns every session and the identity → connection mapping. All state sits
//! behind one `RwLock`; methods take the lock, copy out what delivery needs
//! (connection handles are cheap clones) and release it before returning,
//! so no network send ever happens while the lock is held.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::config::RegistryConfig;
use crate::session::{ConnectionHandle, ConnectionId, Role, SessionInfo, SessionState};

/// Outcome of binding an identity to a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Role the identity was assigned
    pub role: Role,

    /// Identity and role this connection held before, if it re-declared
    pub previous: Option<(String, Role)>,

    /// Other connection that lost this identity
    pub evicted: Option<ConnectionId>,
}

impl Registration {
    /// Whether the directory of regular identities may have changed
    pub fn directory_changed(&self) -> bool {
        self.role == Role::Regular || matches!(self.previous, Some((_, Role::Regular)))
    }
}

/// Recipients and contents of a directory broadcast, taken atomically
#[derive(Debug, Clone)]
pub struct DirectoryView {
    /// Regular identities in registration order
    pub identities: Vec<String>,
    /// Every declared regular and monitor session
    pub recipients: Vec<ConnectionHandle>,
}

/// Live session counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounts {
    /// Attached connections, declared or not
    pub connections: usize,
    pub regular: usize,
    pub monitors: usize,
}

struct Slot {
    state: SessionState,
    handle: ConnectionHandle,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<ConnectionId, Slot>,
    identities: HashMap<String, ConnectionId>,
    next_seq: u64,
}

impl Inner {
    fn declared(&self, role: Role) -> impl Iterator<Item = &Slot> {
        self.sessions
            .values()
            .filter(move |slot| slot.state.role() == Some(role))
    }

    fn regulars_ordered(&self) -> Vec<&Slot> {
        let mut regulars: Vec<&Slot> = self.declared(Role::Regular).collect();
        regulars.sort_by_key(|slot| slot.state.registered_seq);
        regulars
    }
}

/// Registry of connected sessions
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Add a freshly connected, undeclared session
    pub async fn attach(&self, handle: ConnectionHandle) {
        let id = handle.id();
        let mut inner = self.inner.write().await;
        inner.sessions.insert(
            id,
            Slot {
                state: SessionState::new(id),
                handle,
            },
        );

        tracing::debug!(connection_id = %id, "Session attached");
    }

    /// Bind `identity` to a connection
    ///
    /// An identity already held by another connection is taken over: the
    /// mapping moves here and the other connection becomes undeclared but
    /// stays open. Returns `None` if the connection is not attached.
    pub async fn register(&self, identity: &str, connection: ConnectionId) -> Option<Registration> {
        let role = self.config.role_for(identity);
        let mut inner = self.inner.write().await;

        if !inner.sessions.contains_key(&connection) {
            return None;
        }

        inner.next_seq += 1;
        let seq = inner.next_seq;

        let evicted = match inner.identities.insert(identity.to_string(), connection) {
            Some(other) if other != connection => {
                if let Some(slot) = inner.sessions.get_mut(&other) {
                    slot.state.evict();
                }
                Some(other)
            }
            _ => None,
        };

        let slot = inner.sessions.get_mut(&connection)?;
        let previous = match (slot.state.identity.clone(), slot.state.role()) {
            (Some(old), Some(old_role)) if old != identity => Some((old, old_role)),
            _ => None,
        };
        slot.state.declare(identity.to_string(), role, seq);

        if let Some((old, _)) = &previous {
            if inner.identities.get(old) == Some(&connection) {
                inner.identities.remove(old);
            }
        }

        tracing::info!(
            connection_id = %connection,
            identity = %identity,
            role = %role,
            evicted = ?evicted.map(|id| id.get()),
            "Session declared"
        );

        Some(Registration {
            role,
            previous,
            evicted,
        })
    }

    /// Connection currently holding `identity`
    pub async fn lookup(&self, identity: &str) -> Option<ConnectionHandle> {
        let inner = self.inner.read().await;
        let id = inner.identities.get(identity)?;
        inner.sessions.get(id).map(|slot| slot.handle.clone())
    }

    /// Remove a connection
    ///
    /// Returns the session it held if it was declared. The identity mapping
    /// is only dropped when it still points at this connection.
    pub async fn remove(&self, connection: ConnectionId) -> Option<SessionInfo> {
        let mut inner = self.inner.write().await;
        let mut slot = inner.sessions.remove(&connection)?;

        let info = SessionInfo::from_state(&slot.state);
        slot.state.close();

        if let Some(identity) = slot.state.identity.as_deref() {
            if inner.identities.get(identity) == Some(&connection) {
                inner.identities.remove(identity);
            }
        }

        tracing::debug!(
            connection_id = %connection,
            identity = ?info.as_ref().map(|i| i.username.as_str()),
            "Session removed"
        );

        info
    }

    /// Regular identities in registration order (most recent last)
    pub async fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .regulars_ordered()
            .into_iter()
            .filter_map(|slot| slot.state.identity.clone())
            .collect()
    }

    /// Regular sessions with metadata, in directory order
    pub async fn detailed_snapshot(&self) -> Vec<SessionInfo> {
        let inner = self.inner.read().await;
        inner
            .regulars_ordered()
            .into_iter()
            .filter_map(|slot| SessionInfo::from_state(&slot.state))
            .collect()
    }

    /// Directory and its recipients under a single lock acquisition
    pub async fn directory_view(&self) -> DirectoryView {
        let inner = self.inner.read().await;
        let identities = inner
            .regulars_ordered()
            .into_iter()
            .filter_map(|slot| slot.state.identity.clone())
            .collect();
        let recipients = inner
            .sessions
            .values()
            .filter(|slot| slot.state.is_declared())
            .map(|slot| slot.handle.clone())
            .collect();

        DirectoryView {
            identities,
            recipients,
        }
    }

    /// Handles of declared sessions with `role`, optionally skipping one connection
    pub async fn handles(&self, role: Role, except: Option<ConnectionId>) -> Vec<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner
            .declared(role)
            .filter(|slot| Some(slot.handle.id()) != except)
            .map(|slot| slot.handle.clone())
            .collect()
    }

    /// Handles of every monitor session
    pub async fn monitors(&self) -> Vec<ConnectionHandle> {
        self.handles(Role::Monitor, None).await
    }

    /// Handle of an attached connection
    pub async fn handle(&self, connection: ConnectionId) -> Option<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner.sessions.get(&connection).map(|slot| slot.handle.clone())
    }

    /// Copy of a connection's session state
    pub async fn session(&self, connection: ConnectionId) -> Option<SessionState> {
        let inner = self.inner.read().await;
        inner.sessions.get(&connection).map(|slot| slot.state.clone())
    }

    /// Record inbound activity on a connection
    pub async fn touch(&self, connection: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.sessions.get_mut(&connection) {
            slot.state.touch();
        }
    }

    /// How long a connection has been silent
    pub async fn idle_for(&self, connection: ConnectionId) -> Option<std::time::Duration> {
        let inner = self.inner.read().await;
        let slot = inner.sessions.get(&connection)?;
        Some(
            slot.state
                .idle_for(Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO),
        )
    }

    pub async fn counts(&self) -> RegistryCounts {
        let inner = self.inner.read().await;
        RegistryCounts {
            connections: inner.sessions.len(),
            regular: inner.declared(Role::Regular).count(),
            monitors: inner.declared(Role::Monitor).count(),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OutboundQueue, OverflowPolicy};

    fn connect(id: u64) -> (ConnectionHandle, OutboundQueue) {
        ConnectionHandle::channel(ConnectionId::new(id), 16, OverflowPolicy::DropNewest)
    }

    async fn attached(registry: &SessionRegistry, id: u64) -> ConnectionId {
        let (handle, _queue) = connect(id);
        registry.attach(handle).await;
        ConnectionId::new(id)
    }

    #[tokio::test]
    async fn test_register_assigns_role() {
        let registry = SessionRegistry::new();
        let alice = attached(&registry, 1).await;
        let admin = attached(&registry, 2).await;

        let reg = registry.register("Alice", alice).await.unwrap();
        assert_eq!(reg.role, Role::Regular);
        assert!(reg.directory_changed());

        let reg = registry.register("ADMIN_1", admin).await.unwrap();
        assert_eq!(reg.role, Role::Monitor);
        assert!(!reg.directory_changed());

        assert_eq!(registry.snapshot().await, vec!["Alice".to_string()]);
        assert_eq!(
            registry.counts().await,
            RegistryCounts {
                connections: 2,
                regular: 1,
                monitors: 1
            }
        );
    }

    #[tokio::test]
    async fn test_register_unknown_connection() {
        let registry = SessionRegistry::new();
        assert!(registry
            .register("Alice", ConnectionId::new(99))
            .await
            .is_none());
        assert!(registry.lookup("Alice").await.is_none());
    }

    #[tokio::test]
    async fn test_identity_takeover() {
        let registry = SessionRegistry::new();
        let old = attached(&registry, 1).await;
        let new = attached(&registry, 2).await;

        registry.register("Alice", old).await.unwrap();
        let reg = registry.register("Alice", new).await.unwrap();
        assert_eq!(reg.evicted, Some(old));

        assert_eq!(registry.lookup("Alice").await.unwrap().id(), new);
        assert!(!registry.session(old).await.unwrap().is_declared());
        assert_eq!(registry.snapshot().await, vec!["Alice".to_string()]);

        // Closing the evicted connection leaves the new mapping alone
        assert!(registry.remove(old).await.is_none());
        assert_eq!(registry.lookup("Alice").await.unwrap().id(), new);
    }

    #[tokio::test]
    async fn test_redeclare_renames() {
        let registry = SessionRegistry::new();
        let conn = attached(&registry, 1).await;

        registry.register("Alice", conn).await.unwrap();
        let reg = registry.register("Alicia", conn).await.unwrap();

        assert_eq!(reg.previous, Some(("Alice".to_string(), Role::Regular)));
        assert!(registry.lookup("Alice").await.is_none());
        assert_eq!(registry.snapshot().await, vec!["Alicia".to_string()]);

        // Regular to monitor still changes the directory
        let reg = registry.register("ADMIN", conn).await.unwrap();
        assert!(reg.directory_changed());
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_order_is_registration_order() {
        let registry = SessionRegistry::new();
        let a = attached(&registry, 1).await;
        let b = attached(&registry, 2).await;
        let c = attached(&registry, 3).await;

        registry.register("Carol", c).await.unwrap();
        registry.register("Alice", a).await.unwrap();
        registry.register("Bob", b).await.unwrap();
        assert_eq!(registry.snapshot().await, vec!["Carol", "Alice", "Bob"]);

        // Re-declaring moves to the end
        registry.register("Carol", c).await.unwrap();
        assert_eq!(registry.snapshot().await, vec!["Alice", "Bob", "Carol"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SessionRegistry::new();
        let alice = attached(&registry, 1).await;
        let lurker = attached(&registry, 2).await;
        registry.register("Alice", alice).await.unwrap();

        let info = registry.remove(alice).await.unwrap();
        assert_eq!(info.username, "Alice");
        assert_eq!(info.role, Role::Regular);
        assert!(registry.lookup("Alice").await.is_none());

        // Never declared: no-op result
        assert!(registry.remove(lurker).await.is_none());
        // Already gone
        assert!(registry.remove(alice).await.is_none());
        assert_eq!(registry.counts().await, RegistryCounts::default());
    }

    #[tokio::test]
    async fn test_directory_view() {
        let registry = SessionRegistry::new();
        let alice = attached(&registry, 1).await;
        let admin = attached(&registry, 2).await;
        let _undeclared = attached(&registry, 3).await;
        registry.register("Alice", alice).await.unwrap();
        registry.register("ADMIN_1", admin).await.unwrap();

        let view = registry.directory_view().await;
        assert_eq!(view.identities, vec!["Alice"]);

        let mut ids: Vec<u64> = view.recipients.iter().map(|h| h.id().get()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_handles_except() {
        let registry = SessionRegistry::new();
        let a = attached(&registry, 1).await;
        let b = attached(&registry, 2).await;
        registry.register("Alice", a).await.unwrap();
        registry.register("Bob", b).await.unwrap();

        let others = registry.handles(Role::Regular, Some(a)).await;
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id(), b);
        assert!(registry.monitors().await.is_empty());
    }

    #[tokio::test]
    async fn test_detailed_snapshot_excludes_monitors() {
        let registry = SessionRegistry::new();
        let a = attached(&registry, 1).await;
        let m = attached(&registry, 2).await;
        registry.register("Alice", a).await.unwrap();
        registry.register("ADMIN_9", m).await.unwrap();

        let details = registry.detailed_snapshot().await;
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].username, "Alice");
        assert_eq!(details[0].connection_id, a);
    }

    #[tokio::test]
    async fn test_touch_and_idle() {
        let registry = SessionRegistry::new();
        let a = attached(&registry, 1).await;

        registry.touch(a).await;
        let idle = registry.idle_for(a).await.unwrap();
        assert!(idle < std::time::Duration::from_secs(5));
        assert!(registry.idle_for(ConnectionId::new(42)).await.is_none());
    }
}
