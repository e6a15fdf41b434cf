use crate::client::{Client, ClientKey, ConnectionId, UserId};
use crate::message::MessageScope;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;

/// Point-in-time presence counters, as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub connected_users: usize,
    pub connections: usize,
}

/// Client registry keyed by user, then by connection.
///
/// Only the hub's dispatch loop mutates it. Presence readers go through the
/// map's sharded read locks, so their answers are snapshots that may already be
/// stale when observed.
#[derive(Default)]
pub struct Registry {
    users: DashMap<UserId, HashMap<ConnectionId, Client>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a client and marks it active while its user's entry is still locked.
    pub(crate) fn insert(&self, client: Client) {
        let key = client.key();
        self.users
            .entry(key.user_id)
            .or_default()
            .entry(key.connection_id)
            .or_insert(client)
            .activate();
    }

    /// Removes a client, dropping its user entry once the user has no clients left.
    /// Returns `None` if the client was not registered.
    pub(crate) fn remove(&self, key: &ClientKey) -> Option<Client> {
        let client = self
            .users
            .get_mut(&key.user_id)?
            .remove(&key.connection_id);

        self.users
            .remove_if(&key.user_id, |_, clients| clients.is_empty());

        client
    }

    /// Visits every client addressed by `scope`.
    pub(crate) fn for_each_in_scope(&self, scope: &MessageScope, mut visit: impl FnMut(&Client)) {
        match scope {
            MessageScope::All => {
                for entry in self.users.iter() {
                    entry.value().values().for_each(&mut visit);
                }
            }
            MessageScope::User { user_id } => {
                if let Some(clients) = self.users.get(user_id) {
                    clients.values().for_each(&mut visit);
                }
            }
            MessageScope::Role { role } => {
                for entry in self.users.iter() {
                    entry
                        .value()
                        .values()
                        .filter(|client| &client.identity().role == role)
                        .for_each(&mut visit);
                }
            }
        }
    }

    /// Number of distinct users with at least one live connection.
    pub fn connected_users(&self) -> usize {
        self.users.len()
    }

    pub fn user_connection_count(&self, user_id: UserId) -> usize {
        self.users
            .get(&user_id)
            .map(|clients| clients.len())
            .unwrap_or(0)
    }

    pub fn is_user_connected(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|clients| !clients.is_empty())
    }

    /// Total live connections across all users.
    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn presence(&self) -> Presence {
        Presence {
            connected_users: self.connected_users(),
            connections: self.connection_count(),
        }
    }
}
