use crate::message::Envelope;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Numeric user identifier carried in the bearer token.
pub type UserId = events::UserId;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who owns a connection, as established by authentication before the upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: String,
}

/// Addresses one registered client. Used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.connection_id)
    }
}

/// Lifecycle of one client. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    /// Connection is open but the hub has not accepted it yet.
    Pending,
    /// Registered and reachable by broadcasts.
    Active,
    /// Unregistered; the outbound queue is closed and draining.
    Closing,
    /// The outbound pump has released the connection.
    Closed,
}

fn advance(state: &watch::Sender<ClientState>, next: ClientState) -> bool {
    state.send_if_modified(|current| {
        if next > *current {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// The hub-side half of a connection: identity plus the only sender into its
/// outbound queue. Dropping a `Client` closes the queue.
#[derive(Debug)]
pub struct Client {
    key: ClientKey,
    identity: Identity,
    sender: mpsc::Sender<Arc<Envelope>>,
    state: Arc<watch::Sender<ClientState>>,
}

impl Client {
    /// Creates a client in the `Pending` state along with the queue the
    /// outbound pump drains.
    pub fn new(identity: Identity, capacity: NonZeroUsize) -> (Client, ClientQueue) {
        let (sender, receiver) = mpsc::channel(capacity.get());
        let (state, _) = watch::channel(ClientState::Pending);
        let state = Arc::new(state);
        let key = ClientKey {
            user_id: identity.user_id,
            connection_id: ConnectionId::new(),
        };

        let client = Client {
            key,
            identity,
            sender,
            state: Arc::clone(&state),
        };
        let queue = ClientQueue {
            key,
            receiver,
            state,
        };

        (client, queue)
    }

    pub fn key(&self) -> ClientKey {
        self.key
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Non-blocking enqueue. Fails when the queue is full or its consumer is gone.
    pub(crate) fn try_deliver(
        &self,
        envelope: Arc<Envelope>,
    ) -> Result<(), TrySendError<Arc<Envelope>>> {
        self.sender.try_send(envelope)
    }

    pub(crate) fn activate(&self) {
        advance(&self.state, ClientState::Active);
    }

    /// Consumes the client, closing its outbound queue.
    pub(crate) fn close(self) {
        advance(&self.state, ClientState::Closing);
    }
}

/// The pump-side half of a connection: the receiving end of the outbound queue.
#[derive(Debug)]
pub struct ClientQueue {
    key: ClientKey,
    receiver: mpsc::Receiver<Arc<Envelope>>,
    state: Arc<watch::Sender<ClientState>>,
}

impl ClientQueue {
    pub fn key(&self) -> ClientKey {
        self.key
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions of this client.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Next envelope, or `None` once the hub closed the queue and it is drained.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.recv().await
    }

    pub(crate) fn mark_closed(&self) {
        advance(&self.state, ClientState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: 1,
            username: "andi".to_string(),
            role: "operator".to_string(),
        }
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_new_client_starts_pending_and_shares_key_with_queue() {
        let (client, queue) = Client::new(identity(), capacity(4));

        assert_eq!(queue.state(), ClientState::Pending);
        assert_eq!(client.key(), queue.key());
        assert_eq!(client.key().user_id, 1);
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let (client, queue) = Client::new(identity(), capacity(4));
        queue.mark_closed();
        client.activate();

        assert_eq!(queue.state(), ClientState::Closed);
    }

    #[test]
    fn test_try_deliver_fails_when_queue_is_full() {
        let (client, _queue) = Client::new(identity(), capacity(1));

        assert!(client.try_deliver(Arc::new(Envelope::new("a"))).is_ok());
        assert!(matches!(
            client.try_deliver(Arc::new(Envelope::new("b"))),
            Err(TrySendError::Full(_))
        ));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends_queue() {
        let (client, mut queue) = Client::new(identity(), capacity(4));
        client.try_deliver(Arc::new(Envelope::new("last"))).unwrap();
        client.close();

        assert_eq!(queue.state(), ClientState::Closing);
        assert_eq!(queue.recv().await.unwrap().event, "last");
        assert!(queue.recv().await.is_none());
    }
}
