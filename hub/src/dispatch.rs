use crate::client::{Client, ClientKey, UserId};
use crate::error::Error;
use crate::message::{Envelope, Message};
use crate::registry::{Presence, Registry};
use log::*;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, WeakSender};

/// Everything the dispatch loop accepts. All kinds share one intake channel, so
/// commands are handled strictly in arrival order.
#[derive(Debug)]
enum Command {
    Register(Client),
    Unregister(ClientKey),
    Broadcast(Message),
}

/// Cloneable handle to the process-wide hub.
///
/// Producers and connection handlers submit commands through it; presence
/// queries read the registry directly and never wait on the dispatch loop.
#[derive(Clone)]
pub struct Hub {
    intake: mpsc::Sender<Command>,
    registry: Arc<Registry>,
}

impl Hub {
    /// Creates a hub and the dispatch loop that serves it. The caller decides
    /// where the loop runs; see [`Hub::spawn`] for the common case.
    pub fn new(intake_capacity: NonZeroUsize) -> (Hub, Dispatcher) {
        let (intake, commands) = mpsc::channel(intake_capacity.get());
        let registry = Arc::new(Registry::new());

        let dispatcher = Dispatcher {
            commands,
            intake: intake.downgrade(),
            registry: Arc::clone(&registry),
            evicting: HashSet::new(),
        };

        (Hub { intake, registry }, dispatcher)
    }

    /// Creates a hub and spawns its dispatch loop on the current tokio runtime.
    pub fn spawn(intake_capacity: NonZeroUsize) -> Hub {
        let (hub, dispatcher) = Hub::new(intake_capacity);
        tokio::spawn(dispatcher.run());
        hub
    }

    /// Submits a client for registration. The hub answers with a `connected`
    /// envelope on the client's queue.
    pub async fn register(&self, client: Client) -> Result<(), Error> {
        self.submit(Command::Register(client)).await
    }

    /// Submits removal of a client. Unregistering an unknown or already removed
    /// client is a no-op.
    pub async fn unregister(&self, key: ClientKey) -> Result<(), Error> {
        self.submit(Command::Unregister(key)).await
    }

    pub async fn broadcast(&self, envelope: Envelope) -> Result<(), Error> {
        self.send_message(Message::to_all(envelope)).await
    }

    pub async fn broadcast_to_user(&self, user_id: UserId, envelope: Envelope) -> Result<(), Error> {
        self.send_message(Message::to_user(user_id, envelope)).await
    }

    pub async fn broadcast_to_role(
        &self,
        role: impl Into<String>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        self.send_message(Message::to_role(role, envelope)).await
    }

    /// Submits a message for delivery according to its scope. Fire-and-forget:
    /// the only failure reported is the hub having stopped.
    pub async fn send_message(&self, message: Message) -> Result<(), Error> {
        self.submit(Command::Broadcast(message)).await
    }

    pub fn connected_users(&self) -> usize {
        self.registry.connected_users()
    }

    pub fn user_connection_count(&self, user_id: UserId) -> usize {
        self.registry.user_connection_count(user_id)
    }

    pub fn is_user_connected(&self, user_id: UserId) -> bool {
        self.registry.is_user_connected(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn presence(&self) -> Presence {
        self.registry.presence()
    }

    /// False once the dispatch loop has stopped accepting commands.
    pub fn is_running(&self) -> bool {
        !self.intake.is_closed()
    }

    async fn submit(&self, command: Command) -> Result<(), Error> {
        self.intake
            .send(command)
            .await
            .map_err(|_| Error::hub_closed())
    }
}

/// The single writer of the registry.
pub struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    // Weak so that the loop ends once every `Hub` handle is gone.
    intake: WeakSender<Command>,
    registry: Arc<Registry>,
    evicting: HashSet<ClientKey>,
}

impl Dispatcher {
    /// Runs until every [`Hub`] handle has been dropped.
    pub async fn run(mut self) {
        info!("Hub dispatch loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register(client) => self.register(client),
                Command::Unregister(key) => self.unregister(key),
                Command::Broadcast(message) => self.dispatch(message),
            }
        }

        info!("Hub dispatch loop stopped");
    }

    fn register(&mut self, client: Client) {
        let key = client.key();
        let identity = client.identity();
        let welcome = Envelope::connected(identity.user_id, &identity.username, &identity.role);

        // A client that cannot take its first message is already broken.
        if let Err(e) = client.try_deliver(Arc::new(welcome)) {
            warn!("Closing client {key} that could not accept its welcome: {e}");
            client.close();
            return;
        }

        info!(
            "Registered client {key} ({}, role {})",
            client.identity().username,
            client.identity().role
        );
        self.registry.insert(client);
    }

    fn unregister(&mut self, key: ClientKey) {
        self.evicting.remove(&key);

        match self.registry.remove(&key) {
            Some(client) => {
                client.close();
                info!("Unregistered client {key}");
            }
            None => debug!("Ignoring unregister for unknown client {key}"),
        }
    }

    fn dispatch(&mut self, mut message: Message) {
        message.envelope.stamp();
        let envelope = Arc::new(message.envelope);
        let mut stalled = Vec::new();
        let mut delivered = 0usize;

        self.registry.for_each_in_scope(&message.scope, |client| {
            let key = client.key();
            if self.evicting.contains(&key) {
                return;
            }

            match client.try_deliver(Arc::clone(&envelope)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for client {key}, evicting");
                    stalled.push(key);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for client {key}, evicting");
                    stalled.push(key);
                }
            }
        });

        debug!(
            "Dispatched '{}' to {delivered} connection(s), scope {:?}",
            envelope.event, message.scope
        );

        for key in stalled {
            self.schedule_unregister(key);
        }
    }

    /// Evictions go back through the intake instead of running inline, so that
    /// they queue behind whatever is already waiting.
    fn schedule_unregister(&mut self, key: ClientKey) {
        if !self.evicting.insert(key) {
            return;
        }

        match self.intake.upgrade() {
            Some(intake) => {
                tokio::spawn(async move {
                    if intake.send(Command::Unregister(key)).await.is_err() {
                        debug!("Hub stopped before evicting client {key}");
                    }
                });
            }
            None => self.unregister(key),
        }
    }
}
